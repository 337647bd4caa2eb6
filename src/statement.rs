//! Compiled statements: handle ownership, cached metadata, bind/step/scan.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::bind::{self, BindFailure};
use crate::cursor::{CursorState, RowCursor};
use crate::datetime;
use crate::engine::{CompiledHandle, NativeError, NativeStatement};
use crate::error::SqliteMiddlewareError;
use crate::scan::{ScanTarget, lossy_conversion};
use crate::session::Session;
use crate::value::{HostValue, StorageClass, StorageValue, ToHostValue};

/// Everything that travels with the native handle, including into and out of
/// the statement cache. Metadata is cached lazily and is stable for the
/// handle's lifetime; the name maps are built at most once and immutable
/// afterwards.
pub(crate) struct StmtCore {
    pub(crate) handle: Box<dyn NativeStatement>,
    pub(crate) sql: Arc<String>,
    pub(crate) tail: String,
    pub(crate) cursor: RowCursor,
    column_count: OnceCell<usize>,
    parameter_count: OnceCell<usize>,
    columns_by_name: OnceCell<HashMap<String, usize>>,
    parameters_by_name: OnceCell<HashMap<String, usize>>,
}

impl StmtCore {
    pub(crate) fn new(handle: Box<dyn NativeStatement>, sql: Arc<String>, tail: String) -> Self {
        Self {
            handle,
            sql,
            tail,
            cursor: RowCursor::new(),
            column_count: OnceCell::new(),
            parameter_count: OnceCell::new(),
            columns_by_name: OnceCell::new(),
            parameters_by_name: OnceCell::new(),
        }
    }

    fn step(&mut self) -> Result<bool, NativeError> {
        self.cursor.step(self.handle.as_mut())
    }

    fn column_count(&self) -> usize {
        *self.column_count.get_or_init(|| self.handle.column_count())
    }

    fn parameter_count(&self) -> usize {
        *self
            .parameter_count
            .get_or_init(|| self.handle.bind_parameter_count())
    }

    fn columns_by_name(&self) -> &HashMap<String, usize> {
        self.columns_by_name.get_or_init(|| {
            let count = self.column_count();
            let mut map = HashMap::with_capacity(count);
            for index in 0..count {
                map.insert(self.handle.column_name(index), index);
            }
            map
        })
    }

    fn parameters_by_name(&self) -> &HashMap<String, usize> {
        self.parameters_by_name.get_or_init(|| {
            let count = self.parameter_count();
            let mut map = HashMap::with_capacity(count);
            for index in 1..=count {
                if let Some(name) = self.handle.bind_parameter_name(index) {
                    map.insert(name, index);
                }
            }
            map
        })
    }
}

/// A compiled statement checked out from a [`Session`].
///
/// The native handle is exclusively owned: it is never shared between two
/// live `Statement` values, and the cache hands it out to at most one caller
/// at a time. [`finalize`](Statement::finalize) either returns the handle to
/// the session's cache or destroys it; afterwards every operation fails with
/// [`SqliteMiddlewareError::UseAfterFinalize`]. Dropping an unfinalized
/// statement finalizes it, logging (not surfacing) any failure.
pub struct Statement<'conn> {
    session: &'conn Session,
    core: Option<StmtCore>,
    sql: Arc<String>,
    cacheable: bool,
    check_type_mismatch: bool,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn from_cache(session: &'conn Session, core: StmtCore) -> Self {
        let sql = Arc::clone(&core.sql);
        Self {
            session,
            core: Some(core),
            sql,
            cacheable: true,
            check_type_mismatch: session.check_type_mismatch_default(),
        }
    }

    pub(crate) fn fresh(
        session: &'conn Session,
        compiled: CompiledHandle,
        sql: &str,
        cacheable: bool,
    ) -> Self {
        let sql = Arc::new(sql.to_owned());
        let core = StmtCore::new(compiled.handle, Arc::clone(&sql), compiled.tail);
        Self {
            session,
            core: Some(core),
            sql,
            cacheable,
            check_type_mismatch: session.check_type_mismatch_default(),
        }
    }

    fn sql_string(&self) -> String {
        (*self.sql).clone()
    }

    fn native_err(&self, err: NativeError) -> SqliteMiddlewareError {
        SqliteMiddlewareError::NativeEngine {
            code: err.code,
            message: err.message,
            sql: Some(self.sql_string()),
        }
    }

    fn misuse_err(&self, message: impl Into<String>) -> SqliteMiddlewareError {
        SqliteMiddlewareError::Misuse {
            message: message.into(),
            sql: self.sql_string(),
        }
    }

    fn core_ref(&self) -> Result<&StmtCore, SqliteMiddlewareError> {
        self.core
            .as_ref()
            .ok_or_else(|| SqliteMiddlewareError::UseAfterFinalize {
                sql: (*self.sql).clone(),
            })
    }

    fn core_mut(&mut self) -> Result<&mut StmtCore, SqliteMiddlewareError> {
        self.core
            .as_mut()
            .ok_or_else(|| SqliteMiddlewareError::UseAfterFinalize {
                sql: (*self.sql).clone(),
            })
    }

    /// Core with a pending row, as every scan path requires.
    fn row_core(&self) -> Result<&StmtCore, SqliteMiddlewareError> {
        let core = self.core_ref()?;
        if !core.cursor.has_row() {
            return Err(self.misuse_err("no row available to scan"));
        }
        Ok(core)
    }

    // ---- binding ----------------------------------------------------------

    /// Bind all parameters by position. The argument count must match the
    /// statement's parameter count exactly; this is checked locally and never
    /// reaches the native layer.
    ///
    /// # Errors
    ///
    /// `ArityMismatch`, `IntegerOverflow`, or a wrapped engine error.
    pub fn bind(&mut self, args: &[HostValue]) -> Result<(), SqliteMiddlewareError> {
        let want = self.bind_parameter_count()?;
        if args.len() != want {
            return Err(SqliteMiddlewareError::ArityMismatch {
                have: args.len(),
                want,
                sql: self.sql_string(),
            });
        }
        for (i, value) in args.iter().enumerate() {
            self.bind_by_index(i + 1, value)?;
        }
        self.core_mut()?.cursor.rearm();
        Ok(())
    }

    /// Bind one value to a 1-based parameter index.
    ///
    /// # Errors
    ///
    /// `IntegerOverflow` for unsigned values past the signed 64-bit range, or
    /// a wrapped engine error.
    pub fn bind_by_index(
        &mut self,
        index: usize,
        value: &HostValue,
    ) -> Result<(), SqliteMiddlewareError> {
        let policy = self.session.bind_policy();
        let sql = self.sql_string();
        let core = self.core_mut()?;
        match bind::bind_by_index(core.handle.as_mut(), index, value, policy) {
            Ok(()) => Ok(()),
            Err(BindFailure::Overflow { value }) => Err(SqliteMiddlewareError::IntegerOverflow {
                value: i128::from(value),
                index,
                sql,
            }),
            Err(BindFailure::Engine(err)) => Err(SqliteMiddlewareError::NativeEngine {
                code: err.code,
                message: err.message,
                sql: Some(sql),
            }),
        }
    }

    /// Bind through the valuer capability: the value renders itself as a
    /// [`HostValue`] and the result is bound as usual. Valuer errors are
    /// propagated unchanged.
    ///
    /// # Errors
    ///
    /// The valuer's own error, or any [`bind_by_index`](Self::bind_by_index)
    /// error.
    pub fn bind_value(
        &mut self,
        index: usize,
        value: &dyn ToHostValue,
    ) -> Result<(), SqliteMiddlewareError> {
        let host = value.to_host_value()?;
        self.bind_by_index(index, &host)
    }

    /// Bind parameters by name.
    ///
    /// # Errors
    ///
    /// `InvalidName` for a name the statement does not declare, or any
    /// positional bind error.
    pub fn bind_named(&mut self, args: &[(&str, HostValue)]) -> Result<(), SqliteMiddlewareError> {
        for (name, value) in args {
            let index = self.bind_parameter_index(name)?;
            self.bind_by_index(index, value)?;
        }
        self.core_mut()?.cursor.rearm();
        Ok(())
    }

    /// Number of bind parameters (lazily cached).
    ///
    /// # Errors
    ///
    /// `UseAfterFinalize`.
    pub fn bind_parameter_count(&self) -> Result<usize, SqliteMiddlewareError> {
        Ok(self.core_ref()?.parameter_count())
    }

    /// 1-based index of a named parameter. The name map is built once on
    /// first lookup and reused for the statement's lifetime.
    ///
    /// # Errors
    ///
    /// `InvalidName` when the statement has no such parameter.
    pub fn bind_parameter_index(&self, name: &str) -> Result<usize, SqliteMiddlewareError> {
        let core = self.core_ref()?;
        core.parameters_by_name()
            .get(name)
            .copied()
            .ok_or_else(|| SqliteMiddlewareError::InvalidName {
                name: name.to_owned(),
                sql: self.sql_string(),
            })
    }

    /// Name of the parameter at a 1-based index; unnamed or out-of-range
    /// indexes are errors.
    ///
    /// # Errors
    ///
    /// `Misuse` for an index without a name.
    pub fn bind_parameter_name(&self, index: usize) -> Result<String, SqliteMiddlewareError> {
        let core = self.core_ref()?;
        core.handle
            .bind_parameter_name(index)
            .ok_or_else(|| self.misuse_err(format!("invalid parameter index: {index}")))
    }

    // ---- execution --------------------------------------------------------

    /// Evaluate one step. Returns `true` while a row is available; scanning
    /// the same row repeatedly is fine, the next call advances.
    ///
    /// # Errors
    ///
    /// A wrapped engine error; the cursor then reports
    /// [`CursorState::Failed`] and the handle has been reset.
    pub fn next(&mut self) -> Result<bool, SqliteMiddlewareError> {
        let sql = self.sql_string();
        let core = self.core_mut()?;
        core.step().map_err(|err| SqliteMiddlewareError::NativeEngine {
            code: err.code,
            message: err.message,
            sql: Some(sql),
        })
    }

    /// Terminate the current execution and return to the starting state.
    /// Bound values are kept.
    ///
    /// # Errors
    ///
    /// A wrapped engine error.
    pub fn reset(&mut self) -> Result<(), SqliteMiddlewareError> {
        let sql = self.sql_string();
        let core = self.core_mut()?;
        core.handle
            .reset()
            .map_err(|err| SqliteMiddlewareError::NativeEngine {
                code: err.code,
                message: err.message,
                sql: Some(sql),
            })?;
        core.cursor.rewind();
        Ok(())
    }

    /// Clear all bound values back to Null.
    ///
    /// # Errors
    ///
    /// A wrapped engine error.
    pub fn clear_bindings(&mut self) -> Result<(), SqliteMiddlewareError> {
        let sql = self.sql_string();
        let core = self.core_mut()?;
        core.handle
            .clear_bindings()
            .map_err(|err| SqliteMiddlewareError::NativeEngine {
                code: err.code,
                message: err.message,
                sql: Some(sql),
            })
    }

    /// One-step execution for statements expected to produce no rows: bind,
    /// step, reset.
    ///
    /// # Errors
    ///
    /// `Misuse` when the statement produces a row, plus any bind/step error.
    pub fn exec(&mut self, args: &[HostValue]) -> Result<(), SqliteMiddlewareError> {
        self.bind(args)?;
        if self.next()? {
            self.reset()?;
            return Err(self.misuse_err("exec on a statement that returns rows"));
        }
        Ok(())
    }

    /// Like [`exec`](Self::exec), returning the number of rows changed.
    ///
    /// # Errors
    ///
    /// Same as [`exec`](Self::exec).
    pub fn execute_dml(&mut self, args: &[HostValue]) -> Result<u64, SqliteMiddlewareError> {
        self.exec(args)?;
        Ok(self.session.changes())
    }

    /// Like [`execute_dml`](Self::execute_dml), returning the inserted rowid,
    /// or `None` when nothing changed.
    ///
    /// # Errors
    ///
    /// Same as [`exec`](Self::exec).
    pub fn insert(&mut self, args: &[HostValue]) -> Result<Option<i64>, SqliteMiddlewareError> {
        let changed = self.execute_dml(args)?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(self.session.last_insert_rowid()))
    }

    /// Bind optional arguments, then step and hand each row to `on_row`
    /// until the rows run out or the callback fails.
    ///
    /// # Errors
    ///
    /// The callback's error, or any bind/step error.
    pub fn select<F>(&mut self, args: &[HostValue], mut on_row: F) -> Result<(), SqliteMiddlewareError>
    where
        F: FnMut(&Statement<'conn>) -> Result<(), SqliteMiddlewareError>,
    {
        if !args.is_empty() {
            self.bind(args)?;
        }
        while self.next()? {
            on_row(self)?;
        }
        Ok(())
    }

    /// Step once and scan the row into `targets`. Returns `false` when there
    /// is no matching row. No check is made that the row is unique.
    ///
    /// # Errors
    ///
    /// Any step or scan error.
    pub fn select_one_row(
        &mut self,
        targets: Vec<ScanTarget<'_>>,
    ) -> Result<bool, SqliteMiddlewareError> {
        if !self.next()? {
            return Ok(false);
        }
        self.scan(targets)?;
        Ok(true)
    }

    // ---- scanning ---------------------------------------------------------

    /// Scan the current row into one destination per column. The target
    /// count must match the column count exactly (checked locally).
    ///
    /// # Errors
    ///
    /// `ArityMismatch`, `Misuse` outside a row, or any per-column error.
    pub fn scan(&self, targets: Vec<ScanTarget<'_>>) -> Result<(), SqliteMiddlewareError> {
        let want = self.column_count()?;
        if targets.len() != want {
            return Err(SqliteMiddlewareError::ArityMismatch {
                have: targets.len(),
                want,
                sql: self.sql_string(),
            });
        }
        for (index, target) in targets.into_iter().enumerate() {
            self.scan_by_index(index, target)?;
        }
        Ok(())
    }

    /// Scan selected columns by name.
    ///
    /// # Errors
    ///
    /// `InvalidName` for unknown columns, plus any per-column error.
    pub fn scan_named(
        &self,
        targets: Vec<(&str, ScanTarget<'_>)>,
    ) -> Result<(), SqliteMiddlewareError> {
        for (name, target) in targets {
            let index = self.column_index(name)?;
            self.scan_by_index(index, target)?;
        }
        Ok(())
    }

    /// Scan one column by name. Returns `true` when the column is Null.
    ///
    /// # Errors
    ///
    /// `InvalidName`, plus any [`scan_by_index`](Self::scan_by_index) error.
    pub fn scan_by_name(
        &self,
        name: &str,
        target: ScanTarget<'_>,
    ) -> Result<bool, SqliteMiddlewareError> {
        let index = self.column_index(name)?;
        self.scan_by_index(index, target)
    }

    /// Scan one 0-based column into a destination descriptor. Returns `true`
    /// when the column is Null.
    ///
    /// Null handling per destination shape: plain destinations receive their
    /// zero value, `Option` destinations become `None` so null stays
    /// distinguishable from zero, the dynamic destination keeps
    /// [`StorageValue::Null`], and scanner destinations see the raw Null.
    ///
    /// # Errors
    ///
    /// `Misuse` outside a row, `TypeMismatch` under the lossy-conversion
    /// policy, `IntegerOverflow` for negative values into unsigned
    /// destinations, or the scanner capability's own error.
    pub fn scan_by_index(
        &self,
        index: usize,
        target: ScanTarget<'_>,
    ) -> Result<bool, SqliteMiddlewareError> {
        match target {
            ScanTarget::Skip => Ok(false),
            ScanTarget::Text(dst) => {
                let (value, null) = self.scan_text(index)?;
                *dst = value;
                Ok(null)
            }
            ScanTarget::TextOpt(dst) => {
                let (value, null) = self.scan_text(index)?;
                *dst = if null { None } else { Some(value) };
                Ok(null)
            }
            ScanTarget::Int64(dst) => {
                let (value, null) = self.scan_int64(index)?;
                *dst = value;
                Ok(null)
            }
            ScanTarget::Int64Opt(dst) => {
                let (value, null) = self.scan_int64(index)?;
                *dst = if null { None } else { Some(value) };
                Ok(null)
            }
            ScanTarget::Int32(dst) => {
                let (value, null) = self.scan_int64(index)?;
                *dst = value as i32;
                Ok(null)
            }
            ScanTarget::Int16(dst) => {
                let (value, null) = self.scan_int64(index)?;
                *dst = value as i16;
                Ok(null)
            }
            ScanTarget::Int8(dst) => {
                let (value, null) = self.scan_int64(index)?;
                *dst = value as i8;
                Ok(null)
            }
            ScanTarget::UInt64(dst) => {
                let (value, null) = self.scan_unsigned(index)?;
                *dst = value;
                Ok(null)
            }
            ScanTarget::UInt32(dst) => {
                let (value, null) = self.scan_unsigned(index)?;
                *dst = value as u32;
                Ok(null)
            }
            ScanTarget::UInt16(dst) => {
                let (value, null) = self.scan_unsigned(index)?;
                *dst = value as u16;
                Ok(null)
            }
            ScanTarget::UInt8(dst) => {
                let (value, null) = self.scan_u8(index)?;
                *dst = value;
                Ok(null)
            }
            ScanTarget::UInt8Opt(dst) => {
                let (value, null) = self.scan_u8(index)?;
                *dst = if null { None } else { Some(value) };
                Ok(null)
            }
            ScanTarget::Bool(dst) => {
                let (value, null) = self.scan_bool(index)?;
                *dst = value;
                Ok(null)
            }
            ScanTarget::BoolOpt(dst) => {
                let (value, null) = self.scan_bool(index)?;
                *dst = if null { None } else { Some(value) };
                Ok(null)
            }
            ScanTarget::Float64(dst) => {
                let (value, null) = self.scan_f64(index)?;
                *dst = value;
                Ok(null)
            }
            ScanTarget::Float64Opt(dst) => {
                let (value, null) = self.scan_f64(index)?;
                *dst = if null { None } else { Some(value) };
                Ok(null)
            }
            ScanTarget::Float32(dst) => {
                let (value, null) = self.scan_f64(index)?;
                *dst = value as f32;
                Ok(null)
            }
            ScanTarget::Blob(dst) => {
                let (value, null) = self.scan_blob(index)?;
                *dst = value;
                Ok(null)
            }
            ScanTarget::BlobOpt(dst) => {
                let (value, null) = self.scan_blob(index)?;
                *dst = if null { None } else { Some(value) };
                Ok(null)
            }
            ScanTarget::Timestamp(dst) => {
                let (value, null) = self.scan_timestamp(index)?;
                *dst = value;
                Ok(null)
            }
            ScanTarget::Dynamic(dst) => {
                let value = self.scan_value(index)?;
                let null = value.is_null();
                *dst = value;
                Ok(null)
            }
            ScanTarget::Scanner(scanner) => {
                let value = self.scan_value(index)?;
                let null = value.is_null();
                scanner.scan_storage(value)?;
                Ok(null)
            }
        }
    }

    /// Extract a Text column. Null yields `("", true)`.
    ///
    /// # Errors
    ///
    /// `Misuse` outside a row.
    pub fn scan_text(&self, index: usize) -> Result<(String, bool), SqliteMiddlewareError> {
        let core = self.row_core()?;
        if core.handle.column_type(index) == StorageClass::Null {
            return Ok((String::new(), true));
        }
        Ok((core.handle.column_text(index), false))
    }

    /// Extract an Integer column. Null yields `(0, true)`.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the check flag rejects a lossy source class; with
    /// the flag disabled the engine's own coercion applies.
    pub fn scan_int64(&self, index: usize) -> Result<(i64, bool), SqliteMiddlewareError> {
        let core = self.row_core()?;
        let class = core.handle.column_type(index);
        if class == StorageClass::Null {
            return Ok((0, true));
        }
        if self.check_type_mismatch && lossy_conversion(class, StorageClass::Integer) {
            return Err(SqliteMiddlewareError::TypeMismatch {
                from: class,
                target: StorageClass::Integer,
                sql: self.sql_string(),
            });
        }
        Ok((core.handle.column_int64(index), false))
    }

    /// Extract an unsigned integer; negative values are rejected.
    ///
    /// # Errors
    ///
    /// `IntegerOverflow` for negative values, plus [`scan_int64`](Self::scan_int64) errors.
    pub fn scan_unsigned(&self, index: usize) -> Result<(u64, bool), SqliteMiddlewareError> {
        let (value, null) = self.scan_int64(index)?;
        let Ok(unsigned) = u64::try_from(value) else {
            return Err(SqliteMiddlewareError::IntegerOverflow {
                value: i128::from(value),
                index,
                sql: self.sql_string(),
            });
        };
        Ok((unsigned, null))
    }

    /// Extract a single byte (truncating).
    ///
    /// # Errors
    ///
    /// Same as [`scan_int64`](Self::scan_int64).
    pub fn scan_u8(&self, index: usize) -> Result<(u8, bool), SqliteMiddlewareError> {
        let (value, null) = self.scan_int64(index)?;
        Ok((value as u8, null))
    }

    /// Extract a 32-bit integer (truncating).
    ///
    /// # Errors
    ///
    /// Same as [`scan_int64`](Self::scan_int64).
    pub fn scan_i32(&self, index: usize) -> Result<(i32, bool), SqliteMiddlewareError> {
        let (value, null) = self.scan_int64(index)?;
        Ok((value as i32, null))
    }

    /// Extract a boolean: any non-zero integer is `true`.
    ///
    /// # Errors
    ///
    /// Same as [`scan_int64`](Self::scan_int64).
    pub fn scan_bool(&self, index: usize) -> Result<(bool, bool), SqliteMiddlewareError> {
        let (value, null) = self.scan_int64(index)?;
        Ok((value != 0, null))
    }

    /// Extract a Float column. Null yields `(0.0, true)`; Integer sources
    /// widen without error.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the check flag rejects a Text or Blob source.
    pub fn scan_f64(&self, index: usize) -> Result<(f64, bool), SqliteMiddlewareError> {
        let core = self.row_core()?;
        let class = core.handle.column_type(index);
        if class == StorageClass::Null {
            return Ok((0.0, true));
        }
        if self.check_type_mismatch && lossy_conversion(class, StorageClass::Float) {
            return Err(SqliteMiddlewareError::TypeMismatch {
                from: class,
                target: StorageClass::Float,
                sql: self.sql_string(),
            });
        }
        Ok((core.handle.column_double(index), false))
    }

    /// Extract a Blob column. Null yields `(vec![], true)`.
    ///
    /// # Errors
    ///
    /// `Misuse` outside a row.
    pub fn scan_blob(&self, index: usize) -> Result<(Vec<u8>, bool), SqliteMiddlewareError> {
        let core = self.row_core()?;
        if core.handle.column_type(index) == StorageClass::Null {
            return Ok((Vec::new(), true));
        }
        Ok((core.handle.column_blob(index), false))
    }

    /// Extract a timestamp. Text columns go through the length-keyed layout
    /// inference, Integer columns are Unix epoch seconds, Float columns are
    /// Julian Day numbers. Null yields the epoch with `true`.
    ///
    /// # Errors
    ///
    /// `TimestampParse` for malformed or out-of-range values, `TypeMismatch`
    /// for Blob sources.
    pub fn scan_timestamp(
        &self,
        index: usize,
    ) -> Result<(DateTime<Utc>, bool), SqliteMiddlewareError> {
        let core = self.row_core()?;
        match core.handle.column_type(index) {
            StorageClass::Null => Ok((DateTime::UNIX_EPOCH, true)),
            StorageClass::Text => {
                let text = core.handle.column_text(index);
                datetime::parse_timestamp_text(&text)
                    .map(|value| (value, false))
                    .map_err(|detail| SqliteMiddlewareError::TimestampParse {
                        text,
                        detail,
                        sql: self.sql_string(),
                    })
            }
            StorageClass::Integer => {
                let seconds = core.handle.column_int64(index);
                DateTime::from_timestamp(seconds, 0)
                    .map(|value| (value, false))
                    .ok_or_else(|| SqliteMiddlewareError::TimestampParse {
                        text: seconds.to_string(),
                        detail: "seconds out of range".to_owned(),
                        sql: self.sql_string(),
                    })
            }
            StorageClass::Float => {
                let julian_day = core.handle.column_double(index);
                datetime::julian_day_to_timestamp(julian_day)
                    .map(|value| (value, false))
                    .ok_or_else(|| SqliteMiddlewareError::TimestampParse {
                        text: julian_day.to_string(),
                        detail: "Julian Day out of range".to_owned(),
                        sql: self.sql_string(),
                    })
            }
            StorageClass::Blob => Err(SqliteMiddlewareError::TypeMismatch {
                from: StorageClass::Blob,
                target: StorageClass::Integer,
                sql: self.sql_string(),
            }),
        }
    }

    /// Extract the current value with the engine's own classification.
    ///
    /// # Errors
    ///
    /// `Misuse` outside a row.
    pub fn scan_value(&self, index: usize) -> Result<StorageValue, SqliteMiddlewareError> {
        let core = self.row_core()?;
        Ok(core.handle.column_value(index))
    }

    /// [`scan_value`](Self::scan_value) over every column of the row.
    ///
    /// # Errors
    ///
    /// `Misuse` outside a row.
    pub fn scan_values(&self) -> Result<Vec<StorageValue>, SqliteMiddlewareError> {
        let count = self.column_count()?;
        (0..count).map(|index| self.scan_value(index)).collect()
    }

    // ---- metadata ---------------------------------------------------------

    /// Number of result columns (lazily cached, stable for the handle).
    ///
    /// # Errors
    ///
    /// `UseAfterFinalize`.
    pub fn column_count(&self) -> Result<usize, SqliteMiddlewareError> {
        Ok(self.core_ref()?.column_count())
    }

    /// Name of the 0-based column.
    ///
    /// # Errors
    ///
    /// `UseAfterFinalize`.
    pub fn column_name(&self, index: usize) -> Result<String, SqliteMiddlewareError> {
        Ok(self.core_ref()?.handle.column_name(index))
    }

    /// Names of all result columns.
    ///
    /// # Errors
    ///
    /// `UseAfterFinalize`.
    pub fn column_names(&self) -> Result<Vec<String>, SqliteMiddlewareError> {
        let core = self.core_ref()?;
        let count = core.column_count();
        Ok((0..count).map(|i| core.handle.column_name(i)).collect())
    }

    /// Column index for a name. The name map is built once on first lookup.
    ///
    /// # Errors
    ///
    /// `InvalidName` for a name not in the result set.
    pub fn column_index(&self, name: &str) -> Result<usize, SqliteMiddlewareError> {
        let core = self.core_ref()?;
        core.columns_by_name()
            .get(name)
            .copied()
            .ok_or_else(|| SqliteMiddlewareError::InvalidName {
                name: name.to_owned(),
                sql: self.sql_string(),
            })
    }

    /// Storage class of the column's current value. Valid only for the
    /// current row; not cached.
    ///
    /// # Errors
    ///
    /// `UseAfterFinalize`.
    pub fn column_type(&self, index: usize) -> Result<StorageClass, SqliteMiddlewareError> {
        Ok(self.core_ref()?.handle.column_type(index))
    }

    /// The SQL text this statement was compiled from.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Untranslated tail of a multi-statement input, empty when the input
    /// held a single statement.
    ///
    /// # Errors
    ///
    /// `UseAfterFinalize`.
    pub fn tail(&self) -> Result<&str, SqliteMiddlewareError> {
        Ok(&self.core_ref()?.tail)
    }

    /// True when the statement is guaranteed not to modify the database.
    ///
    /// # Errors
    ///
    /// `UseAfterFinalize`.
    pub fn read_only(&self) -> Result<bool, SqliteMiddlewareError> {
        Ok(self.core_ref()?.handle.read_only())
    }

    /// True when the statement has been stepped and needs a reset.
    ///
    /// # Errors
    ///
    /// `UseAfterFinalize`.
    pub fn busy(&self) -> Result<bool, SqliteMiddlewareError> {
        Ok(self.core_ref()?.handle.busy())
    }

    /// Current execution state.
    ///
    /// # Errors
    ///
    /// `UseAfterFinalize`.
    pub fn cursor_state(&self) -> Result<CursorState, SqliteMiddlewareError> {
        Ok(self.core_ref()?.cursor.state())
    }

    /// Whether a finalize would return this statement to the session cache.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.core.is_none()
    }

    /// Enable or disable the lossy-conversion check for scans on this
    /// statement (enabled by default).
    pub fn set_check_type_mismatch(&mut self, check: bool) {
        self.check_type_mismatch = check;
    }

    #[must_use]
    pub fn check_type_mismatch(&self) -> bool {
        self.check_type_mismatch
    }

    // ---- lifecycle --------------------------------------------------------

    /// Release the native handle: cacheable statements on a live connection
    /// go back to the session cache, everything else is destroyed. All
    /// further operations fail with `UseAfterFinalize`. Finalizing twice is
    /// harmless.
    ///
    /// # Errors
    ///
    /// A wrapped engine error from destroying or resetting the handle.
    /// Cache-internal eviction failures are logged, never surfaced here.
    pub fn finalize(&mut self) -> Result<(), SqliteMiddlewareError> {
        let Some(mut core) = self.core.take() else {
            return Ok(());
        };
        if self.cacheable && self.session.is_open() {
            self.session.release_statement(core)
        } else {
            core.handle.finalize().map_err(|err| self.native_err(err))
        }
    }

    /// Destroy the handle outright, bypassing the cache. Used when the
    /// statement is in an unknown state (e.g. a failed bind on a cache hit).
    pub(crate) fn discard(&mut self) {
        self.cacheable = false;
        if let Err(err) = self.finalize() {
            warn!(sql = %self.sql, error = %err, "failed to finalize discarded statement");
        }
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("cacheable", &self.cacheable)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if self.core.is_some() {
            if let Err(err) = self.finalize() {
                warn!(sql = %self.sql, error = %err, "failed to finalize dropped statement");
            }
        }
    }
}
