//! Scriptable in-memory engine for exercising the statement layer without a
//! real database.
//!
//! SQL text is opaque here: each text is keyed to a [`Script`] describing the
//! statement's shape (columns, rows or parameter echo, DML counters) and any
//! injected failures. Parameter slots are derived from the text itself (`?`,
//! `:name`, `@name`, `$name`), and typed column accessors apply SQLite-style
//! best-effort coercion so the disabled-mismatch-check paths behave like the
//! real engine.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::{
    CompiledHandle, NativeConnection, NativeError, NativeStatement, StepOutcome, result_code,
};
use crate::value::{StorageClass, StorageValue};

/// Behavior of one SQL text on the fake engine.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<StorageValue>>,
    /// Produce a single row echoing the bound parameters instead of `rows`.
    pub echo_params: bool,
    /// Connection change counter recorded when execution completes.
    pub changes: u64,
    pub last_insert_rowid: Option<i64>,
    pub fail_reset: bool,
    pub fail_finalize: bool,
    /// Fail the step with this 0-based ordinal.
    pub fail_on_step: Option<usize>,
    pub read_only: Option<bool>,
}

impl Script {
    /// A query returning the given rows.
    #[must_use]
    pub fn returning(columns: Vec<String>, rows: Vec<Vec<StorageValue>>) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    /// A query echoing its bound parameters back as one row. Column names
    /// default to `c0..cN`.
    #[must_use]
    pub fn echo() -> Self {
        Self {
            echo_params: true,
            ..Self::default()
        }
    }

    /// A statement producing no rows and reporting `changes` changed rows.
    #[must_use]
    pub fn dml(changes: u64) -> Self {
        Self {
            changes,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    #[must_use]
    pub fn with_last_insert_rowid(mut self, rowid: i64) -> Self {
        self.last_insert_rowid = Some(rowid);
        self
    }

    #[must_use]
    pub fn with_fail_reset(mut self) -> Self {
        self.fail_reset = true;
        self
    }

    #[must_use]
    pub fn with_fail_finalize(mut self) -> Self {
        self.fail_finalize = true;
        self
    }

    #[must_use]
    pub fn with_fail_on_step(mut self, ordinal: usize) -> Self {
        self.fail_on_step = Some(ordinal);
        self
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }
}

struct EngineState {
    scripts: HashMap<String, Script>,
    compiles: HashMap<String, usize>,
    finalizes: HashMap<String, usize>,
    changes: u64,
    last_rowid: i64,
    open: bool,
}

/// Shared fake engine; clone-free handle with interior state.
pub struct FakeEngine {
    state: Rc<RefCell<EngineState>>,
}

impl FakeEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(EngineState {
                scripts: HashMap::new(),
                compiles: HashMap::new(),
                finalizes: HashMap::new(),
                changes: 0,
                last_rowid: 0,
                open: true,
            })),
        }
    }

    /// Register the behavior of one SQL text. Unregistered texts compile to
    /// row-less statements with zero changes.
    pub fn script(&self, sql: &str, script: Script) {
        self.state
            .borrow_mut()
            .scripts
            .insert(sql.to_owned(), script);
    }

    /// A connection view onto this engine, boxed for
    /// [`Session::new`](crate::session::Session::new).
    #[must_use]
    pub fn connection(&self) -> Box<dyn NativeConnection> {
        Box::new(FakeConnection {
            state: Rc::clone(&self.state),
        })
    }

    /// How many times `sql` has been compiled.
    #[must_use]
    pub fn compile_count(&self, sql: &str) -> usize {
        self.state
            .borrow()
            .compiles
            .get(sql)
            .copied()
            .unwrap_or(0)
    }

    /// How many times a handle for `sql` has been finalized. Counts every
    /// call, so a double-destroy shows up as 2.
    #[must_use]
    pub fn finalize_count(&self, sql: &str) -> usize {
        self.state
            .borrow()
            .finalizes
            .get(sql)
            .copied()
            .unwrap_or(0)
    }

    /// Simulate connection teardown: further compiles fail and sessions see
    /// the connection as closed.
    pub fn close(&self) {
        self.state.borrow_mut().open = false;
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

struct FakeConnection {
    state: Rc<RefCell<EngineState>>,
}

impl NativeConnection for FakeConnection {
    fn compile(&self, sql: &str) -> Result<CompiledHandle, NativeError> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(NativeError::new(result_code::MISUSE, "connection is closed"));
        }
        *state.compiles.entry(sql.to_owned()).or_default() += 1;
        let script = state.scripts.get(sql).cloned().unwrap_or_default();
        drop(state);

        let (head, tail) = split_tail(sql);
        let params = parse_parameters(head);
        let bound = vec![StorageValue::Null; params.len()];
        Ok(CompiledHandle {
            handle: Box::new(FakeStatement {
                state: Rc::clone(&self.state),
                sql: sql.to_owned(),
                script,
                params,
                bound,
                pos: 0,
                steps: 0,
                current: None,
                started: false,
                finalized: false,
            }),
            tail: tail.to_owned(),
        })
    }

    fn changes(&self) -> u64 {
        self.state.borrow().changes
    }

    fn last_insert_rowid(&self) -> i64 {
        self.state.borrow().last_rowid
    }

    fn is_open(&self) -> bool {
        self.state.borrow().open
    }
}

struct FakeStatement {
    state: Rc<RefCell<EngineState>>,
    sql: String,
    script: Script,
    params: Vec<Option<String>>,
    bound: Vec<StorageValue>,
    pos: usize,
    steps: usize,
    current: Option<Vec<StorageValue>>,
    started: bool,
    finalized: bool,
}

impl FakeStatement {
    fn put(&mut self, index: usize, value: StorageValue) -> Result<(), NativeError> {
        if self.finalized {
            return Err(NativeError::new(result_code::MISUSE, "statement finalized"));
        }
        if index == 0 || index > self.bound.len() {
            return Err(NativeError::new(
                result_code::RANGE,
                format!("bind index {index} out of range"),
            ));
        }
        self.bound[index - 1] = value;
        Ok(())
    }

    fn current_value(&self, index: usize) -> StorageValue {
        self.current
            .as_ref()
            .and_then(|row| row.get(index))
            .cloned()
            .unwrap_or(StorageValue::Null)
    }

    fn row_count(&self) -> usize {
        if self.script.echo_params {
            1
        } else {
            self.script.rows.len()
        }
    }
}

impl NativeStatement for FakeStatement {
    fn bind_null(&mut self, index: usize) -> Result<(), NativeError> {
        self.put(index, StorageValue::Null)
    }

    fn bind_int64(&mut self, index: usize, value: i64) -> Result<(), NativeError> {
        self.put(index, StorageValue::Integer(value))
    }

    fn bind_double(&mut self, index: usize, value: f64) -> Result<(), NativeError> {
        self.put(index, StorageValue::Float(value))
    }

    fn bind_text(&mut self, index: usize, value: &str) -> Result<(), NativeError> {
        self.put(index, StorageValue::Text(value.to_owned()))
    }

    fn bind_blob(&mut self, index: usize, value: &[u8]) -> Result<(), NativeError> {
        self.put(index, StorageValue::Blob(value.to_vec()))
    }

    fn bind_zeroblob(&mut self, index: usize, len: usize) -> Result<(), NativeError> {
        self.put(index, StorageValue::Blob(vec![0; len]))
    }

    fn step(&mut self) -> Result<StepOutcome, NativeError> {
        if self.finalized {
            return Err(NativeError::new(result_code::MISUSE, "statement finalized"));
        }
        if self.script.fail_on_step == Some(self.steps) {
            self.steps += 1;
            return Err(NativeError::new(
                result_code::ERROR,
                "injected step failure",
            ));
        }
        self.steps += 1;
        self.started = true;
        if self.pos < self.row_count() {
            let row = if self.script.echo_params {
                self.bound.clone()
            } else {
                self.script.rows[self.pos].clone()
            };
            self.current = Some(row);
            self.pos += 1;
            return Ok(StepOutcome::Row);
        }
        self.current = None;
        let mut state = self.state.borrow_mut();
        state.changes = self.script.changes;
        if let Some(rowid) = self.script.last_insert_rowid {
            state.last_rowid = rowid;
        }
        Ok(StepOutcome::Done)
    }

    fn reset(&mut self) -> Result<(), NativeError> {
        if self.script.fail_reset {
            return Err(NativeError::new(result_code::BUSY, "injected reset failure"));
        }
        self.pos = 0;
        self.steps = 0;
        self.current = None;
        self.started = false;
        Ok(())
    }

    fn clear_bindings(&mut self) -> Result<(), NativeError> {
        if self.finalized {
            return Err(NativeError::new(result_code::MISUSE, "statement finalized"));
        }
        self.bound = vec![StorageValue::Null; self.bound.len()];
        Ok(())
    }

    fn column_count(&self) -> usize {
        if self.script.echo_params && self.script.columns.is_empty() {
            self.params.len()
        } else {
            self.script.columns.len()
        }
    }

    fn column_name(&self, index: usize) -> String {
        self.script
            .columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("c{index}"))
    }

    fn column_type(&self, index: usize) -> StorageClass {
        self.current_value(index).storage_class()
    }

    fn column_int64(&self, index: usize) -> i64 {
        coerce_i64(&self.current_value(index))
    }

    fn column_double(&self, index: usize) -> f64 {
        coerce_f64(&self.current_value(index))
    }

    fn column_text(&self, index: usize) -> String {
        coerce_text(&self.current_value(index))
    }

    fn column_blob(&self, index: usize) -> Vec<u8> {
        coerce_blob(&self.current_value(index))
    }

    fn column_value(&self, index: usize) -> StorageValue {
        self.current_value(index)
    }

    fn bind_parameter_count(&self) -> usize {
        self.params.len()
    }

    fn bind_parameter_index(&self, name: &str) -> Option<usize> {
        self.params
            .iter()
            .position(|p| p.as_deref() == Some(name))
            .map(|i| i + 1)
    }

    fn bind_parameter_name(&self, index: usize) -> Option<String> {
        if index == 0 || index > self.params.len() {
            return None;
        }
        self.params[index - 1].clone()
    }

    fn read_only(&self) -> bool {
        self.script.read_only.unwrap_or(self.column_count() > 0)
    }

    fn busy(&self) -> bool {
        self.started
    }

    fn finalize(&mut self) -> Result<(), NativeError> {
        self.finalized = true;
        *self
            .state
            .borrow_mut()
            .finalizes
            .entry(self.sql.clone())
            .or_default() += 1;
        if self.script.fail_finalize {
            return Err(NativeError::new(
                result_code::ERROR,
                "injected finalize failure",
            ));
        }
        Ok(())
    }
}

/// Split a multi-statement input at the first `;`, returning the compiled
/// head and the untranslated tail.
fn split_tail(sql: &str) -> (&str, &str) {
    match sql.find(';') {
        Some(pos) if !sql[pos + 1..].trim().is_empty() => (&sql[..=pos], &sql[pos + 1..]),
        _ => (sql, ""),
    }
}

/// Derive parameter slots from the SQL text: `?` (optionally numbered) is
/// positional, `:name`, `@name` and `$name` are named. Quoted literals are
/// skipped.
fn parse_parameters(sql: &str) -> Vec<Option<String>> {
    let bytes = sql.as_bytes();
    let mut params = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'?' => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                params.push(None);
            }
            b':' | b'@' | b'$' => {
                let start = i;
                let mut end = i + 1;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if end > i + 1 {
                    params.push(Some(sql[start..end].to_owned()));
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    params
}

fn coerce_i64(value: &StorageValue) -> i64 {
    match value {
        StorageValue::Null => 0,
        StorageValue::Integer(v) => *v,
        StorageValue::Float(v) => *v as i64,
        StorageValue::Text(s) => numeric_prefix(s) as i64,
        StorageValue::Blob(b) => numeric_prefix(&String::from_utf8_lossy(b)) as i64,
    }
}

fn coerce_f64(value: &StorageValue) -> f64 {
    match value {
        StorageValue::Null => 0.0,
        StorageValue::Integer(v) => *v as f64,
        StorageValue::Float(v) => *v,
        StorageValue::Text(s) => numeric_prefix(s),
        StorageValue::Blob(b) => numeric_prefix(&String::from_utf8_lossy(b)),
    }
}

fn coerce_text(value: &StorageValue) -> String {
    match value {
        StorageValue::Null => String::new(),
        StorageValue::Integer(v) => v.to_string(),
        StorageValue::Float(v) => format!("{v:?}"),
        StorageValue::Text(s) => s.clone(),
        StorageValue::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

fn coerce_blob(value: &StorageValue) -> Vec<u8> {
    match value {
        StorageValue::Null => Vec::new(),
        StorageValue::Blob(b) => b.clone(),
        other => coerce_text(other).into_bytes(),
    }
}

/// Longest leading numeric prefix as a float, 0.0 when there is none.
fn numeric_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let mut saw_digit = false;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        saw_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            saw_digit = true;
        }
    }
    if saw_digit && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            end = exp;
        }
    }
    if !saw_digit {
        return 0.0;
    }
    text[..end].parse().unwrap_or(0.0)
}
