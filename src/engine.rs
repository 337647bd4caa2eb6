//! Trait seam to the native engine.
//!
//! The connection component proper (open/close, transactions, hooks, BLOB
//! I/O) lives outside this crate; these traits express exactly what the
//! statement layer consumes from it. An implementation typically wraps one
//! embedded-engine connection handle.

use std::fmt;

use crate::value::{StorageClass, StorageValue};

/// Well-known native result codes referenced by this layer.
pub mod result_code {
    pub const OK: i32 = 0;
    pub const ERROR: i32 = 1;
    pub const BUSY: i32 = 5;
    pub const MISUSE: i32 = 21;
    pub const RANGE: i32 = 25;
    pub const ROW: i32 = 100;
    pub const DONE: i32 = 101;
}

/// A non-success result reported by the native engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for NativeError {}

/// Outcome of stepping a statement once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A new row is available for column access.
    Row,
    /// Execution completed; no row is available.
    Done,
}

/// Result of compiling one SQL text: the statement handle plus the
/// untranslated tail of a multi-statement input.
pub struct CompiledHandle {
    pub handle: Box<dyn NativeStatement>,
    pub tail: String,
}

/// Connection-scoped primitives the statement layer needs.
pub trait NativeConnection {
    /// Compile `sql` into a fresh native statement handle.
    ///
    /// # Errors
    ///
    /// Returns the engine's result code and message when compilation fails.
    fn compile(&self, sql: &str) -> Result<CompiledHandle, NativeError>;

    /// Number of rows changed by the most recent DML statement.
    fn changes(&self) -> u64;

    /// Rowid of the most recent successful insert on this connection.
    fn last_insert_rowid(&self) -> i64;

    /// Whether the underlying connection is still live. Cached statements are
    /// only returned to the pool while this holds.
    fn is_open(&self) -> bool;
}

/// One native statement handle, exclusively owned by its wrapper.
///
/// Contract for implementations:
/// - `bind_text` / `bind_blob` must copy the data; the engine may not retain
///   a pointer into the caller's buffer past the call (transient semantics).
/// - Column accessors are only meaningful while a row is available; typed
///   accessors apply the engine's own coercion when the storage class
///   differs from the requested type.
/// - `finalize` destroys the handle; it is called at most once.
pub trait NativeStatement {
    /// # Errors
    /// Engine result code on failure (e.g. index out of range).
    fn bind_null(&mut self, index: usize) -> Result<(), NativeError>;
    /// # Errors
    /// Engine result code on failure.
    fn bind_int64(&mut self, index: usize, value: i64) -> Result<(), NativeError>;
    /// # Errors
    /// Engine result code on failure.
    fn bind_double(&mut self, index: usize, value: f64) -> Result<(), NativeError>;
    /// # Errors
    /// Engine result code on failure.
    fn bind_text(&mut self, index: usize, value: &str) -> Result<(), NativeError>;
    /// # Errors
    /// Engine result code on failure.
    fn bind_blob(&mut self, index: usize, value: &[u8]) -> Result<(), NativeError>;
    /// Bind a zero-filled blob of `len` bytes.
    ///
    /// # Errors
    /// Engine result code on failure.
    fn bind_zeroblob(&mut self, index: usize, len: usize) -> Result<(), NativeError>;

    /// # Errors
    /// Engine result code when evaluation fails.
    fn step(&mut self) -> Result<StepOutcome, NativeError>;
    /// # Errors
    /// Engine result code when the reset itself fails.
    fn reset(&mut self) -> Result<(), NativeError>;
    /// # Errors
    /// Engine result code on failure.
    fn clear_bindings(&mut self) -> Result<(), NativeError>;

    fn column_count(&self) -> usize;
    fn column_name(&self, index: usize) -> String;
    fn column_type(&self, index: usize) -> StorageClass;
    fn column_int64(&self, index: usize) -> i64;
    fn column_double(&self, index: usize) -> f64;
    fn column_text(&self, index: usize) -> String;
    fn column_blob(&self, index: usize) -> Vec<u8>;
    /// The current value classified by the engine, as an owned copy.
    fn column_value(&self, index: usize) -> StorageValue;

    fn bind_parameter_count(&self) -> usize;
    /// 1-based index of a named parameter, if the name exists.
    fn bind_parameter_index(&self, name: &str) -> Option<usize>;
    /// Name of the parameter at a 1-based index; `None` when out of range or
    /// unnamed.
    fn bind_parameter_name(&self, index: usize) -> Option<String>;

    /// True when the statement is guaranteed not to modify the database.
    fn read_only(&self) -> bool;
    /// True when the statement has been stepped and not yet reset.
    fn busy(&self) -> bool;

    /// Destroy the native handle.
    ///
    /// # Errors
    /// Engine result code when destruction fails.
    fn finalize(&mut self) -> Result<(), NativeError>;
}
