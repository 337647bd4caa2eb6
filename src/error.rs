use thiserror::Error;

use crate::value::StorageClass;

/// Error type for the statement, marshaling, and cache layer.
///
/// Local errors (arity, unsupported types, invalid names, use after finalize)
/// are detected before anything reaches the native engine. Engine failures are
/// wrapped with the statement's SQL text and the native result code.
#[derive(Debug, Error)]
pub enum SqliteMiddlewareError {
    #[error("incorrect argument count: have {have} want {want} ({sql})")]
    ArityMismatch { have: usize, want: usize, sql: String },

    #[error("unsupported bind type {type_name} (index: {index}, name: {name:?}) ({sql})")]
    UnsupportedBindType {
        type_name: String,
        index: usize,
        name: Option<String>,
        sql: String,
    },

    #[error("unsupported scan type {type_name} (column: {index}) ({sql})")]
    UnsupportedScanType {
        type_name: String,
        index: usize,
        sql: String,
    },

    #[error("integer out of range: {value} (index: {index}) ({sql})")]
    IntegerOverflow { value: i128, index: usize, sql: String },

    // The source class is named `from`; thiserror reserves `source` for
    // error chaining.
    #[error("type mismatch, source {from} vs target {target} ({sql})")]
    TypeMismatch {
        from: StorageClass,
        target: StorageClass,
        sql: String,
    },

    #[error("invalid name: {name:?} ({sql})")]
    InvalidName { name: String, sql: String },

    #[error("statement used after finalize ({sql})")]
    UseAfterFinalize { sql: String },

    #[error("statement misuse: {message} ({sql})")]
    Misuse { message: String, sql: String },

    #[error("cannot interpret {text:?} as a timestamp: {detail} ({sql})")]
    TimestampParse {
        text: String,
        detail: String,
        sql: String,
    },

    #[error("native engine error {code}: {message} ({sql:?})")]
    NativeEngine {
        code: i32,
        message: String,
        sql: Option<String>,
    },
}

impl SqliteMiddlewareError {
    /// Symbolic kind, stable across message wording changes.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SqliteMiddlewareError::ArityMismatch { .. } => "ArityMismatch",
            SqliteMiddlewareError::UnsupportedBindType { .. } => "UnsupportedBindType",
            SqliteMiddlewareError::UnsupportedScanType { .. } => "UnsupportedScanType",
            SqliteMiddlewareError::IntegerOverflow { .. } => "IntegerOverflow",
            SqliteMiddlewareError::TypeMismatch { .. } => "TypeMismatch",
            SqliteMiddlewareError::InvalidName { .. } => "InvalidName",
            SqliteMiddlewareError::UseAfterFinalize { .. } => "UseAfterFinalize",
            SqliteMiddlewareError::Misuse { .. } => "Misuse",
            SqliteMiddlewareError::TimestampParse { .. } => "TimestampParse",
            SqliteMiddlewareError::NativeEngine { .. } => "NativeEngine",
        }
    }

    /// The offending SQL text, when the error is tied to a statement.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            SqliteMiddlewareError::ArityMismatch { sql, .. }
            | SqliteMiddlewareError::UnsupportedBindType { sql, .. }
            | SqliteMiddlewareError::UnsupportedScanType { sql, .. }
            | SqliteMiddlewareError::IntegerOverflow { sql, .. }
            | SqliteMiddlewareError::TypeMismatch { sql, .. }
            | SqliteMiddlewareError::InvalidName { sql, .. }
            | SqliteMiddlewareError::UseAfterFinalize { sql }
            | SqliteMiddlewareError::Misuse { sql, .. }
            | SqliteMiddlewareError::TimestampParse { sql, .. } => Some(sql),
            SqliteMiddlewareError::NativeEngine { sql, .. } => sql.as_deref(),
        }
    }

    /// Native result code, for errors that originated in the engine.
    #[must_use]
    pub fn native_code(&self) -> Option<i32> {
        match self {
            SqliteMiddlewareError::NativeEngine { code, .. } => Some(*code),
            _ => None,
        }
    }
}
