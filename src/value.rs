use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::SqliteMiddlewareError;

/// The engine's runtime classification of a column value, independent of any
/// declared schema type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Null,
    Integer,
    Float,
    Text,
    Blob,
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageClass::Null => "Null",
            StorageClass::Integer => "Integer",
            StorageClass::Float => "Float",
            StorageClass::Text => "Text",
            StorageClass::Blob => "Blob",
        };
        f.write_str(name)
    }
}

/// A column value as classified by the engine for the current row.
///
/// Values are materialised as owned copies when they cross the engine seam, so
/// they stay valid after the next step or reset.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl StorageValue {
    #[must_use]
    pub fn storage_class(&self) -> StorageClass {
        match self {
            StorageValue::Null => StorageClass::Null,
            StorageValue::Integer(_) => StorageClass::Integer,
            StorageValue::Float(_) => StorageClass::Float,
            StorageValue::Text(_) => StorageClass::Text,
            StorageValue::Blob(_) => StorageClass::Blob,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, StorageValue::Null)
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        if let StorageValue::Integer(v) = self { Some(*v) } else { None }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let StorageValue::Float(v) = self { Some(*v) } else { None }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let StorageValue::Text(v) = self { Some(v) } else { None }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let StorageValue::Blob(v) = self { Some(v) } else { None }
    }
}

/// A host-side value to be marshaled into one bind parameter.
///
/// This is the closed set of bind kinds the middleware understands. Anything
/// else reaches a statement through the [`ToHostValue`] capability, which
/// produces one of these tags and recurses.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
    /// Bound as Integer Unix epoch seconds (UTC).
    Timestamp(DateTime<Utc>),
    /// Reserves a zero-filled blob of the given length, typically to open an
    /// incremental blob handle on it later.
    ZeroBlob(usize),
    /// Bound as Text in serialised form.
    Json(serde_json::Value),
}

impl From<i8> for HostValue {
    fn from(v: i8) -> Self {
        HostValue::Int(i64::from(v))
    }
}

impl From<i16> for HostValue {
    fn from(v: i16) -> Self {
        HostValue::Int(i64::from(v))
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Int(i64::from(v))
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Int(v)
    }
}

impl From<u8> for HostValue {
    fn from(v: u8) -> Self {
        HostValue::Int(i64::from(v))
    }
}

impl From<u16> for HostValue {
    fn from(v: u16) -> Self {
        HostValue::Int(i64::from(v))
    }
}

impl From<u32> for HostValue {
    fn from(v: u32) -> Self {
        HostValue::Int(i64::from(v))
    }
}

impl From<u64> for HostValue {
    fn from(v: u64) -> Self {
        HostValue::UInt(v)
    }
}

impl From<f32> for HostValue {
    fn from(v: f32) -> Self {
        HostValue::Float(f64::from(v))
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Text(v.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::Text(v)
    }
}

impl From<&[u8]> for HostValue {
    fn from(v: &[u8]) -> Self {
        HostValue::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(v: Vec<u8>) -> Self {
        HostValue::Blob(v)
    }
}

impl From<DateTime<Utc>> for HostValue {
    fn from(v: DateTime<Utc>) -> Self {
        HostValue::Timestamp(v)
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(v: serde_json::Value) -> Self {
        HostValue::Json(v)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => HostValue::Null,
        }
    }
}

impl From<StorageValue> for HostValue {
    fn from(v: StorageValue) -> Self {
        match v {
            StorageValue::Null => HostValue::Null,
            StorageValue::Integer(i) => HostValue::Int(i),
            StorageValue::Float(f) => HostValue::Float(f),
            StorageValue::Text(s) => HostValue::Text(s),
            StorageValue::Blob(b) => HostValue::Blob(b),
        }
    }
}

/// Bind-side capability: types that can render themselves as a [`HostValue`].
///
/// Errors returned here are propagated to the bind caller unchanged.
pub trait ToHostValue {
    /// # Errors
    ///
    /// Implementations may fail when the value has no reasonable storage
    /// representation; [`SqliteMiddlewareError::UnsupportedBindType`] is the
    /// conventional kind for that case.
    fn to_host_value(&self) -> Result<HostValue, SqliteMiddlewareError>;
}

impl<T: Clone + Into<HostValue>> ToHostValue for T {
    fn to_host_value(&self) -> Result<HostValue, SqliteMiddlewareError> {
        Ok(self.clone().into())
    }
}

/// Scan-side capability: destinations that accept the raw engine-classified
/// value and decide the conversion themselves.
pub trait ColumnScanner {
    /// Receives the column's [`StorageValue`] unconverted, including `Null`.
    ///
    /// # Errors
    ///
    /// Implementations may reject values they cannot represent.
    fn scan_storage(&mut self, value: StorageValue) -> Result<(), SqliteMiddlewareError>;
}
