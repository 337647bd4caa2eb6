//! Destination descriptors for extracting column values.
//!
//! The descriptor set is closed: every supported destination shape is a
//! [`ScanTarget`] variant, with `Option<_>` variants playing the
//! double-pointer role (null stays distinguishable from the zero value) and
//! [`ColumnScanner`](crate::value::ColumnScanner) as the single open
//! capability. The dispatch itself lives on
//! [`Statement::scan_by_index`](crate::statement::Statement::scan_by_index).

use chrono::{DateTime, Utc};

use crate::value::{ColumnScanner, StorageClass, StorageValue};

/// Shape of one host destination for a scanned column.
pub enum ScanTarget<'a> {
    /// Ignore the column entirely.
    Skip,
    Text(&'a mut String),
    TextOpt(&'a mut Option<String>),
    Int64(&'a mut i64),
    Int64Opt(&'a mut Option<i64>),
    Int32(&'a mut i32),
    Int16(&'a mut i16),
    Int8(&'a mut i8),
    UInt64(&'a mut u64),
    UInt32(&'a mut u32),
    UInt16(&'a mut u16),
    UInt8(&'a mut u8),
    UInt8Opt(&'a mut Option<u8>),
    Bool(&'a mut bool),
    BoolOpt(&'a mut Option<bool>),
    Float64(&'a mut f64),
    Float64Opt(&'a mut Option<f64>),
    Float32(&'a mut f32),
    Blob(&'a mut Vec<u8>),
    BlobOpt(&'a mut Option<Vec<u8>>),
    Timestamp(&'a mut DateTime<Utc>),
    /// Fully dynamic: the engine's classification decides the value's type.
    /// Null columns leave [`StorageValue::Null`].
    Dynamic(&'a mut StorageValue),
    /// Capability destination; receives the raw value unconverted.
    Scanner(&'a mut dyn ColumnScanner),
}

macro_rules! scan_target_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl<'a> From<&'a mut $ty> for ScanTarget<'a> {
                fn from(dst: &'a mut $ty) -> Self {
                    ScanTarget::$variant(dst)
                }
            }
        )+
    };
}

scan_target_from! {
    String => Text,
    Option<String> => TextOpt,
    i64 => Int64,
    Option<i64> => Int64Opt,
    i32 => Int32,
    i16 => Int16,
    i8 => Int8,
    u64 => UInt64,
    u32 => UInt32,
    u16 => UInt16,
    u8 => UInt8,
    Option<u8> => UInt8Opt,
    bool => Bool,
    Option<bool> => BoolOpt,
    f64 => Float64,
    Option<f64> => Float64Opt,
    f32 => Float32,
    Vec<u8> => Blob,
    Option<Vec<u8>> => BlobOpt,
    DateTime<Utc> => Timestamp,
    StorageValue => Dynamic,
}

/// Whether extracting `target` from a `source`-classed column discards
/// information. Only widening conversions are exempt: Integer into Float is
/// allowed, everything numeric out of Text or Blob is not.
#[must_use]
pub(crate) fn lossy_conversion(source: StorageClass, target: StorageClass) -> bool {
    match target {
        StorageClass::Integer => matches!(
            source,
            StorageClass::Float | StorageClass::Text | StorageClass::Blob
        ),
        StorageClass::Float => matches!(source, StorageClass::Text | StorageClass::Blob),
        _ => false,
    }
}
