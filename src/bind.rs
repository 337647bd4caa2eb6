//! Marshaling of host values into native bind calls.
//!
//! One dispatch over the closed [`HostValue`] tag set per parameter; the
//! statement layer owns arity checks, name resolution, and error context.

use crate::config::BindPolicy;
use crate::engine::{NativeError, NativeStatement};
use crate::value::HostValue;

/// Failure local to one bind call, before statement context is attached.
pub(crate) enum BindFailure {
    /// An unsigned value exceeding the signed 64-bit range.
    Overflow { value: u64 },
    Engine(NativeError),
}

impl From<NativeError> for BindFailure {
    fn from(err: NativeError) -> Self {
        BindFailure::Engine(err)
    }
}

/// Bind `value` to the 1-based parameter `index`.
pub(crate) fn bind_by_index(
    handle: &mut dyn NativeStatement,
    index: usize,
    value: &HostValue,
    policy: BindPolicy,
) -> Result<(), BindFailure> {
    match value {
        HostValue::Null => handle.bind_null(index)?,
        HostValue::Text(text) => {
            if policy.null_if_empty_string && text.is_empty() {
                handle.bind_null(index)?;
            } else {
                handle.bind_text(index, text)?;
            }
        }
        HostValue::Int(v) => handle.bind_int64(index, *v)?,
        HostValue::UInt(v) => {
            let Ok(signed) = i64::try_from(*v) else {
                return Err(BindFailure::Overflow { value: *v });
            };
            handle.bind_int64(index, signed)?;
        }
        HostValue::Bool(v) => handle.bind_int64(index, i64::from(*v))?,
        HostValue::Float(v) => handle.bind_double(index, *v)?,
        HostValue::Blob(bytes) => handle.bind_blob(index, bytes)?,
        HostValue::Timestamp(ts) => {
            if policy.null_if_zero_time && ts.timestamp() == 0 && ts.timestamp_subsec_nanos() == 0 {
                handle.bind_null(index)?;
            } else {
                handle.bind_int64(index, ts.timestamp())?;
            }
        }
        HostValue::ZeroBlob(len) => handle.bind_zeroblob(index, *len)?,
        HostValue::Json(json) => handle.bind_text(index, &json.to_string())?,
    }
    Ok(())
}
