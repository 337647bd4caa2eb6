//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so application code
//! can bring the whole statement surface in with one `use`.

pub use crate::config::{BindPolicy, EngineConfig, ThreadingMode};
pub use crate::cursor::CursorState;
pub use crate::engine::{
    CompiledHandle, NativeConnection, NativeError, NativeStatement, StepOutcome,
};
pub use crate::error::SqliteMiddlewareError;
pub use crate::scan::ScanTarget;
pub use crate::session::{Session, SessionBuilder};
pub use crate::statement::Statement;
pub use crate::value::{ColumnScanner, HostValue, StorageClass, StorageValue, ToHostValue};
