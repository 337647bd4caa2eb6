//! Client-side statement layer for an embedded SQL engine.
//!
//! This crate sits between application code and a native engine connection:
//! it compiles SQL into reusable prepared statements, marshals host values
//! into engine bindings, steps result cursors, and scans column values back
//! into host types. Connections themselves are supplied from outside through
//! the [`engine::NativeConnection`] seam.
//!
//! The main entry point is [`Session`], which owns a per-connection LRU
//! statement cache keyed by exact SQL text:
//!
//! ```
//! use sqlite_middleware::prelude::*;
//! use sqlite_middleware::test_utils::{FakeEngine, Script};
//!
//! # fn main() -> Result<(), SqliteMiddlewareError> {
//! let engine = FakeEngine::new();
//! engine.script(
//!     "SELECT id FROM users WHERE name = ?",
//!     Script::returning(vec!["id".into()], vec![vec![StorageValue::Integer(7)]]),
//! );
//!
//! let session = Session::new(engine.connection());
//! let mut stmt = session.prepare("SELECT id FROM users WHERE name = ?")?;
//! stmt.bind(&[HostValue::from("gwen")])?;
//! assert!(stmt.next()?);
//!
//! let mut id = 0i64;
//! stmt.scan(vec![ScanTarget::Int64(&mut id)])?;
//! assert_eq!(id, 7);
//! stmt.finalize()?;
//! # Ok(())
//! # }
//! ```
//!
//! Binding and scanning follow the engine's loose typing with an opt-in
//! guard: [`config::BindPolicy`] controls null substitution for empty
//! strings and zero timestamps, and the per-statement mismatch check rejects
//! lossy narrowing conversions with
//! [`SqliteMiddlewareError::TypeMismatch`].

mod bind;
mod cache;
mod cursor;

pub mod config;
pub mod datetime;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod scan;
pub mod session;
pub mod statement;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cursor::CursorState;
pub use error::SqliteMiddlewareError;
pub use scan::ScanTarget;
pub use session::{Session, SessionBuilder};
pub use statement::Statement;
pub use value::{ColumnScanner, HostValue, StorageClass, StorageValue, ToHostValue};
