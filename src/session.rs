//! Session: one native connection, its statement cache, and bind policy.

use std::cell::{Cell, RefCell};

use tracing::debug;

use crate::cache::StatementCache;
use crate::config::{self, BindPolicy};
use crate::engine::NativeConnection;
use crate::error::SqliteMiddlewareError;
use crate::statement::{Statement, StmtCore};
use crate::value::HostValue;

/// Owner of one native connection handle and the idle-statement pool in
/// front of it.
///
/// A session is single-owner: nothing here locks, and a connection shared
/// across threads of control must be serialized by the caller (or by the
/// engine's own threading mode). Dropping the session destroys every idle
/// cached statement.
pub struct Session {
    raw: Box<dyn NativeConnection>,
    cache: RefCell<StatementCache>,
    bind_policy: Cell<BindPolicy>,
    check_type_mismatch: bool,
}

/// Fluent builder; defaults come from the process-wide
/// [`EngineConfig`](crate::config::EngineConfig).
pub struct SessionBuilder {
    raw: Box<dyn NativeConnection>,
    cache_capacity: usize,
    bind_policy: BindPolicy,
    check_type_mismatch: bool,
}

impl SessionBuilder {
    #[must_use]
    pub fn new(raw: Box<dyn NativeConnection>) -> Self {
        let defaults = config::global();
        Self {
            raw,
            cache_capacity: defaults.statement_cache_capacity,
            bind_policy: defaults.bind_policy,
            check_type_mismatch: defaults.check_type_mismatch,
        }
    }

    /// Statement-cache capacity; zero disables caching.
    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn bind_policy(mut self, policy: BindPolicy) -> Self {
        self.bind_policy = policy;
        self
    }

    /// Default for the per-statement lossy-conversion check.
    #[must_use]
    pub fn check_type_mismatch(mut self, check: bool) -> Self {
        self.check_type_mismatch = check;
        self
    }

    #[must_use]
    pub fn build(self) -> Session {
        Session {
            raw: self.raw,
            cache: RefCell::new(StatementCache::new(self.cache_capacity)),
            bind_policy: Cell::new(self.bind_policy),
            check_type_mismatch: self.check_type_mismatch,
        }
    }
}

impl Session {
    /// Session with the process-wide defaults.
    #[must_use]
    pub fn new(raw: Box<dyn NativeConnection>) -> Self {
        SessionBuilder::new(raw).build()
    }

    #[must_use]
    pub fn builder(raw: Box<dyn NativeConnection>) -> SessionBuilder {
        SessionBuilder::new(raw)
    }

    /// Look up the statement cache for `sql` (exact text) or compile it.
    ///
    /// While a handle for the same text is checked out, a second `prepare`
    /// compiles a fresh one; handles are never shared.
    ///
    /// # Errors
    ///
    /// A wrapped engine error when compilation fails.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>, SqliteMiddlewareError> {
        if let Some(core) = self.cache.borrow_mut().find(sql) {
            debug!(sql, "statement cache hit");
            return Ok(Statement::from_cache(self, core));
        }
        let compiled =
            self.raw
                .compile(sql)
                .map_err(|err| SqliteMiddlewareError::NativeEngine {
                    code: err.code,
                    message: err.message,
                    sql: Some(sql.to_owned()),
                })?;
        debug!(sql, "compiled new statement");
        let cacheable = self.cache.borrow().capacity() > 0;
        Ok(Statement::fresh(self, compiled, sql, cacheable))
    }

    /// [`prepare`](Self::prepare), then bind `args`. A statement whose bind
    /// fails is destroyed rather than returned to the cache, so no handle
    /// in an unknown state is pooled.
    ///
    /// # Errors
    ///
    /// Any prepare or bind error.
    pub fn prepare_bound(
        &self,
        sql: &str,
        args: &[HostValue],
    ) -> Result<Statement<'_>, SqliteMiddlewareError> {
        let mut statement = self.prepare(sql)?;
        if let Err(err) = statement.bind(args) {
            statement.discard();
            return Err(err);
        }
        Ok(statement)
    }

    /// Number of rows changed by the most recent DML statement.
    #[must_use]
    pub fn changes(&self) -> u64 {
        self.raw.changes()
    }

    /// Rowid of the most recent successful insert.
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.raw.last_insert_rowid()
    }

    /// Whether the underlying native connection is still live.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.raw.is_open()
    }

    #[must_use]
    pub fn bind_policy(&self) -> BindPolicy {
        self.bind_policy.get()
    }

    /// Adjust the null-substitution policy for subsequent binds.
    pub fn set_bind_policy(&self, policy: BindPolicy) {
        self.bind_policy.set(policy);
    }

    pub(crate) fn check_type_mismatch_default(&self) -> bool {
        self.check_type_mismatch
    }

    pub(crate) fn release_statement(&self, core: StmtCore) -> Result<(), SqliteMiddlewareError> {
        self.cache.borrow_mut().release(core)
    }

    /// Whether an idle statement for exactly this SQL text is pooled.
    #[must_use]
    pub fn is_cached(&self, sql: &str) -> bool {
        self.cache.borrow().contains(sql)
    }

    /// Number of idle statements currently pooled.
    #[must_use]
    pub fn cached_statements(&self) -> usize {
        self.cache.borrow().len()
    }

    #[must_use]
    pub fn cache_capacity(&self) -> usize {
        self.cache.borrow().capacity()
    }

    /// Destroy every idle cached statement now.
    pub fn flush_cache(&self) {
        self.cache.borrow_mut().flush();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cache.borrow_mut().flush();
    }
}
