//! Per-connection pool of idle compiled statements.
//!
//! Keyed by exact SQL text (byte-for-byte, no normalization) through an
//! explicit hash index into an intrusive recency list over a slab, so
//! eviction order and handle-ownership transfer stay auditable. Checkout
//! removes the entry: a statement is either idle in the pool or checked out,
//! never both.

use std::collections::HashMap;

use tracing::warn;

use crate::cursor::RowCursor;
use crate::error::SqliteMiddlewareError;
use crate::statement::StmtCore;

struct Entry {
    key: String,
    core: StmtCore,
    prev: Option<usize>,
    next: Option<usize>,
}

pub(crate) struct StatementCache {
    map: HashMap<String, usize>,
    entries: Vec<Entry>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
}

impl StatementCache {
    /// A capacity of zero disables caching entirely.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, sql: &str) -> bool {
        self.map.contains_key(sql)
    }

    /// Check out the idle statement exactly matching `sql`, removing it from
    /// the pool. Returns `None` when no idle entry matches (including when an
    /// identical-text statement is currently checked out).
    pub(crate) fn find(&mut self, sql: &str) -> Option<StmtCore> {
        let index = self.map.remove(sql)?;
        self.unlink(index);
        Some(self.take_entry(index).core)
    }

    /// Check a statement back in: reset its execution state and bindings,
    /// insert it as most recently used, and evict the least recently used
    /// entry when over capacity.
    ///
    /// A statement whose reset fails is destroyed outright rather than
    /// cached. Eviction destruction failures are logged, never surfaced, so
    /// checking a statement in cannot fail because of an unrelated entry.
    pub(crate) fn release(&mut self, mut core: StmtCore) -> Result<(), SqliteMiddlewareError> {
        if self.capacity == 0 {
            return Self::destroy(core);
        }

        core.cursor = RowCursor::new();
        let reset = core
            .handle
            .reset()
            .and_then(|()| core.handle.clear_bindings());
        if let Err(err) = reset {
            let sql = (*core.sql).clone();
            Self::destroy_logged(core);
            return Err(SqliteMiddlewareError::NativeEngine {
                code: err.code,
                message: err.message,
                sql: Some(sql),
            });
        }

        // One idle entry per SQL text: an earlier release of identical text
        // gives way to the freshly reset handle.
        if let Some(index) = self.map.remove(core.sql.as_str()) {
            self.unlink(index);
            let old = self.take_entry(index);
            Self::destroy_logged(old.core);
        }

        let key = (*core.sql).clone();
        let index = self.entries.len();
        let old_head = self.head;
        self.entries.push(Entry {
            key: key.clone(),
            core,
            prev: None,
            next: old_head,
        });
        if let Some(old_head) = old_head {
            self.entries[old_head].prev = Some(index);
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
        self.map.insert(key, index);

        if self.entries.len() > self.capacity {
            self.evict_lru();
        }
        Ok(())
    }

    /// Destroy every idle statement. Failures are logged.
    pub(crate) fn flush(&mut self) {
        self.map.clear();
        self.head = None;
        self.tail = None;
        for entry in self.entries.drain(..) {
            Self::destroy_logged(entry.core);
        }
    }

    fn evict_lru(&mut self) {
        let Some(tail) = self.tail else { return };
        let key = self.entries[tail].key.clone();
        self.map.remove(&key);
        self.unlink(tail);
        let entry = self.take_entry(tail);
        Self::destroy_logged(entry.core);
    }

    fn destroy(mut core: StmtCore) -> Result<(), SqliteMiddlewareError> {
        core.handle
            .finalize()
            .map_err(|err| SqliteMiddlewareError::NativeEngine {
                code: err.code,
                message: err.message,
                sql: Some((*core.sql).clone()),
            })
    }

    fn destroy_logged(mut core: StmtCore) {
        if let Err(err) = core.handle.finalize() {
            warn!(sql = %core.sql, code = err.code, error = %err.message,
                "failed to finalize cached statement");
        }
    }

    fn unlink(&mut self, index: usize) {
        let prev = self.entries[index].prev;
        let next = self.entries[index].next;
        if let Some(prev) = prev {
            self.entries[prev].next = next;
        } else {
            self.head = next;
        }
        if let Some(next) = next {
            self.entries[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.entries[index].prev = None;
        self.entries[index].next = None;
    }

    /// Remove an unlinked slot from the slab, fixing up the index of the
    /// entry swapped into its place.
    fn take_entry(&mut self, index: usize) -> Entry {
        let entry = self.entries.swap_remove(index);
        if index < self.entries.len() {
            let moved_key = self.entries[index].key.clone();
            self.map.insert(moved_key, index);
            if let Some(prev) = self.entries[index].prev {
                self.entries[prev].next = Some(index);
            } else {
                self.head = Some(index);
            }
            if let Some(next) = self.entries[index].next {
                self.entries[next].prev = Some(index);
            } else {
                self.tail = Some(index);
            }
        }
        entry
    }
}
