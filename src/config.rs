//! Process-wide engine configuration and per-connection bind policy.

use std::sync::OnceLock;

/// Threading discipline requested from the native engine at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadingMode {
    SingleThread,
    MultiThread,
    Serialized,
}

/// Null-substitution policy consulted by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindPolicy {
    /// Bind a zero-length string as Null instead of empty Text.
    pub null_if_empty_string: bool,
    /// Bind the zero timestamp (Unix epoch 0) as Null instead of Integer 0.
    pub null_if_zero_time: bool,
}

impl Default for BindPolicy {
    fn default() -> Self {
        Self {
            null_if_empty_string: true,
            null_if_zero_time: true,
        }
    }
}

/// Default statement-cache capacity for new sessions.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Process-wide configuration, installed once at startup.
///
/// There is a single-writer contract here: [`install`] may be called at most
/// once, before the first session is built, by whichever component owns
/// process startup. Everything else only reads via [`global`]. Sessions
/// snapshot these defaults at build time and can override them locally.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub threading: ThreadingMode,
    pub bind_policy: BindPolicy,
    pub statement_cache_capacity: usize,
    /// Default for the per-statement lossy-conversion check.
    pub check_type_mismatch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threading: ThreadingMode::Serialized,
            bind_policy: BindPolicy::default(),
            statement_cache_capacity: DEFAULT_CACHE_CAPACITY,
            check_type_mismatch: true,
        }
    }
}

static GLOBAL: OnceLock<EngineConfig> = OnceLock::new();

/// Install the process-wide configuration.
///
/// # Errors
///
/// Returns the rejected configuration when one was already installed (or
/// already read through [`global`], which freezes the defaults).
pub fn install(config: EngineConfig) -> Result<(), EngineConfig> {
    GLOBAL.set(config)
}

/// The installed configuration, or the defaults when none was installed.
pub fn global() -> &'static EngineConfig {
    GLOBAL.get_or_init(EngineConfig::default)
}
