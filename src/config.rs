// Configuration module for repograph
// Reads from environment variables with sensible defaults

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Connect timeout for graph RPC, also applied to reads and writes
    /// (REPOGRAPH_RPC_TIMEOUT_SECS)
    pub rpc_timeout_secs: u64,

    /// Default `k` for `search` when a request omits it (REPOGRAPH_SEARCH_LIMIT)
    pub search_limit: usize,

    /// Default `max_hops` for `get_related` when a request omits it (REPOGRAPH_MAX_HOPS)
    pub max_hops: usize,

    /// Files larger than this are skipped while indexing (REPOGRAPH_MAX_FILE_BYTES)
    pub max_file_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_timeout_secs: 30,
            search_limit: 10,
            max_hops: 2,
            max_file_bytes: 1_048_576,
        }
    }
}

impl Config {
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        override_from(
            &lookup,
            "REPOGRAPH_RPC_TIMEOUT_SECS",
            &mut config.rpc_timeout_secs,
        );
        override_from(&lookup, "REPOGRAPH_SEARCH_LIMIT", &mut config.search_limit);
        override_from(&lookup, "REPOGRAPH_MAX_HOPS", &mut config.max_hops);
        override_from(
            &lookup,
            "REPOGRAPH_MAX_FILE_BYTES",
            &mut config.max_file_bytes,
        );
        if config.rpc_timeout_secs == 0 {
            tracing::warn!(
                "REPOGRAPH_RPC_TIMEOUT_SECS must be positive, using default: {}",
                Config::default().rpc_timeout_secs
            );
            config.rpc_timeout_secs = Config::default().rpc_timeout_secs;
        }
        config
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}

fn override_from<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T: FromStr + Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => {
            tracing::warn!("Invalid {key} value: {raw}, using default: {slot}");
        }
    }
}
