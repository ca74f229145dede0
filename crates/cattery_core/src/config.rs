//! Runtime configuration for the cattery core.
//!
//! # Responsibility
//! - Describe where the store lives and how long writers wait for its lock.
//! - Carry logging bootstrap parameters for hosts that initialize logging.
//!
//! # Invariants
//! - `db_path = None` always means an in-memory store.
//! - Environment overrides never panic; malformed values are reported.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Default time a connection waits for a competing writer's lock.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub const ENV_DB_PATH: &str = "CATTERY_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CATTERY_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "CATTERY_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CATTERY_LOG_DIR";

/// Store and logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite database file. `None` opens an in-memory database.
    pub db_path: Option<PathBuf>,
    /// Milliseconds to wait on `SQLITE_BUSY` before failing a write.
    pub busy_timeout_ms: u64,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. `None` leaves logging off.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

/// Rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value `{}` for {}", self.value, self.key)
    }
}

impl Error for ConfigError {}

impl CoreConfig {
    /// Builds a config from `CATTERY_*` environment variables on top of the
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CoreConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = non_blank(lookup(ENV_DB_PATH)) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = non_blank(lookup(ENV_BUSY_TIMEOUT_MS)) {
            config.busy_timeout_ms = raw.parse().map_err(|_| ConfigError {
                key: ENV_BUSY_TIMEOUT_MS,
                value: raw.clone(),
            })?;
        }
        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.log_level = level;
        }
        if let Some(dir) = non_blank(lookup(ENV_LOG_DIR)) {
            config.log_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ENV_BUSY_TIMEOUT_MS, ENV_DB_PATH, ENV_LOG_DIR};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_in_memory_defaults() {
        let config = CoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert!(config.db_path.is_none());
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, "/tmp/cattery.db"),
            (ENV_BUSY_TIMEOUT_MS, " 250 "),
            (ENV_LOG_DIR, "   "),
        ]))
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/cattery.db")));
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn malformed_busy_timeout_is_rejected() {
        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_BUSY_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert_eq!(err.key, ENV_BUSY_TIMEOUT_MS);
        assert_eq!(err.value, "soon");
    }

    #[test]
    fn partial_json_config_falls_back_to_defaults() {
        let config: CoreConfig =
            serde_json::from_str(r#"{"db_path": "/var/lib/cattery.db"}"#).unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/var/lib/cattery.db")));
        assert_eq!(config.busy_timeout_ms, 5_000);
    }
}
