//! Operational knobs (spec §6.3), plus the ambient logging and Update
//! Manager settings a deployable binary needs that the distilled spec is
//! silent on.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Root configuration, loaded from a TOML file at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub log: LogConfig,
    pub update_manager: UpdateManagerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            log: LogConfig::default(),
            update_manager: UpdateManagerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub db_file: String,
    pub limits: Limits,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_file: "world.sqlite".to_string(),
            limits: Limits::default(),
        }
    }
}

/// Size limits enforced by entity setters (spec §3.2, §4.A).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Max UTF-8 code points in an entity name.
    pub entity_name: usize,
    /// Max UTF-8 code points in a player/puppet display name.
    pub player_puppet_name: usize,
    /// Max UTF-8 code points in a general-purpose string field.
    pub string_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            entity_name: 256,
            player_puppet_name: 32,
            string_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing-subscriber` `EnvFilter` directive, e.g. `"info"` or
    /// `"worldgraph=debug,warn"`.
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateManagerConfig {
    /// How often the background thread scans for dirty entities and
    /// retries the deletion queue.
    pub scan_interval_ms: u64,
    /// Initial backoff before retrying an `EntityInUse` delete.
    pub delete_retry_backoff_ms: u64,
    /// Tolerance, in seconds, before a clock change is reported as a jump.
    pub clock_jump_tolerance_secs: i64,
}

impl Default for UpdateManagerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 250,
            delete_retry_backoff_ms: 500,
            clock_jump_tolerance_secs: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = Config::default();
        assert_eq!(config.db.limits.entity_name, 256);
        assert_eq!(config.db.limits.player_puppet_name, 32);
        assert_eq!(config.db.limits.string_size, 4096);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config = Config::from_str(
            r#"
            [db]
            db_file = "/tmp/test.sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(config.db.db_file, "/tmp/test.sqlite");
        assert_eq!(config.db.limits.entity_name, 256);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(Config::from_str("not = [valid").is_err());
    }
}
