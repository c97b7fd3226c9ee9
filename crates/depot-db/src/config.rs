//! # Depot Configuration
//!
//! Service-level configuration: where the database lives and the ledger
//! policies that are not hard rules.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DEPOT_DB_PATH=/var/lib/depot/depot.db                              │
//! │     DEPOT_DB_MAX_CONNECTIONS=8                                         │
//! │     DEPOT_MOVE_RETENTION_DAYS=730                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/depot/depot.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.depot.depot/depot.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/depot/depot.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [ledger]
//! move_retention_days = 730
//! default_payment_terms_days = 30
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `depot.db` in the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Write-lock wait in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "depot", "depot")
        .map(|dirs| dirs.data_dir().join("depot.db"))
        .unwrap_or_else(|| PathBuf::from("depot.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// Upper bound for the day-count policies (about a century).
pub const MAX_POLICY_DAYS: u32 = 36_500;

/// `[ledger]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Move history entries older than this are eligible for purging.
    /// 0 disables purging.
    #[serde(default = "default_retention_days")]
    pub move_retention_days: u32,

    /// Due date offset applied to invoices created without one.
    #[serde(default = "default_payment_terms_days")]
    pub default_payment_terms_days: u32,
}

fn default_retention_days() -> u32 {
    730
}

fn default_payment_terms_days() -> u32 {
    30
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            move_retention_days: default_retention_days(),
            default_payment_terms_days: default_payment_terms_days(),
        }
    }
}

impl LedgerSettings {
    /// Purge cutoff relative to `now`, or `None` when retention is disabled.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DbResult<Option<DateTime<Utc>>> {
        if self.move_retention_days == 0 {
            return Ok(None);
        }

        now.checked_sub_signed(ChronoDuration::days(i64::from(self.move_retention_days)))
            .map(Some)
            .ok_or_else(|| {
                DbError::InvalidConfig(format!(
                    "ledger.move_retention_days = {} is out of range",
                    self.move_retention_days
                ))
            })
    }

    fn check(&self) -> DbResult<()> {
        for (name, days) in [
            ("ledger.move_retention_days", self.move_retention_days),
            ("ledger.default_payment_terms_days", self.default_payment_terms_days),
        ] {
            if days > MAX_POLICY_DAYS {
                return Err(DbError::InvalidConfig(format!(
                    "{name} must be at most {MAX_POLICY_DAYS}, got {days}"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Depot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepotConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl DepotConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (depot.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading depot config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a config file body.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::InvalidConfig("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        self.ledger.check()
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("DEPOT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("DEPOT_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid DEPOT_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(days) = std::env::var("DEPOT_MOVE_RETENTION_DAYS") {
            match days.parse::<u32>() {
                Ok(n) => self.ledger.move_retention_days = n,
                Err(_) => warn!(value = %days, "Ignoring invalid DEPOT_MOVE_RETENTION_DAYS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "depot", "depot")
            .map(|dirs| dirs.config_dir().join("depot.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DepotConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.ledger.move_retention_days, 730);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DepotConfig::from_toml(
            r#"
            [database]
            path = "/tmp/depot-test.db"

            [ledger]
            move_retention_days = 90
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/depot-test.db"));
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.ledger.move_retention_days, 90);
        assert_eq!(config.ledger.default_payment_terms_days, 30);

        let db = config.db_config();
        assert_eq!(db.busy_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = DepotConfig::default();
        config.database.max_connections = 0;
        assert!(matches!(config.validate(), Err(DbError::InvalidConfig(_))));

        assert!(DepotConfig::from_toml("[database]\nmax_connections = \"many\"").is_err());
    }

    #[test]
    fn test_retention_cutoff() {
        let now = Utc::now();
        let mut ledger = LedgerSettings::default();
        ledger.move_retention_days = 10;
        assert_eq!(
            ledger.retention_cutoff(now).unwrap(),
            Some(now - ChronoDuration::days(10))
        );

        ledger.move_retention_days = 0;
        assert_eq!(ledger.retention_cutoff(now).unwrap(), None);
    }

    #[test]
    fn test_policy_days_are_bounded() {
        let config =
            DepotConfig::from_toml("[ledger]\ndefault_payment_terms_days = 4000000000").unwrap();
        assert!(matches!(config.validate(), Err(DbError::InvalidConfig(_))));

        let config = DepotConfig::from_toml("[ledger]\nmove_retention_days = 36501").unwrap();
        assert!(matches!(config.validate(), Err(DbError::InvalidConfig(_))));

        let config = DepotConfig::from_toml(
            "[ledger]\nmove_retention_days = 36500\ndefault_payment_terms_days = 36500",
        )
        .unwrap();
        assert!(config.validate().is_ok());

        // Still refused, not panicking, when validation was skipped
        let mut ledger = LedgerSettings::default();
        ledger.move_retention_days = u32::MAX;
        assert!(ledger.retention_cutoff(DateTime::<Utc>::MIN_UTC).is_err());
    }
}
