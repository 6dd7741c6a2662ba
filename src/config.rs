//! Runtime configuration.
//!
//! Every setting can come from a command-line flag or from its
//! `SIMPLEBANK_*` environment variable, falling back to the defaults below.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:simplebank.db?mode=rwc";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "SIMPLEBANK_DATABASE_URL", default_value = DEFAULT_DATABASE_URL, global = true)]
    pub database_url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "SIMPLEBANK_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS, global = true)]
    pub max_connections: u32,

    /// How long a unit of work waits for the write lock before failing (milliseconds)
    #[arg(long, env = "SIMPLEBANK_BUSY_TIMEOUT_MS", default_value_t = DEFAULT_BUSY_TIMEOUT_MS, global = true)]
    pub busy_timeout_ms: u64,

    /// Log output format
    #[arg(long, env = "SIMPLEBANK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain, global = true)]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_format: LogFormat::Plain,
        }
    }
}

impl Config {
    /// Configuration for a database file at the given path, created if missing.
    pub fn for_path(path: &Path) -> Self {
        Self {
            database_url: format!("sqlite:{}?mode=rwc", path.display()),
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Build the SQLite connection options for this configuration.
    pub fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&self.database_url)
            .with_context(|| format!("Invalid database URL: {}", self.database_url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout());
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Plain);
    }

    #[test]
    fn test_for_path_builds_sqlite_url() {
        let config = Config::for_path(Path::new("/tmp/bank.db")).with_max_connections(10);
        assert_eq!(config.database_url, "sqlite:/tmp/bank.db?mode=rwc");
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_busy_timeout_follows_setting() {
        let config = Config {
            busy_timeout_ms: 250,
            ..Config::default()
        };
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert!(config.connect_options().is_ok());
    }
}
