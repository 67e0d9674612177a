//! Charts configuration from environment variables

use std::env;
use std::time::Duration;

/// Configuration for the charts store and its host runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartsConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Byte budget for one query payload before averaging kicks in
    pub max_data_size: usize,

    /// Channel buffer size for host events
    pub event_buffer: usize,

    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,
}

pub const DEFAULT_DB_PATH: &str = "/var/lib/sensorcharts/charts.db";
pub const DEFAULT_MAX_DATA_SIZE: usize = 1_000_000;
pub const DEFAULT_EVENT_BUFFER: usize = 1_000;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            max_data_size: DEFAULT_MAX_DATA_SIZE,
            event_buffer: DEFAULT_EVENT_BUFFER,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl ChartsConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `CHARTS_DB_PATH` (default: /var/lib/sensorcharts/charts.db)
    /// - `CHARTS_MAX_DATA_SIZE` (default: 1000000)
    /// - `CHARTS_EVENT_BUFFER` (default: 1000)
    /// - `CHARTS_BUSY_TIMEOUT_MS` (default: 5000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("CHARTS_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),

            max_data_size: env::var("CHARTS_MAX_DATA_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_DATA_SIZE),

            event_buffer: env::var("CHARTS_EVENT_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(DEFAULT_EVENT_BUFFER),

            busy_timeout_ms: env::var("CHARTS_BUSY_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<String>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_max_data_size(mut self, max_data_size: usize) -> Self {
        self.max_data_size = max_data_size;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
