//! Configuration types.
//!
//! This module defines the enums and structs used to configure the library
//! and the command-line front end.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::{
    DB_PATH, DEFAULT_API_BASE, HTTP_TIMEOUT_SECS, IMPORT_TIME_BUDGET, IMPORT_WORKBOOK, OUTPUT_DIR,
    PROBE_MAX_DAY_LAG, PROBE_MIN_DAY_LAG, PROBE_MONTHS_BACK, RETRY_MAX_ATTEMPTS,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Backward search window used when looking for the newest data.
///
/// Daily probes look at `today - min_day_lag ..= today - max_day_lag`, closest
/// day first. Monthly probes look at the `months_back` full calendar months
/// before the current one, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeWindow {
    /// Closest day to today that is probed
    pub min_day_lag: u32,
    /// Furthest day back that is probed
    pub max_day_lag: u32,
    /// Number of full months probed
    pub months_back: u32,
}

impl Default for ProbeWindow {
    fn default() -> Self {
        Self {
            min_day_lag: PROBE_MIN_DAY_LAG,
            max_day_lag: PROBE_MAX_DAY_LAG,
            months_back: PROBE_MONTHS_BACK,
        }
    }
}

/// Library configuration (no CLI dependencies).
///
/// # Examples
///
/// ```no_run
/// use search_backup::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     db_path: PathBuf::from("./schedules.db"),
///     token: Some("ya29.token".to_string()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,

    /// Database path (SQLite file) for schedules and triggers
    pub db_path: PathBuf,

    /// Directory that holds workbooks (manual imports and backups)
    pub output_dir: PathBuf,

    /// Workbook used by manual imports
    pub import_workbook: String,

    /// Base URL of the analytics API
    pub api_base: String,

    /// Bearer token for the analytics API
    pub token: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Retries after the first attempt for transient API failures
    pub max_retries: usize,

    /// Mail relay endpoint for notifications (logged only when absent)
    pub notification_webhook: Option<String>,

    /// Recipient address passed to the mail relay
    pub notification_recipient: Option<String>,

    /// Availability probe window
    pub probe_window: ProbeWindow,

    /// Soft budget for manual imports
    pub import_time_budget: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            db_path: PathBuf::from(DB_PATH),
            output_dir: PathBuf::from(OUTPUT_DIR),
            import_workbook: IMPORT_WORKBOOK.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            timeout_seconds: HTTP_TIMEOUT_SECS,
            max_retries: RETRY_MAX_ATTEMPTS,
            notification_webhook: None,
            notification_recipient: None,
            probe_window: ProbeWindow::default(),
            import_time_budget: IMPORT_TIME_BUDGET,
        }
    }
}

impl Config {
    /// Checks settings that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_seconds == 0 {
            return Err("timeout_seconds must be greater than 0".to_string());
        }
        if self.import_workbook.trim().is_empty() {
            return Err("import workbook name must not be empty".to_string());
        }
        let window = &self.probe_window;
        if window.min_day_lag > window.max_day_lag {
            return Err(format!(
                "probe window is inverted: min day lag {} exceeds max day lag {}",
                window.min_day_lag, window.max_day_lag
            ));
        }
        if window.months_back == 0 {
            return Err("probe window must cover at least one month".to_string());
        }
        if let Some(url) = &self.notification_webhook {
            url::Url::parse(url).map_err(|e| format!("invalid notification webhook: {e}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.db_path, PathBuf::from("./search_backup.db"));
        assert_eq!(config.timeout_seconds, 60);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.import_time_budget, Duration::from_secs(300));
        assert!(config.token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_probe_window_default() {
        let window = ProbeWindow::default();
        assert_eq!(window.min_day_lag, 2);
        assert_eq!(window.max_day_lag, 7);
        assert_eq!(window.months_back, 3);
    }

    #[test]
    fn test_config_rejects_inverted_probe_window() {
        let config = Config {
            probe_window: ProbeWindow {
                min_day_lag: 8,
                max_day_lag: 3,
                months_back: 1,
            },
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("inverted"));
    }

    #[test]
    fn test_config_rejects_bad_webhook() {
        let config = Config {
            notification_webhook: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
