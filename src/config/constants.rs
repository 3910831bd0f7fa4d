//! Configuration constants.
//!
//! This module defines the constants used throughout the application,
//! including API endpoints, probe windows, trigger timing and retry parameters.

use std::time::Duration;

/// Default SQLite database holding schedules and triggers.
pub const DB_PATH: &str = "./search_backup.db";

/// Default directory under which backup workbooks are written.
pub const OUTPUT_DIR: &str = "./backups";

/// Workbook that manual imports write into (relative to the output directory).
pub const IMPORT_WORKBOOK: &str = "Search Analytics Import";

/// Base URL of the search-analytics API.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/webmasters/v3";

/// Per-request HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 60;

/// User-Agent sent with every analytics request.
pub const DEFAULT_USER_AGENT: &str = concat!("search_backup/", env!("CARGO_PKG_VERSION"));

// Query limits
/// Maximum number of rows the API returns for a single query.
pub const MAX_ROW_LIMIT: u32 = 25_000;
/// How far back the API keeps data, in months.
pub const DATA_RETENTION_MONTHS: u32 = 16;
/// Maximum length of an upstream error body kept in an error message.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

// Availability probing
/// Closest day to today that may already hold data.
pub const PROBE_MIN_DAY_LAG: u32 = 2;
/// Furthest day back the daily probe looks at.
pub const PROBE_MAX_DAY_LAG: u32 = 7;
/// Number of full calendar months the monthly probe looks at.
pub const PROBE_MONTHS_BACK: u32 = 3;

// Trigger timing
/// Hour of day (local time) at which backup triggers fire.
pub const TRIGGER_HOUR: u32 = 2;
/// Day of month on which monthly triggers fire.
pub const MONTHLY_TRIGGER_DAY: u32 = 3;
/// How often the daemon checks for due triggers.
pub const SCHEDULER_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Soft wall-clock budget for a manual import, checked before the import starts.
pub const IMPORT_TIME_BUDGET: Duration = Duration::from_secs(5 * 60);

// Storage keys and destination naming
/// Prefix of every configuration key in the store.
pub const CONFIG_KEY_PREFIX: &str = "backup_";
/// Folder that collects scheduled backup workbooks.
pub const BACKUP_FOLDER_NAME: &str = "Search Console Backups";
/// Label of the first sheet of a backup workbook.
pub const PRIMARY_SHEET_NAME: &str = "Backup Data";
/// Label of the optional sheet holding the four base dimensions.
pub const UNGROUPED_SHEET_NAME: &str = "Ungrouped Data";

// Retry strategy
/// Initial delay in milliseconds before first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 1000;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 20;
/// Retries after the first attempt for transient analytics failures
pub const RETRY_MAX_ATTEMPTS: usize = 3;

/// HTTP status for rate limiting; retried like a server error.
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
