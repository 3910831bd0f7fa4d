//! Error type definitions.
//!
//! This module defines the error types used throughout the application. Every
//! `BackupError` message is written to be shown to the caller as-is.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// Invalid configuration detected at startup.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Schema migration error.
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Error types for the tabular sink (sheets, workbooks, folders).
#[derive(Error, Debug)]
pub enum SheetError {
    /// Filesystem failure while reading or writing a workbook.
    #[error("Workbook I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook manifest could not be read or written.
    #[error("Workbook manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// The named sheet or workbook does not exist.
    #[error("{0} not found")]
    Missing(String),

    /// The sink refused the operation.
    #[error("{0}")]
    Rejected(String),
}

/// Errors surfaced by backup, import and schedule operations.
///
/// Grouped as: caller input (`Validation`), credentials and permissions
/// (`Auth`, `AccessDenied`, `AccessRevoked`), upstream API responses
/// (`BadRequest`, `NotFound`, `Upstream`, `Transport`), missing or broken
/// state (`ConfigNotFound`, `InvalidConfig`, `TriggerNotFound`), destination
/// and infrastructure (`Write`, `Database`, `Schedule`, `Notification`), the
/// soft time budget (`TimeoutExceeded`) and schedule state misuse
/// (`AlreadyPaused`, `NotPaused`).
#[derive(Error, Debug)]
pub enum BackupError {
    /// Bad or missing caller input.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The bearer token is missing or was rejected (HTTP 401).
    #[error("Authentication failed: {0}. Sign in again or refresh the access token.")]
    Auth(String),

    /// The token is valid but lacks permission for the property (HTTP 403).
    #[error("Access denied: {0}. Make sure the account has at least restricted access to this property.")]
    AccessDenied(String),

    /// The configured website is no longer among the verified sites.
    #[error("Access to {website} has been revoked or the property is no longer verified for this account. Re-verify the property or delete this schedule.")]
    AccessRevoked {
        /// Website the schedule is configured for
        website: String,
    },

    /// The API rejected the request (HTTP 400); carries the API's explanation.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The API reported the resource as missing (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success response from the API.
    #[error("Analytics API error (HTTP {status}): {body}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Excerpt of the response body
        body: String,
    },

    /// The request never produced an HTTP response (connect, timeout, decode).
    #[error("Could not reach the analytics API: {0}")]
    Transport(#[from] ReqwestError),

    /// No stored configuration for the schedule id.
    #[error("No backup configuration found for schedule {0}")]
    ConfigNotFound(String),

    /// Stored configuration is incomplete or unreadable.
    #[error("Invalid backup configuration: {0}")]
    InvalidConfig(String),

    /// The trigger backing a schedule does not exist.
    #[error("Trigger {0} not found")]
    TriggerNotFound(String),

    /// Writing to the destination failed after the fallback path.
    #[error("Failed to write data: {0}")]
    Write(String),

    /// The soft wall-clock budget was used up before the import started.
    #[error("Operation exceeded its time budget ({elapsed_secs}s elapsed, budget {budget_secs}s). Try again with a smaller date range.")]
    TimeoutExceeded {
        /// Seconds already spent
        elapsed_secs: u64,
        /// Budget in seconds
        budget_secs: u64,
    },

    /// Pause requested for a schedule that is already paused.
    #[error("Schedule {0} is already paused")]
    AlreadyPaused(String),

    /// Resume requested for a schedule that is not paused.
    #[error("Schedule {0} is not paused")]
    NotPaused(String),

    /// Trigger specification could not be turned into a schedule.
    #[error("Invalid trigger schedule: {0}")]
    Schedule(String),

    /// Sending a notification failed.
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Configuration store or trigger table failure.
    #[error("Storage error: {0}")]
    Database(#[from] DatabaseError),
}

impl BackupError {
    /// Returns a short, stable label for the error category, used in logs.
    pub fn category(&self) -> &'static str {
        match self {
            BackupError::Validation(_) => "validation",
            BackupError::Auth(_) => "auth",
            BackupError::AccessDenied(_) | BackupError::AccessRevoked { .. } => "access",
            BackupError::BadRequest(_) => "bad_request",
            BackupError::NotFound(_)
            | BackupError::ConfigNotFound(_)
            | BackupError::TriggerNotFound(_) => "not_found",
            BackupError::Upstream { .. } | BackupError::Transport(_) => "upstream",
            BackupError::InvalidConfig(_) => "invalid_config",
            BackupError::Write(_) => "write",
            BackupError::TimeoutExceeded { .. } => "timeout",
            BackupError::AlreadyPaused(_) | BackupError::NotPaused(_) => "state",
            BackupError::Schedule(_) => "schedule",
            BackupError::Notification(_) => "notification",
            BackupError::Database(_) => "storage",
        }
    }
}

impl From<sqlx::Error> for BackupError {
    fn from(e: sqlx::Error) -> Self {
        BackupError::Database(DatabaseError::SqlError(e))
    }
}

impl From<SheetError> for BackupError {
    fn from(e: SheetError) -> Self {
        BackupError::Write(e.to_string())
    }
}
