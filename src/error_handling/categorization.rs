//! Error categorization and retry strategy.
//!
//! This module maps analytics API responses onto `BackupError` variants and
//! decides which failures are worth retrying.

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use crate::config::{
    HTTP_STATUS_TOO_MANY_REQUESTS, MAX_ERROR_BODY_CHARS, RETRY_FACTOR, RETRY_INITIAL_DELAY_MS,
    RETRY_MAX_DELAY_SECS,
};

use super::types::BackupError;

/// Creates an exponential backoff retry strategy.
///
/// Returns a retry strategy configured with:
/// - Initial delay: `RETRY_INITIAL_DELAY_MS` milliseconds
/// - Backoff factor: `RETRY_FACTOR` (doubles delay each retry)
/// - Maximum delay: `RETRY_MAX_DELAY_SECS` seconds
/// - At most `max_retries` retries after the first attempt
pub fn get_retry_strategy(max_retries: usize) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(RETRY_INITIAL_DELAY_MS)
        .factor(RETRY_FACTOR)
        .max_delay(Duration::from_secs(RETRY_MAX_DELAY_SECS))
        .take(max_retries)
}

/// Determines if an error is transient and the request should be retried.
///
/// Transport failures, rate limiting and server errors are retried; every
/// classified client error (400, 401, 403, 404) and local failure is not.
pub fn is_retriable(error: &BackupError) -> bool {
    match error {
        BackupError::Transport(e) => !e.is_builder() && !e.is_decode(),
        BackupError::Upstream { status, .. } => {
            *status == HTTP_STATUS_TOO_MANY_REQUESTS || (500..600).contains(status)
        }
        _ => false,
    }
}

/// Classifies a non-success analytics response by status code.
///
/// The API reports failures as `{"error": {"message": ...}}`; when that shape
/// is present its message is used, otherwise a trimmed excerpt of the body.
pub fn classify_status(status: u16, body: &str) -> BackupError {
    let detail = extract_error_message(body);
    match status {
        400 => BackupError::BadRequest(detail),
        401 => BackupError::Auth(detail),
        403 => BackupError::AccessDenied(detail),
        404 => BackupError::NotFound(detail),
        _ => BackupError::Upstream {
            status,
            body: detail,
        },
    }
}

fn extract_error_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    truncate_message(&message)
}

/// Truncates a message to `MAX_ERROR_BODY_CHARS` characters.
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_BODY_CHARS {
        return message.to_string();
    }
    let truncated: String = message.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{truncated}...")
}
