//! Error handling.
//!
//! This module provides:
//! - Error type definitions (`BackupError` taxonomy, storage, sink and startup errors)
//! - Classification of analytics API responses
//! - Retry strategy configuration

mod categorization;
mod types;

// Re-export public API
pub use categorization::{classify_status, get_retry_strategy, is_retriable, truncate_message};
pub use types::{BackupError, DatabaseError, InitializationError, SheetError};
