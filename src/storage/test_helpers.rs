//! Shared test helpers for storage and schedule tests.

use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;

use crate::analytics::{Dimension, SearchType};
use crate::storage::models::{BackupConfig, BackupType, ScheduleStatus};
use crate::storage::run_migrations;

/// Creates a test database pool with migrations applied.
/// Uses an in-memory database for fast test execution.
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// An active configuration grouped by query.
pub fn sample_config(id: &str, website: &str, backup_type: BackupType) -> BackupConfig {
    BackupConfig {
        schedule_id: id.to_string(),
        website: website.to_string(),
        dimensions: vec![Dimension::Query],
        search_type: SearchType::Web,
        backup_type,
        separate_ungrouped: false,
        email_notification: false,
        status: ScheduleStatus::Active,
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap(),
        paused_at: None,
        resumed_at: None,
        last_error: None,
        last_run_at: None,
    }
}
