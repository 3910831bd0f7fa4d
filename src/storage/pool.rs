//! Database connection pool management.
//!
//! This module initializes and configures the SQLite connection pool with:
//! - WAL mode enabled so the daemon and one-off CLI calls can share the file
//! - Automatic database file creation
//! - Schema migrations applied on open

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, error, info};
use sqlx::SqlitePool;

use crate::error_handling::DatabaseError;

use super::migrations::run_migrations;

/// Opens the database at `db_path`, creating it if needed, and migrates it.
pub async fn init_db_pool_with_path(db_path: &Path) -> Result<SqlitePool, DatabaseError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            error!("Failed to create database directory: {e}");
            DatabaseError::FileCreationError(e.to_string())
        })?;
    }

    let db_path_str = db_path.to_string_lossy().to_string();
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(&db_path_str)
    {
        Ok(_) => info!("Database file created at {db_path_str}"),
        Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!("Database file already exists.")
        }
        Err(e) => {
            error!("Failed to create database file: {e}");
            return Err(DatabaseError::FileCreationError(e.to_string()));
        }
    }

    let pool = SqlitePool::connect(&format!("sqlite:{}", db_path_str))
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {e}");
            DatabaseError::SqlError(e)
        })?;

    // Enable WAL mode
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await
        .map_err(|e| {
            error!("Failed to set WAL mode: {e}");
            DatabaseError::SqlError(e)
        })?;

    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("backup.db");
        let pool = init_db_pool_with_path(&path).await.unwrap();
        assert!(path.exists());

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"kv_store"));
        assert!(names.contains(&"triggers"));
    }

    #[tokio::test]
    async fn test_reopen_existing_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.db");
        init_db_pool_with_path(&path).await.unwrap().close().await;
        assert!(init_db_pool_with_path(&path).await.is_ok());
    }
}
