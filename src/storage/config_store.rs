//! Configuration Store: schedule configurations in the `kv_store` table.
//!
//! Each configuration is one JSON value under `backup_<schedule_id>`.
//!
//! The daemon and one-off CLI calls are separate processes sharing the
//! database file, so changes to an existing entry go through `update` or
//! `rekey`: the read, the change and the write run in one SQLite transaction
//! that holds the database write lock from its first statement. `KeyLocks`
//! additionally orders multi-step sequences (store plus trigger) inside one
//! process.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use log::warn;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::CONFIG_KEY_PREFIX;
use crate::error_handling::{BackupError, DatabaseError};

use super::models::BackupConfig;

/// Per-key async mutexes.
#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyLocks {
    /// Waits for and takes the lock for `key`.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            // Drop locks nobody holds or waits on.
            map.retain(|k, m| k == key || Arc::strong_count(m) > 1);
            map.entry(key.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }
}

/// Store key for a schedule id.
pub fn config_key(schedule_id: &str) -> String {
    format!("{CONFIG_KEY_PREFIX}{schedule_id}")
}

/// Durable schedule configurations.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
    locks: KeyLocks,
}

impl ConfigStore {
    /// Wraps a migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: KeyLocks::default(),
        }
    }

    /// Takes the in-process lock for one schedule id.
    pub async fn lock(&self, schedule_id: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(&config_key(schedule_id)).await
    }

    /// Loads a configuration. Unreadable values are `InvalidConfig`.
    pub async fn get(&self, schedule_id: &str) -> Result<Option<BackupConfig>, BackupError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(config_key(schedule_id))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(None),
            Some((value,)) => decode(schedule_id, &value).map(Some),
        }
    }

    /// Inserts or replaces the configuration under its schedule id.
    pub async fn set(&self, config: &BackupConfig) -> Result<(), BackupError> {
        write_entry(&self.pool, config).await
    }

    /// Changes a stored configuration in one write transaction and returns
    /// the stored result.
    ///
    /// A missing entry is `ConfigNotFound` and is not recreated. An error from
    /// `change` rolls the transaction back.
    pub async fn update<F>(&self, schedule_id: &str, change: F) -> Result<BackupConfig, BackupError>
    where
        F: FnOnce(&mut BackupConfig) -> Result<(), BackupError>,
    {
        let mut tx = self.pool.begin().await?;
        let mut config = read_for_write(&mut *tx, schedule_id).await?;
        change(&mut config)?;
        config.schedule_id = schedule_id.to_string();
        write_entry(&mut *tx, &config).await?;
        tx.commit().await?;
        Ok(config)
    }

    /// Removes a configuration. Returns false if there was none.
    pub async fn delete(&self, schedule_id: &str) -> Result<bool, BackupError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(config_key(schedule_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes an entry unless it holds a paused configuration. Returns false
    /// if nothing was removed.
    ///
    /// Unreadable entries are removed.
    pub async fn delete_unless_paused(&self, schedule_id: &str) -> Result<bool, BackupError> {
        let result = sqlx::query(
            "DELETE FROM kv_store WHERE key = ?
             AND (CASE WHEN json_valid(value) THEN json_extract(value, '$.status') END)
                 IS NOT 'paused'",
        )
        .bind(config_key(schedule_id))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Moves a configuration from `old_id` to `new_id`, applying `change`,
    /// in one write transaction.
    ///
    /// Fails with `ConfigNotFound` if `old_id` has no entry. An error from
    /// `change` leaves the old entry in place.
    pub async fn rekey<F>(
        &self,
        old_id: &str,
        new_id: &str,
        change: F,
    ) -> Result<BackupConfig, BackupError>
    where
        F: FnOnce(&mut BackupConfig) -> Result<(), BackupError>,
    {
        let mut tx = self.pool.begin().await?;
        let mut config = read_for_write(&mut *tx, old_id).await?;
        change(&mut config)?;
        config.schedule_id = new_id.to_string();
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(config_key(old_id))
            .execute(&mut *tx)
            .await?;
        write_entry(&mut *tx, &config).await?;
        tx.commit().await?;
        Ok(config)
    }

    /// Schedule ids of every stored entry, readable or not.
    pub async fn list_ids(&self) -> Result<Vec<String>, BackupError> {
        Ok(self
            .prefixed_rows()
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// All readable configurations by schedule id; unreadable ones are skipped.
    pub async fn list_all(&self) -> Result<BTreeMap<String, BackupConfig>, BackupError> {
        let mut configs = BTreeMap::new();
        for (id, value) in self.prefixed_rows().await? {
            match decode(&id, &value) {
                Ok(mut config) => {
                    if config.schedule_id != id {
                        warn!(
                            "Configuration under {} names schedule {}; using the key",
                            config_key(&id),
                            config.schedule_id
                        );
                        config.schedule_id = id.clone();
                    }
                    configs.insert(id, config);
                }
                Err(e) => warn!("Skipping stored configuration {}: {e}", config_key(&id)),
            }
        }
        Ok(configs)
    }

    async fn prefixed_rows(&self) -> Result<Vec<(String, String)>, BackupError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM kv_store WHERE substr(key, 1, ?) = ? ORDER BY key",
        )
        .bind(CONFIG_KEY_PREFIX.len() as i64)
        .bind(CONFIG_KEY_PREFIX)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(CONFIG_KEY_PREFIX)
                    .map(|id| (id.to_string(), value))
            })
            .collect())
    }
}

/// Takes the database write lock, then reads the entry for `schedule_id`.
async fn read_for_write(
    conn: &mut SqliteConnection,
    schedule_id: &str,
) -> Result<BackupConfig, BackupError> {
    // Writing first makes SQLite take the write lock before the read; other
    // writers wait (busy timeout) until this transaction ends.
    sqlx::query("UPDATE kv_store SET updated_at_ms = ? WHERE key = ?")
        .bind(Utc::now().timestamp_millis())
        .bind(config_key(schedule_id))
        .execute(&mut *conn)
        .await?;
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
        .bind(config_key(schedule_id))
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        None => Err(BackupError::ConfigNotFound(schedule_id.to_string())),
        Some((value,)) => decode(schedule_id, &value),
    }
}

async fn write_entry<'c, E>(executor: E, config: &BackupConfig) -> Result<(), BackupError>
where
    E: Executor<'c, Database = Sqlite>,
{
    let value = serde_json::to_string(config).map_err(DatabaseError::SerializationError)?;
    sqlx::query(
        "INSERT INTO kv_store (key, value, updated_at_ms) VALUES (?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                        updated_at_ms = excluded.updated_at_ms",
    )
    .bind(config_key(&config.schedule_id))
    .bind(value)
    .bind(Utc::now().timestamp_millis())
    .execute(executor)
    .await?;
    Ok(())
}

fn decode(schedule_id: &str, value: &str) -> Result<BackupConfig, BackupError> {
    serde_json::from_str(value).map_err(|e| {
        BackupError::InvalidConfig(format!(
            "stored configuration for schedule {schedule_id} is unreadable ({e})"
        ))
    })
}
