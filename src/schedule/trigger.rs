//! Recurring triggers and the persistent job queue behind them.

use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};
use cron::Schedule;
use log::debug;
use rand::Rng;
use sqlx::SqlitePool;

use crate::config::{MONTHLY_TRIGGER_DAY, TRIGGER_HOUR};
use crate::error_handling::BackupError;
use crate::storage::BackupType;

/// Handler name stored with every trigger this crate creates.
pub const BACKUP_HANDLER: &str = "run_scheduled_backup";

/// When a trigger fires, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSpec {
    /// Every day at `hour`
    Daily {
        /// Hour of day (0-23)
        hour: u32,
    },
    /// Every month on `day` at `hour`
    Monthly {
        /// Day of month (1-28)
        day: u32,
        /// Hour of day (0-23)
        hour: u32,
    },
}

impl TriggerSpec {
    /// The trigger used for a backup type.
    pub fn for_backup(backup_type: BackupType) -> Self {
        match backup_type {
            BackupType::Daily => TriggerSpec::Daily { hour: TRIGGER_HOUR },
            BackupType::Monthly => TriggerSpec::Monthly {
                day: MONTHLY_TRIGGER_DAY,
                hour: TRIGGER_HOUR,
            },
        }
    }

    /// Six-field cron expression (`sec min hour day month weekday`).
    pub fn cron_expression(&self) -> String {
        match self {
            TriggerSpec::Daily { hour } => format!("0 0 {hour} * * *"),
            TriggerSpec::Monthly { day, hour } => format!("0 0 {hour} {day} * *"),
        }
    }

    /// Parsed cron schedule.
    pub fn schedule(&self) -> Result<Schedule, BackupError> {
        parse_cron(&self.cron_expression())
    }

    /// First firing strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule().ok()?.after(after).next()
    }

    /// Human-readable description, e.g. "Daily at 2:00 AM".
    pub fn describe(&self) -> String {
        match self {
            TriggerSpec::Daily { hour } => format!("Daily at {}", clock(*hour)),
            TriggerSpec::Monthly { day, hour } => {
                format!("Monthly on the {} at {}", ordinal(*day), clock(*hour))
            }
        }
    }
}

fn parse_cron(expr: &str) -> Result<Schedule, BackupError> {
    Schedule::from_str(expr).map_err(|e| BackupError::Schedule(format!("{expr}: {e}")))
}

fn clock(hour: u32) -> String {
    let (display, suffix) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    format!("{display}:00 {suffix}")
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// New unique trigger id: creation millis plus random bits, hex.
pub fn new_trigger_id() -> String {
    let random: u32 = rand::rng().random();
    format!("{:x}{:08x}", Utc::now().timestamp_millis(), random)
}

/// Host scheduler seam: creates, removes and lists recurring triggers.
pub trait Scheduler: Send + Sync {
    /// Creates a trigger and returns its id.
    fn schedule(&self, spec: &TriggerSpec)
        -> impl Future<Output = Result<String, BackupError>> + Send;

    /// Removes a trigger. Returns false if it did not exist.
    fn cancel(&self, trigger_id: &str) -> impl Future<Output = Result<bool, BackupError>> + Send;

    /// Ids of all live triggers.
    fn list(&self) -> impl Future<Output = Result<Vec<String>, BackupError>> + Send;

    /// Returns true if the trigger is live.
    fn exists(&self, trigger_id: &str) -> impl Future<Output = Result<bool, BackupError>> + Send;
}

/// A trigger that is due to fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTrigger {
    /// Trigger id (also the schedule id)
    pub id: String,
    /// Cron expression it was created with
    pub cron: String,
    /// Scheduled firing time
    pub next_run: DateTime<Utc>,
}

/// Triggers persisted in the `triggers` table.
#[derive(Debug, Clone)]
pub struct SqliteScheduler {
    pool: SqlitePool,
}

impl SqliteScheduler {
    /// Wraps a migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Triggers whose next run is at or before `now`, oldest first.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<DueTrigger>, BackupError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT id, cron, next_run_ms FROM triggers
             WHERE handler = ? AND next_run_ms <= ?
             ORDER BY next_run_ms, id",
        )
        .bind(BACKUP_HANDLER)
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, cron, next_run_ms)| {
                DateTime::from_timestamp_millis(next_run_ms).map(|next_run| DueTrigger {
                    id,
                    cron,
                    next_run,
                })
            })
            .collect())
    }

    /// Records a firing and moves the trigger to its next run after `now`.
    ///
    /// Returns false if the trigger was removed meanwhile.
    pub async fn mark_fired(
        &self,
        trigger_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, BackupError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT cron FROM triggers WHERE id = ?")
            .bind(trigger_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some((cron,)) = row else {
            return Ok(false);
        };

        let next = next_run_for(&cron, now)?;
        let result =
            sqlx::query("UPDATE triggers SET next_run_ms = ?, last_fired_ms = ? WHERE id = ?")
                .bind(next.timestamp_millis())
                .bind(now.timestamp_millis())
                .bind(trigger_id)
                .execute(&self.pool)
                .await?;
        debug!("Trigger {trigger_id} next fires at {next}");
        Ok(result.rows_affected() > 0)
    }

    /// Next scheduled run of one trigger.
    pub async fn next_run(&self, trigger_id: &str) -> Result<Option<DateTime<Utc>>, BackupError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT next_run_ms FROM triggers WHERE id = ?")
            .bind(trigger_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|(ms,)| DateTime::from_timestamp_millis(ms)))
    }
}

fn next_run_for(cron: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, BackupError> {
    parse_cron(cron)?
        .after(&now.with_timezone(&Local))
        .next()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| BackupError::Schedule(format!("'{cron}' never fires again")))
}

impl Scheduler for SqliteScheduler {
    async fn schedule(&self, spec: &TriggerSpec) -> Result<String, BackupError> {
        let cron = spec.cron_expression();
        let now = Utc::now();
        let next = next_run_for(&cron, now)?;
        let id = new_trigger_id();

        sqlx::query(
            "INSERT INTO triggers (id, handler, cron, next_run_ms, created_at_ms)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(BACKUP_HANDLER)
        .bind(&cron)
        .bind(next.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        debug!("Created trigger {id} ({cron}), first run {next}");
        Ok(id)
    }

    async fn cancel(&self, trigger_id: &str) -> Result<bool, BackupError> {
        let result = sqlx::query("DELETE FROM triggers WHERE id = ?")
            .bind(trigger_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<String>, BackupError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM triggers WHERE handler = ? ORDER BY created_at_ms, id",
        )
        .bind(BACKUP_HANDLER)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn exists(&self, trigger_id: &str) -> Result<bool, BackupError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM triggers WHERE id = ? AND handler = ?")
                .bind(trigger_id)
                .bind(BACKUP_HANDLER)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}
