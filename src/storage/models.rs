//! Stored schedule configuration.

use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::analytics::{Dimension, SearchType};
use crate::error_handling::BackupError;

/// How often a schedule fires and which range it backs up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    /// Every day at the trigger hour; backs up the latest available day
    Daily,
    /// Once a month; backs up the latest complete month
    Monthly,
}

impl BackupType {
    /// Lowercase name, as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Daily => "daily",
            BackupType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a schedule currently has a live trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    /// Trigger exists and fires on schedule
    Active,
    /// Trigger removed; configuration kept for resume
    Paused,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStatus::Active => f.write_str("active"),
            ScheduleStatus::Paused => f.write_str("paused"),
        }
    }
}

/// A recurring backup configuration, keyed by its trigger id.
///
/// Stored as JSON under `backup_<schedule_id>` in the `kv_store` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfig {
    /// Trigger id this configuration is keyed by
    pub schedule_id: String,
    /// Property URL (`https://…/` or `sc-domain:…`)
    pub website: String,
    /// Grouping dimensions, in column order
    pub dimensions: Vec<Dimension>,
    /// Search surface
    #[serde(default)]
    pub search_type: SearchType,
    /// Daily or monthly
    pub backup_type: BackupType,
    /// Also write a sheet grouped by all base dimensions
    #[serde(default)]
    pub separate_ungrouped: bool,
    /// Send success and failure notifications
    #[serde(default)]
    pub email_notification: bool,
    /// Active or paused
    pub status: ScheduleStatus,
    /// When the schedule was first set up
    pub created_at: DateTime<Utc>,
    /// Set while paused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    /// Last resume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_at: Option<DateTime<Utc>>,
    /// Most recent failure message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Last successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

impl BackupConfig {
    /// Checks the fields a run cannot do without.
    pub fn validate(&self) -> Result<(), BackupError> {
        if self.website.trim().is_empty() {
            return Err(BackupError::InvalidConfig(format!(
                "schedule {} has no website",
                self.schedule_id
            )));
        }
        if self.dimensions.is_empty() {
            return Err(BackupError::InvalidConfig(format!(
                "schedule {} has no dimensions",
                self.schedule_id
            )));
        }
        Ok(())
    }

    /// Comma-separated dimension names.
    pub fn dimension_list(&self) -> String {
        self.dimensions
            .iter()
            .map(Dimension::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
