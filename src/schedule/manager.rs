//! Schedule Manager: ties triggers to stored configurations.
//!
//! A schedule's id is the id of its trigger. Pausing removes the trigger and
//! keeps the configuration; resuming creates a new trigger, so the
//! configuration moves to the new id.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::analytics::{Dimension, SearchType};
use crate::error_handling::BackupError;
use crate::storage::{BackupConfig, BackupType, ConfigStore, ScheduleStatus};

use super::trigger::{Scheduler, TriggerSpec};

/// Website name reported when a deleted schedule had no readable configuration.
pub const UNKNOWN_WEBSITE: &str = "Unknown";

/// Next-run text for schedules without a trigger.
pub const UNKNOWN_NEXT_RUN: &str = "Unknown";

/// Parameters for a new schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    /// Property URL
    pub website: String,
    /// Daily or monthly
    pub backup_type: BackupType,
    /// Grouping dimensions, in column order
    pub dimensions: Vec<Dimension>,
    /// Search surface
    pub search_type: SearchType,
    /// Also write a sheet grouped by all base dimensions
    pub separate_ungrouped: bool,
    /// Send success and failure notifications
    pub email_notification: bool,
}

/// One line of the schedule listing.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupConfigSummary {
    /// Schedule (trigger) id
    pub schedule_id: String,
    /// Property URL
    pub website: String,
    /// Daily or monthly
    pub backup_type: BackupType,
    /// Grouping dimensions
    pub dimensions: Vec<Dimension>,
    /// Search surface
    pub search_type: SearchType,
    /// Active or paused
    pub status: ScheduleStatus,
    /// First set up
    pub created_at: DateTime<Utc>,
    /// "Daily at 2:00 AM", or "Unknown" while paused
    pub next_run: String,
    /// Most recent failure, if any
    pub last_error: Option<String>,
    /// Last successful run
    pub last_run_at: Option<DateTime<Utc>>,
}

impl From<BackupConfig> for BackupConfigSummary {
    fn from(config: BackupConfig) -> Self {
        let next_run = match config.status {
            ScheduleStatus::Active => TriggerSpec::for_backup(config.backup_type).describe(),
            ScheduleStatus::Paused => UNKNOWN_NEXT_RUN.to_string(),
        };
        Self {
            schedule_id: config.schedule_id,
            website: config.website,
            backup_type: config.backup_type,
            dimensions: config.dimensions,
            search_type: config.search_type,
            status: config.status,
            created_at: config.created_at,
            next_run,
            last_error: config.last_error,
            last_run_at: config.last_run_at,
        }
    }
}

impl fmt::Display for BackupConfigSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dimensions: Vec<&str> = self.dimensions.iter().map(Dimension::as_str).collect();
        write!(
            f,
            "{} [{}] {} {} ({}; {}) next: {}",
            self.schedule_id,
            self.status,
            self.website,
            self.backup_type,
            dimensions.join(", "),
            self.search_type,
            self.next_run
        )?;
        if let Some(error) = &self.last_error {
            write!(f, " last error: {error}")?;
        }
        Ok(())
    }
}

/// Creates, pauses, resumes, deletes and reconciles schedules.
#[derive(Debug, Clone)]
pub struct ScheduleManager<S> {
    store: ConfigStore,
    scheduler: S,
}

impl<S: Scheduler> ScheduleManager<S> {
    /// Builds a manager over a store and a scheduler.
    pub fn new(store: ConfigStore, scheduler: S) -> Self {
        Self { store, scheduler }
    }

    /// The configuration store.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// The trigger scheduler.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Creates a schedule and returns its id.
    ///
    /// Any existing schedule for the same website and backup type is deleted
    /// first, so at most one exists per pair.
    pub async fn setup(&self, request: SetupRequest) -> Result<String, BackupError> {
        let website = request.website.trim().to_string();
        if website.is_empty() {
            return Err(BackupError::Validation("a website is required".to_string()));
        }
        let mut dimensions: Vec<Dimension> = Vec::with_capacity(request.dimensions.len());
        for dimension in request.dimensions {
            if !dimensions.contains(&dimension) {
                dimensions.push(dimension);
            }
        }
        if dimensions.is_empty() {
            return Err(BackupError::Validation(
                "select at least one dimension".to_string(),
            ));
        }

        for existing in self.store.list_all().await?.into_values() {
            if existing.website == website && existing.backup_type == request.backup_type {
                info!(
                    "Replacing {} schedule {} for {}",
                    existing.backup_type, existing.schedule_id, website
                );
                self.delete(&existing.schedule_id).await?;
            }
        }

        let schedule_id = self
            .scheduler
            .schedule(&TriggerSpec::for_backup(request.backup_type))
            .await?;

        let config = BackupConfig {
            schedule_id: schedule_id.clone(),
            website,
            dimensions,
            search_type: request.search_type,
            backup_type: request.backup_type,
            separate_ungrouped: request.separate_ungrouped,
            email_notification: request.email_notification,
            status: ScheduleStatus::Active,
            created_at: Utc::now(),
            paused_at: None,
            resumed_at: None,
            last_error: None,
            last_run_at: None,
        };

        if let Err(e) = self.store.set(&config).await {
            self.discard_trigger(&schedule_id).await;
            return Err(e);
        }

        info!(
            "Created {} schedule {} for {}",
            config.backup_type, schedule_id, config.website
        );
        Ok(schedule_id)
    }

    /// Pauses an active schedule: its trigger is removed, its configuration kept.
    pub async fn pause(&self, schedule_id: &str) -> Result<BackupConfig, BackupError> {
        let _guard = self.store.lock(schedule_id).await;
        let config = self
            .store
            .update(schedule_id, |config| {
                if config.status == ScheduleStatus::Paused {
                    return Err(BackupError::AlreadyPaused(schedule_id.to_string()));
                }
                config.status = ScheduleStatus::Paused;
                config.paused_at = Some(Utc::now());
                Ok(())
            })
            .await?;

        if !self.scheduler.cancel(schedule_id).await? {
            warn!("Trigger {schedule_id} was already gone when pausing");
        }
        info!("Paused schedule {} for {}", schedule_id, config.website);
        Ok(config)
    }

    /// Resumes a paused schedule under a new trigger and returns the moved
    /// configuration (with its new id).
    pub async fn resume(&self, schedule_id: &str) -> Result<BackupConfig, BackupError> {
        let _guard = self.store.lock(schedule_id).await;
        let config = self.load(schedule_id).await?;
        if config.status != ScheduleStatus::Paused {
            return Err(BackupError::NotPaused(schedule_id.to_string()));
        }

        if self.scheduler.cancel(schedule_id).await? {
            debug!("Removed stale trigger {schedule_id} before resuming");
        }

        let new_id = self
            .scheduler
            .schedule(&TriggerSpec::for_backup(config.backup_type))
            .await?;

        // Another process may have resumed or deleted it meanwhile.
        let moved = self
            .store
            .rekey(schedule_id, &new_id, |config| {
                if config.status != ScheduleStatus::Paused {
                    return Err(BackupError::NotPaused(schedule_id.to_string()));
                }
                config.status = ScheduleStatus::Active;
                config.resumed_at = Some(Utc::now());
                config.paused_at = None;
                Ok(())
            })
            .await;
        let resumed = match moved {
            Ok(resumed) => resumed,
            Err(e) => {
                self.discard_trigger(&new_id).await;
                return Err(e);
            }
        };

        info!(
            "Resumed schedule for {}: {} is now {}",
            resumed.website, schedule_id, new_id
        );
        Ok(resumed)
    }

    /// Deletes a schedule and returns its website, or "Unknown".
    ///
    /// A missing trigger or configuration is not an error.
    pub async fn delete(&self, schedule_id: &str) -> Result<String, BackupError> {
        let _guard = self.store.lock(schedule_id).await;
        let website = match self.store.get(schedule_id).await {
            Ok(Some(config)) => config.website,
            Ok(None) => UNKNOWN_WEBSITE.to_string(),
            Err(BackupError::InvalidConfig(reason)) => {
                warn!("Deleting unreadable schedule {schedule_id}: {reason}");
                UNKNOWN_WEBSITE.to_string()
            }
            Err(e) => return Err(e),
        };

        if !self.scheduler.cancel(schedule_id).await? {
            debug!("No trigger found for schedule {schedule_id}; removing configuration only");
        }
        self.store.delete(schedule_id).await?;
        info!("Deleted schedule {} for {}", schedule_id, website);
        Ok(website)
    }

    /// All schedules, newest first.
    pub async fn list(&self) -> Result<Vec<BackupConfigSummary>, BackupError> {
        let mut configs: Vec<BackupConfig> = self.store.list_all().await?.into_values().collect();
        configs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(configs.into_iter().map(BackupConfigSummary::from).collect())
    }

    /// Ids of stored configurations whose trigger no longer exists.
    ///
    /// Paused schedules have no trigger and are never orphans.
    pub async fn orphan_ids(&self) -> Result<Vec<String>, BackupError> {
        let live: HashSet<String> = self.scheduler.list().await?.into_iter().collect();
        let readable = self.store.list_all().await?;

        Ok(self
            .store
            .list_ids()
            .await?
            .into_iter()
            .filter(|id| !live.contains(id))
            .filter(|id| {
                !readable
                    .get(id)
                    .is_some_and(|c| c.status == ScheduleStatus::Paused)
            })
            .collect())
    }

    /// Deletes stored configurations whose trigger no longer exists and
    /// returns the number of entries removed.
    ///
    /// Each candidate is checked again under its lock: it is kept if its
    /// trigger appeared or it was paused after the scan.
    pub async fn reconcile_orphans(&self) -> Result<usize, BackupError> {
        self.remove_orphans(self.orphan_ids().await?).await
    }

    async fn remove_orphans(&self, candidates: Vec<String>) -> Result<usize, BackupError> {
        let mut removed = 0;
        for schedule_id in candidates {
            let _guard = self.store.lock(&schedule_id).await;
            if self.scheduler.exists(&schedule_id).await? {
                debug!("Schedule {schedule_id} has a live trigger again; keeping it");
                continue;
            }
            if self.store.delete_unless_paused(&schedule_id).await? {
                info!("Removed orphaned schedule configuration {schedule_id}");
                removed += 1;
            }
        }

        info!("Orphan cleanup removed {removed} configuration(s)");
        Ok(removed)
    }

    async fn load(&self, schedule_id: &str) -> Result<BackupConfig, BackupError> {
        self.store
            .get(schedule_id)
            .await?
            .ok_or_else(|| BackupError::ConfigNotFound(schedule_id.to_string()))
    }

    async fn discard_trigger(&self, trigger_id: &str) {
        if let Err(e) = self.scheduler.cancel(trigger_id).await {
            warn!("Failed to remove trigger {trigger_id} after a failed update: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::trigger::SqliteScheduler;
    use crate::storage::test_helpers::{create_test_pool, sample_config};

    async fn manager() -> ScheduleManager<SqliteScheduler> {
        let pool = create_test_pool().await;
        ScheduleManager::new(ConfigStore::new(pool.clone()), SqliteScheduler::new(pool))
    }

    fn request(website: &str, backup_type: BackupType, dimensions: Vec<Dimension>) -> SetupRequest {
        SetupRequest {
            website: website.to_string(),
            backup_type,
            dimensions,
            search_type: SearchType::Web,
            separate_ungrouped: false,
            email_notification: false,
        }
    }

    #[tokio::test]
    async fn test_setup_persists_active_config() {
        let manager = manager().await;
        let id = manager
            .setup(request(
                "https://example.com/",
                BackupType::Daily,
                vec![Dimension::Query, Dimension::Page, Dimension::Query],
            ))
            .await
            .unwrap();

        let config = manager.store().get(&id).await.unwrap().unwrap();
        assert_eq!(config.status, ScheduleStatus::Active);
        assert_eq!(config.dimensions, vec![Dimension::Query, Dimension::Page]);
        assert_eq!(manager.scheduler().list().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_setup_validates_input() {
        let manager = manager().await;
        assert!(matches!(
            manager
                .setup(request(" ", BackupType::Daily, vec![Dimension::Query]))
                .await,
            Err(BackupError::Validation(_))
        ));
        assert!(matches!(
            manager
                .setup(request("https://example.com/", BackupType::Daily, vec![]))
                .await,
            Err(BackupError::Validation(_))
        ));
        assert!(manager.scheduler().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_setup_replaces_same_website_and_type() {
        let manager = manager().await;
        manager
            .setup(request("example.com", BackupType::Daily, vec![Dimension::Query]))
            .await
            .unwrap();
        let monthly = manager
            .setup(request("example.com", BackupType::Monthly, vec![Dimension::Query]))
            .await
            .unwrap();
        let second = manager
            .setup(request("example.com", BackupType::Daily, vec![Dimension::Page]))
            .await
            .unwrap();

        let schedules = manager.list().await.unwrap();
        let daily: Vec<_> = schedules
            .iter()
            .filter(|s| s.backup_type == BackupType::Daily)
            .collect();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].schedule_id, second);
        assert_eq!(daily[0].dimensions, vec![Dimension::Page]);
        assert!(schedules.iter().any(|s| s.schedule_id == monthly));
        assert_eq!(manager.scheduler().list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pause_then_resume_changes_id() {
        let manager = manager().await;
        let id = manager
            .setup(request(
                "https://example.com/",
                BackupType::Monthly,
                vec![Dimension::Country],
            ))
            .await
            .unwrap();

        let paused = manager.pause(&id).await.unwrap();
        assert_eq!(paused.status, ScheduleStatus::Paused);
        assert!(paused.paused_at.is_some());
        assert!(manager.scheduler().list().await.unwrap().is_empty());
        assert!(matches!(
            manager.pause(&id).await,
            Err(BackupError::AlreadyPaused(_))
        ));

        let resumed = manager.resume(&id).await.unwrap();
        assert_ne!(resumed.schedule_id, id);
        assert_eq!(resumed.status, ScheduleStatus::Active);
        assert_eq!(resumed.website, "https://example.com/");
        assert_eq!(resumed.dimensions, vec![Dimension::Country]);
        assert_eq!(resumed.backup_type, BackupType::Monthly);
        assert!(resumed.paused_at.is_none());
        assert!(resumed.resumed_at.is_some());

        assert!(manager.store().get(&id).await.unwrap().is_none());
        assert_eq!(
            manager.scheduler().list().await.unwrap(),
            vec![resumed.schedule_id.clone()]
        );
        assert!(matches!(
            manager.resume(&resumed.schedule_id).await,
            Err(BackupError::NotPaused(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let manager = manager().await;
        assert!(matches!(
            manager.pause("missing").await,
            Err(BackupError::ConfigNotFound(_))
        ));
        assert!(matches!(
            manager.resume("missing").await,
            Err(BackupError::ConfigNotFound(_))
        ));
        assert_eq!(manager.delete("missing").await.unwrap(), UNKNOWN_WEBSITE);
    }

    #[tokio::test]
    async fn test_delete_returns_website() {
        let manager = manager().await;
        let id = manager
            .setup(request("sc-domain:example.com", BackupType::Daily, vec![Dimension::Query]))
            .await
            .unwrap();
        assert_eq!(manager.delete(&id).await.unwrap(), "sc-domain:example.com");
        assert!(manager.store().get(&id).await.unwrap().is_none());
        assert!(manager.scheduler().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_next_run() {
        let manager = manager().await;
        let mut older = sample_config("older", "a.example", BackupType::Daily);
        older.created_at = Utc::now() - chrono::Duration::days(2);
        let mut newer = sample_config("newer", "b.example", BackupType::Monthly);
        newer.created_at = Utc::now();
        newer.status = ScheduleStatus::Paused;
        manager.store().set(&older).await.unwrap();
        manager.store().set(&newer).await.unwrap();

        let list = manager.list().await.unwrap();
        assert_eq!(list[0].schedule_id, "newer");
        assert_eq!(list[0].next_run, UNKNOWN_NEXT_RUN);
        assert_eq!(list[1].next_run, "Daily at 2:00 AM");
        assert!(list[1].to_string().contains("a.example"));
    }

    #[tokio::test]
    async fn test_reconcile_removes_orphans_only() {
        let manager = manager().await;
        let live = manager
            .setup(request("live.example", BackupType::Daily, vec![Dimension::Query]))
            .await
            .unwrap();
        manager
            .store()
            .set(&sample_config("gone-1", "x.example", BackupType::Daily))
            .await
            .unwrap();
        manager
            .store()
            .set(&sample_config("gone-2", "y.example", BackupType::Monthly))
            .await
            .unwrap();

        let mut orphans = manager.orphan_ids().await.unwrap();
        orphans.sort();
        assert_eq!(orphans, vec!["gone-1", "gone-2"]);
        assert_eq!(manager.reconcile_orphans().await.unwrap(), 2);
        let remaining = manager.store().list_ids().await.unwrap();
        assert_eq!(remaining, vec![live]);
        assert_eq!(manager.reconcile_orphans().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_rechecks_candidates() {
        let manager = manager().await;
        manager
            .store()
            .set(&sample_config("gone", "x.example", BackupType::Daily))
            .await
            .unwrap();
        let late = manager
            .setup(request("late.example", BackupType::Daily, vec![Dimension::Query]))
            .await
            .unwrap();
        let paused = manager
            .setup(request("paused.example", BackupType::Monthly, vec![Dimension::Query]))
            .await
            .unwrap();

        // Candidates as a scan taken before `late` got its trigger and before
        // `paused` was paused would have seen them.
        let stale_scan = vec!["gone".to_string(), late.clone(), paused.clone()];
        manager.pause(&paused).await.unwrap();

        assert_eq!(manager.remove_orphans(stale_scan).await.unwrap(), 1);
        let mut remaining = manager.store().list_ids().await.unwrap();
        remaining.sort();
        let mut expected = vec![late, paused];
        expected.sort();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn test_reconcile_keeps_paused() {
        let manager = manager().await;
        let id = manager
            .setup(request("example.com", BackupType::Daily, vec![Dimension::Query]))
            .await
            .unwrap();
        manager.pause(&id).await.unwrap();
        assert_eq!(manager.reconcile_orphans().await.unwrap(), 0);
        assert!(manager.store().get(&id).await.unwrap().is_some());
    }
}
