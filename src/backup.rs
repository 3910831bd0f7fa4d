//! Backup Orchestrator: one scheduled (or manually triggered) backup run.
//!
//! Stages, in order, stopping at the first error:
//!
//! 1. load the configuration for the schedule id
//! 2. validate it
//! 3. compute the date range by probing for the newest data
//! 4. verify the account can still read the website
//! 5. create a dated workbook and move it into the backup folder
//! 6. import the configured dimensions onto the primary sheet
//! 7. optionally import all base dimensions onto a second sheet
//! 8. optionally send a success notification
//!
//! Once the configuration is loaded, a failure sends a best-effort failure
//! notification (if enabled), is recorded as `lastError`, and is returned.

use std::time::{Duration, Instant};

use chrono::{Days, Local, NaiveDate, NaiveDateTime, Utc};
use log::{debug, error, info, warn};

use crate::analytics::{Dimension, QueryRequest, SearchAnalytics};
use crate::config::{
    ProbeWindow, BACKUP_FOLDER_NAME, IMPORT_TIME_BUDGET, PRIMARY_SHEET_NAME, UNGROUPED_SHEET_NAME,
};
use crate::error_handling::BackupError;
use crate::import::{ensure_within_budget, import_rows};
use crate::notify::{failure_notification, success_notification, Notifier, SuccessDetails};
use crate::probe::{find_latest_available_day, find_latest_complete_month, MonthRange};
use crate::schedule::TriggerHandler;
use crate::sheet::{Drive, Workbook, WriteMode, WriteOutcome};
use crate::storage::{BackupConfig, BackupType, ConfigStore};

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Schedule that ran
    pub schedule_id: String,
    /// Property backed up
    pub website: String,
    /// First day of the range
    pub start_date: NaiveDate,
    /// Last day of the range
    pub end_date: NaiveDate,
    /// Name of the created workbook
    pub workbook_name: String,
    /// Link to the created workbook
    pub link: String,
    /// Result of the primary import
    pub primary: WriteOutcome,
    /// Result of the ungrouped import, when requested and successful
    pub ungrouped: Option<WriteOutcome>,
    /// Notification delivery error, if sending failed
    pub notification_error: Option<String>,
}

impl BackupReport {
    /// One-line summary for the caller.
    pub fn message(&self) -> String {
        let mut message = format!(
            "Backup of {} for {} to {}: {}. Saved to {}",
            self.website, self.start_date, self.end_date, self.primary.message, self.link
        );
        if let Some(ungrouped) = &self.ungrouped {
            message.push_str(&format!(" (ungrouped: {})", ungrouped.message));
        }
        message
    }
}

/// Runs backups for stored schedules.
#[derive(Debug, Clone)]
pub struct BackupOrchestrator<A, D, N> {
    analytics: A,
    drive: D,
    notifier: N,
    store: ConfigStore,
    probe_window: ProbeWindow,
    recipient: Option<String>,
    time_budget: Duration,
}

impl<A, D, N> BackupOrchestrator<A, D, N>
where
    A: SearchAnalytics,
    D: Drive,
    N: Notifier,
{
    /// Creates an orchestrator with the default probe window and time budget.
    pub fn new(analytics: A, drive: D, notifier: N, store: ConfigStore) -> Self {
        Self {
            analytics,
            drive,
            notifier,
            store,
            probe_window: ProbeWindow::default(),
            recipient: None,
            time_budget: IMPORT_TIME_BUDGET,
        }
    }

    /// Sets the probe window.
    pub fn with_probe_window(mut self, probe_window: ProbeWindow) -> Self {
        self.probe_window = probe_window;
        self
    }

    /// Sets the notification recipient.
    pub fn with_recipient(mut self, recipient: Option<String>) -> Self {
        self.recipient = recipient;
        self
    }

    /// Sets the soft time budget checked before the primary import.
    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = time_budget;
        self
    }

    /// Runs the backup for `schedule_id` now.
    pub async fn run(&self, schedule_id: &str) -> Result<BackupReport, BackupError> {
        self.run_at(schedule_id, Local::now().naive_local()).await
    }

    /// Runs the backup for `schedule_id` as if the local time were `now`.
    pub async fn run_at(
        &self,
        schedule_id: &str,
        now: NaiveDateTime,
    ) -> Result<BackupReport, BackupError> {
        let started = Instant::now();
        info!("[{schedule_id}] Loading backup configuration");
        let config = self
            .store
            .get(schedule_id)
            .await?
            .ok_or_else(|| BackupError::ConfigNotFound(schedule_id.to_string()))?;

        match self.execute(&config, now, started).await {
            Ok(report) => {
                self.record_outcome(schedule_id, report.notification_error.clone(), true)
                    .await;
                info!("[{schedule_id}] Backup finished: {}", report.primary.message);
                Ok(report)
            }
            Err(e) => {
                error!(
                    "[{schedule_id}] Backup of {} failed ({}): {e}",
                    config.website,
                    e.category()
                );
                if config.email_notification {
                    let notification = failure_notification(
                        self.recipient.clone(),
                        &config.website,
                        config.backup_type,
                        &e.to_string(),
                        Utc::now(),
                    );
                    if let Err(send_error) = self.notifier.send(&notification).await {
                        warn!("[{schedule_id}] Failure notification not sent: {send_error}");
                    }
                }
                self.record_outcome(schedule_id, Some(e.to_string()), false)
                    .await;
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        config: &BackupConfig,
        now: NaiveDateTime,
        started: Instant,
    ) -> Result<BackupReport, BackupError> {
        let id = &config.schedule_id;
        let today = now.date();

        debug!("[{id}] Validating configuration");
        config.validate()?;

        info!("[{id}] Computing date range");
        let (start_date, end_date) = self.compute_range(config, today).await?;
        info!("[{id}] Backing up {start_date} to {end_date}");

        info!("[{id}] Verifying access to {}", config.website);
        let sites = self.analytics.list_verified_sites().await?;
        if !sites.iter().any(|s| s.url == config.website) {
            return Err(BackupError::AccessRevoked {
                website: config.website.clone(),
            });
        }

        info!("[{id}] Preparing destination");
        let mut workbook = self.prepare_destination(config, start_date)?;

        ensure_within_budget(started, self.time_budget)?;

        info!("[{id}] Importing primary data");
        let request = QueryRequest::new(start_date, end_date, config.dimensions.clone())
            .with_search_type(config.search_type);
        request.validate(today)?;
        let sheet = workbook.first_sheet_mut();
        sheet.rename(PRIMARY_SHEET_NAME);
        let primary = import_rows(
            &self.analytics,
            &config.website,
            &request,
            sheet,
            WriteMode::Overwrite,
            now,
        )
        .await?;
        self.drive.save_workbook(&workbook)?;

        let ungrouped = if config.separate_ungrouped {
            info!("[{id}] Importing ungrouped data");
            match self
                .import_ungrouped(config, &mut workbook, start_date, end_date, now)
                .await
            {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!("[{id}] Ungrouped import failed, continuing: {e}");
                    None
                }
            }
        } else {
            None
        };

        let mut notification_error = None;
        if config.email_notification {
            info!("[{id}] Sending success notification");
            let notification = success_notification(
                self.recipient.clone(),
                &SuccessDetails {
                    website: &config.website,
                    backup_type: config.backup_type,
                    start_date,
                    end_date,
                    dimensions: &config.dimensions,
                    search_type: config.search_type,
                    separate_ungrouped: config.separate_ungrouped,
                    link: workbook.link(),
                    result: &primary.message,
                },
            );
            if let Err(e) = self.notifier.send(&notification).await {
                warn!("[{id}] Success notification not sent: {e}");
                notification_error = Some(e.to_string());
            }
        }

        Ok(BackupReport {
            schedule_id: id.clone(),
            website: config.website.clone(),
            start_date,
            end_date,
            workbook_name: workbook.name().to_string(),
            link: workbook.link().to_string(),
            primary,
            ungrouped,
            notification_error,
        })
    }

    async fn compute_range(
        &self,
        config: &BackupConfig,
        today: NaiveDate,
    ) -> Result<(NaiveDate, NaiveDate), BackupError> {
        match config.backup_type {
            BackupType::Daily => {
                let day = match find_latest_available_day(
                    &self.analytics,
                    &config.website,
                    config.search_type,
                    today,
                    &self.probe_window,
                )
                .await
                {
                    Some(day) => day,
                    None => {
                        let yesterday = today.checked_sub_days(Days::new(1)).ok_or_else(|| {
                            BackupError::Validation(format!("no day before {today}"))
                        })?;
                        info!("No recent data found; falling back to {yesterday}");
                        yesterday
                    }
                };
                Ok((day, day))
            }
            BackupType::Monthly => {
                let month = match find_latest_complete_month(
                    &self.analytics,
                    &config.website,
                    config.search_type,
                    today,
                    &self.probe_window,
                )
                .await
                {
                    Some(month) => month,
                    None => {
                        let previous = MonthRange::preceding(today, 1).ok_or_else(|| {
                            BackupError::Validation(format!("no month before {today}"))
                        })?;
                        info!(
                            "No recent monthly data found; falling back to {}",
                            previous.start.format("%Y-%m")
                        );
                        previous
                    }
                };
                Ok((month.start, month.end))
            }
        }
    }

    fn prepare_destination(
        &self,
        config: &BackupConfig,
        start_date: NaiveDate,
    ) -> Result<Workbook, BackupError> {
        let folder = self.drive.find_or_create_folder(BACKUP_FOLDER_NAME)?;
        let name = workbook_name(config, start_date);
        let mut workbook = self.drive.create_workbook(&name)?;
        if let Err(e) = self.drive.move_workbook(&mut workbook, &folder) {
            warn!(
                "Could not move '{}' into '{}', leaving it in place: {e}",
                workbook.name(),
                folder.name
            );
        }
        Ok(workbook)
    }

    async fn import_ungrouped(
        &self,
        config: &BackupConfig,
        workbook: &mut Workbook,
        start_date: NaiveDate,
        end_date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<WriteOutcome, BackupError> {
        let request = QueryRequest::new(start_date, end_date, Dimension::BASE.to_vec())
            .with_search_type(config.search_type);
        let sheet = workbook.sheet_or_insert(UNGROUPED_SHEET_NAME)?;
        let outcome = import_rows(
            &self.analytics,
            &config.website,
            &request,
            sheet,
            WriteMode::Overwrite,
            now,
        )
        .await?;
        self.drive.save_workbook(workbook)?;
        Ok(outcome)
    }

    /// Stores `lastError` (and `lastRunAt` on success). Failures here are
    /// logged only.
    async fn record_outcome(&self, schedule_id: &str, last_error: Option<String>, success: bool) {
        let _guard = self.store.lock(schedule_id).await;
        let recorded = self
            .store
            .update(schedule_id, |config| {
                config.last_error = last_error;
                if success {
                    config.last_run_at = Some(Utc::now());
                }
                Ok(())
            })
            .await;
        match recorded {
            Ok(_) => {}
            Err(BackupError::ConfigNotFound(_)) => {
                debug!("[{schedule_id}] Configuration removed during the run; not recorded");
            }
            Err(e) => warn!("[{schedule_id}] Could not record run outcome: {e}"),
        }
    }
}

impl<A, D, N> TriggerHandler for BackupOrchestrator<A, D, N>
where
    A: SearchAnalytics,
    D: Drive,
    N: Notifier,
{
    async fn fire(&self, trigger_id: &str) -> Result<String, BackupError> {
        self.run(trigger_id).await.map(|report| report.message())
    }
}

/// Short display form of a property URL.
pub fn site_label(website: &str) -> &str {
    let site = website.strip_prefix("sc-domain:").unwrap_or(website);
    let site = site
        .strip_prefix("https://")
        .or_else(|| site.strip_prefix("http://"))
        .unwrap_or(site);
    site.trim_end_matches('/')
}

/// Name of the workbook created for one run.
pub fn workbook_name(config: &BackupConfig, start_date: NaiveDate) -> String {
    let (kind, period) = match config.backup_type {
        BackupType::Daily => ("Daily", start_date.format("%Y-%m-%d").to_string()),
        BackupType::Monthly => ("Monthly", start_date.format("%Y-%m").to_string()),
    };
    format!("{} - {} Backup - {}", site_label(&config.website), kind, period)
}
