//! Application operations.
//!
//! `App` wires the components together from a `Config` and exposes the
//! operations offered to callers. Every operation returns a message that is
//! safe to show to a user, or a `BackupError`.

mod diagnostics;
mod manual;
pub mod shutdown;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::analytics::{AnalyticsClient, SearchAnalytics};
use crate::auth::StaticToken;
use crate::backup::BackupOrchestrator;
use crate::config::Config;
use crate::error_handling::{BackupError, InitializationError};
use crate::import::{ensure_within_budget, import_rows};
use crate::initialization::init_client;
use crate::notify::{LogNotifier, NotifierImpl, WebhookNotifier};
use crate::schedule::{
    BackupConfigSummary, ScheduleManager, ScheduleRunner, Scheduler, SetupRequest,
    SqliteScheduler, TriggerSpec,
};
use crate::sheet::{CsvDrive, Drive, WriteMode};
use crate::storage::{init_db_pool_with_path, ConfigStore};

pub use diagnostics::{Check, DiagnosticsReport};
pub use manual::{DateSelection, ImportParams};
pub use shutdown::cancel_on_ctrl_c;

/// Orchestrator type used by the application.
pub type AppOrchestrator = BackupOrchestrator<AnalyticsClient, CsvDrive, NotifierImpl>;

/// The application: every component, built once from `Config`.
pub struct App {
    config: Config,
    token_configured: bool,
    analytics: AnalyticsClient,
    drive: CsvDrive,
    manager: ScheduleManager<SqliteScheduler>,
    orchestrator: AppOrchestrator,
}

impl App {
    /// Builds the application: opens the database, the HTTP client, the
    /// workbook directory and the notifier.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or any resource cannot be opened.
    pub async fn new(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(InitializationError::ConfigError)
            .context("Invalid configuration")?;

        let pool = init_db_pool_with_path(&config.db_path)
            .await
            .context("Failed to initialize database pool")?;
        let http = init_client(&config)
            .map_err(InitializationError::HttpClientError)
            .context("Failed to initialize HTTP client")?;
        let drive = CsvDrive::new(&config.output_dir).with_context(|| {
            format!(
                "Failed to open output directory {}",
                config.output_dir.display()
            )
        })?;

        let tokens = StaticToken::new(config.token.clone());
        let token_configured = tokens.is_configured();
        let analytics = AnalyticsClient::new(http.clone(), &config.api_base, Arc::new(tokens))
            .with_max_retries(config.max_retries);

        let notifier = match &config.notification_webhook {
            Some(raw) => {
                let url = url::Url::parse(raw).context("Invalid notification webhook URL")?;
                info!("Notifications go to {url}");
                NotifierImpl::Webhook(WebhookNotifier::new(http, url))
            }
            None => {
                info!("No notification webhook configured; notifications are logged only");
                NotifierImpl::Log(LogNotifier)
            }
        };

        let store = ConfigStore::new(pool.clone());
        let manager = ScheduleManager::new(store.clone(), SqliteScheduler::new(pool));
        let orchestrator =
            BackupOrchestrator::new(analytics.clone(), drive.clone(), notifier, store)
                .with_probe_window(config.probe_window)
                .with_recipient(config.notification_recipient.clone())
                .with_time_budget(config.import_time_budget);

        Ok(Self {
            config,
            token_configured,
            analytics,
            drive,
            manager,
            orchestrator,
        })
    }

    /// The configuration the application was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The schedule manager.
    pub fn manager(&self) -> &ScheduleManager<SqliteScheduler> {
        &self.manager
    }

    /// The backup orchestrator.
    pub fn orchestrator(&self) -> &AppOrchestrator {
        &self.orchestrator
    }

    /// Lists the websites the token can read.
    pub async fn list_websites(&self) -> Result<String, BackupError> {
        let sites = self.analytics.list_verified_sites().await?;
        if sites.is_empty() {
            return Ok("No verified websites found for this account".to_string());
        }
        let mut message = format!("{} verified website(s):", sites.len());
        for site in &sites {
            message.push_str(&format!("\n  {} ({})", site.url, site.permission_level));
        }
        Ok(message)
    }

    /// Lists the sheets of the manual-import workbook.
    pub async fn list_sheets(&self) -> Result<String, BackupError> {
        let name = &self.config.import_workbook;
        match self.drive.open_workbook(name)? {
            None => Ok(format!("Workbook '{name}' does not exist yet")),
            Some(workbook) => Ok(format!(
                "Sheets in '{}': {}",
                name,
                workbook.sheet_names().join(", ")
            )),
        }
    }

    /// Imports data into `sheet_name` of the manual-import workbook.
    ///
    /// Rows are appended when the sheet already has matching headers and
    /// overwrite it otherwise.
    pub async fn import_now(
        &self,
        sheet_name: &str,
        params: &ImportParams,
    ) -> Result<String, BackupError> {
        let started = Instant::now();
        let now = Local::now().naive_local();
        let request = params.to_request(now.date())?;

        let mut workbook = self
            .drive
            .open_or_create_workbook(&self.config.import_workbook)?;
        manual::claim_sheet(&mut workbook, sheet_name)?;

        ensure_within_budget(started, self.config.import_time_budget)?;

        info!(
            "Importing {} ({} to {}) into '{}'",
            params.website,
            request.start_date,
            request.end_date,
            sheet_name.trim()
        );
        let sheet = workbook
            .sheet_mut(sheet_name.trim())
            .ok_or_else(|| BackupError::NotFound(format!("sheet '{}'", sheet_name.trim())))?;
        let outcome = import_rows(
            &self.analytics,
            &params.website,
            &request,
            sheet,
            WriteMode::Auto,
            now,
        )
        .await?;
        self.drive.save_workbook(&workbook)?;
        Ok(format!("{} ({})", outcome.message, workbook.link()))
    }

    /// Creates a schedule, replacing any for the same website and type.
    pub async fn setup_schedule(&self, request: SetupRequest) -> Result<String, BackupError> {
        let website = request.website.trim().to_string();
        let spec = TriggerSpec::for_backup(request.backup_type);
        let schedule_id = self.manager.setup(request).await?;
        Ok(format!(
            "Scheduled backup for {website} ({}). Schedule id: {schedule_id}",
            spec.describe()
        ))
    }

    /// Lists schedules, newest first.
    pub async fn list_schedules(&self) -> Result<String, BackupError> {
        let schedules: Vec<BackupConfigSummary> = self.manager.list().await?;
        if schedules.is_empty() {
            return Ok("No backup schedules configured".to_string());
        }
        let lines: Vec<String> = schedules.iter().map(ToString::to_string).collect();
        Ok(format!(
            "{} schedule(s):\n{}",
            schedules.len(),
            lines.join("\n")
        ))
    }

    /// Runs a schedule's backup immediately.
    pub async fn run_schedule_now(&self, schedule_id: &str) -> Result<String, BackupError> {
        self.orchestrator
            .run(schedule_id)
            .await
            .map(|report| report.message())
    }

    /// Pauses a schedule.
    pub async fn pause_schedule(&self, schedule_id: &str) -> Result<String, BackupError> {
        let config = self.manager.pause(schedule_id).await?;
        Ok(format!(
            "Paused {} backup for {} (schedule {})",
            config.backup_type, config.website, schedule_id
        ))
    }

    /// Resumes a paused schedule under a new id.
    pub async fn resume_schedule(&self, schedule_id: &str) -> Result<String, BackupError> {
        let config = self.manager.resume(schedule_id).await?;
        Ok(format!(
            "Resumed {} backup for {}. New schedule id: {}",
            config.backup_type, config.website, config.schedule_id
        ))
    }

    /// Deletes a schedule.
    pub async fn delete_schedule(&self, schedule_id: &str) -> Result<String, BackupError> {
        let website = self.manager.delete(schedule_id).await?;
        Ok(format!("Deleted schedule {schedule_id} for {website}"))
    }

    /// Removes configurations whose trigger is gone.
    pub async fn cleanup_orphans(&self) -> Result<String, BackupError> {
        let removed = self.manager.reconcile_orphans().await?;
        Ok(match removed {
            0 => "No orphaned configurations found".to_string(),
            n => format!("Removed {n} orphaned configuration(s)"),
        })
    }

    /// Checks credentials, storage and the output directory.
    pub async fn diagnostics(&self) -> DiagnosticsReport {
        let websites = if self.token_configured {
            self.analytics
                .list_verified_sites()
                .await
                .map(|sites| sites.len())
                .map_err(|e| e.to_string())
        } else {
            Err("skipped: no access token".to_string())
        };
        let schedules = self
            .manager
            .store()
            .list_all()
            .await
            .map(|all| all.len())
            .map_err(|e| e.to_string());
        let triggers = self
            .manager
            .scheduler()
            .list()
            .await
            .map(|ids| ids.len())
            .map_err(|e| e.to_string());
        let orphans = self
            .manager
            .orphan_ids()
            .await
            .map(|ids| ids.len())
            .map_err(|e| e.to_string());

        DiagnosticsReport {
            token_configured: self.token_configured,
            websites,
            schedules,
            triggers,
            orphans,
            output_dir: self.drive.root().display().to_string(),
            output_dir_error: diagnostics::check_writable(self.drive.root()),
        }
    }

    /// Runs the diagnostics and formats the report.
    pub async fn run_diagnostics(&self) -> Result<String, BackupError> {
        Ok(self.diagnostics().await.to_string())
    }

    /// Fires due backups until `shutdown` is cancelled.
    pub async fn daemon(&self, shutdown: CancellationToken) -> Result<String, BackupError> {
        let runner = ScheduleRunner::new(
            self.manager.scheduler().clone(),
            self.orchestrator.clone(),
        );
        runner.run(shutdown).await;
        Ok("Scheduler stopped".to_string())
    }
}
