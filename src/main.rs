//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `search_backup` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use search_backup::analytics::{AggregationType, DatePreset, Dimension, DimensionFilter, SearchType};
use search_backup::app::cancel_on_ctrl_c;
use search_backup::config::{
    DB_PATH, DEFAULT_API_BASE, HTTP_TIMEOUT_SECS, IMPORT_TIME_BUDGET, IMPORT_WORKBOOK,
    MAX_ROW_LIMIT, OUTPUT_DIR, PROBE_MAX_DAY_LAG, PROBE_MIN_DAY_LAG, PROBE_MONTHS_BACK,
    RETRY_MAX_ATTEMPTS,
};
use search_backup::initialization::init_logger_with;
use search_backup::{
    App, BackupType, Config, DateSelection, ImportParams, LogFormat, LogLevel, ProbeWindow,
    SetupRequest,
};

/// Backs up search-analytics data into workbooks, on demand or on a schedule.
#[derive(Debug, Parser)]
#[command(name = "search_backup", version, about)]
struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain", global = true)]
    log_format: LogFormat,

    /// SQLite database holding schedules and triggers
    #[arg(long, default_value = DB_PATH, global = true)]
    db_path: PathBuf,

    /// Directory that holds workbooks
    #[arg(long, default_value = OUTPUT_DIR, global = true)]
    output_dir: PathBuf,

    /// Workbook used by manual imports
    #[arg(long, default_value = IMPORT_WORKBOOK, global = true)]
    workbook: String,

    /// Base URL of the analytics API
    #[arg(long, default_value = DEFAULT_API_BASE, global = true)]
    api_base: String,

    /// Bearer token for the analytics API
    #[arg(long, env = "SEARCH_BACKUP_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = HTTP_TIMEOUT_SECS, global = true)]
    timeout_seconds: u64,

    /// Retries for transient API failures
    #[arg(long, default_value_t = RETRY_MAX_ATTEMPTS, global = true)]
    max_retries: usize,

    /// Mail relay endpoint for notifications
    #[arg(long, env = "SEARCH_BACKUP_WEBHOOK_URL", global = true)]
    notification_webhook: Option<String>,

    /// Recipient passed to the mail relay
    #[arg(long, env = "SEARCH_BACKUP_NOTIFY_TO", global = true)]
    notify_to: Option<String>,

    /// Closest day to today probed for data
    #[arg(long, default_value_t = PROBE_MIN_DAY_LAG, global = true)]
    probe_min_day_lag: u32,

    /// Furthest day back probed for data
    #[arg(long, default_value_t = PROBE_MAX_DAY_LAG, global = true)]
    probe_max_day_lag: u32,

    /// Full months probed for monthly backups
    #[arg(long, default_value_t = PROBE_MONTHS_BACK, global = true)]
    probe_months_back: u32,

    /// Seconds an import may take before its main query starts
    #[arg(long, default_value_t = IMPORT_TIME_BUDGET.as_secs(), global = true)]
    time_budget_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List verified websites
    ListWebsites,
    /// List sheets of the import workbook
    ListSheets,
    /// Import data into a sheet of the import workbook
    Import {
        /// Property URL
        #[arg(long)]
        site: String,
        /// Target sheet (created if missing)
        #[arg(long)]
        sheet: String,
        /// Named date range
        #[arg(long, value_enum, conflicts_with_all = ["start", "end"])]
        preset: Option<DatePreset>,
        /// First day (YYYY-MM-DD)
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,
        /// Last day (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
        /// Grouping dimensions, comma separated
        #[arg(long, value_enum, value_delimiter = ',', default_value = "query")]
        dimensions: Vec<Dimension>,
        /// Search surface
        #[arg(long, value_enum, default_value = "web")]
        search_type: SearchType,
        /// Maximum rows
        #[arg(long, default_value_t = MAX_ROW_LIMIT)]
        row_limit: u32,
        /// Equality filter DIMENSION=VALUE (repeatable)
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<DimensionFilter>,
        /// Aggregation mode
        #[arg(long, value_enum)]
        aggregation: Option<AggregationType>,
    },
    /// Create a recurring backup
    Setup {
        /// Property URL
        #[arg(long)]
        site: String,
        /// Daily or monthly
        #[arg(long, value_enum)]
        backup_type: BackupType,
        /// Grouping dimensions, comma separated
        #[arg(long, value_enum, value_delimiter = ',', default_value = "query")]
        dimensions: Vec<Dimension>,
        /// Search surface
        #[arg(long, value_enum, default_value = "web")]
        search_type: SearchType,
        /// Also write a sheet grouped by query, page, country and device
        #[arg(long)]
        separate_ungrouped: bool,
        /// Send success and failure notifications
        #[arg(long)]
        notify: bool,
    },
    /// List schedules
    ListSchedules,
    /// Run a schedule's backup now
    RunNow {
        /// Schedule id
        id: String,
    },
    /// Pause a schedule
    Pause {
        /// Schedule id
        id: String,
    },
    /// Resume a paused schedule (it gets a new id)
    Resume {
        /// Schedule id
        id: String,
    },
    /// Delete a schedule
    Delete {
        /// Schedule id
        id: String,
    },
    /// Remove configurations whose trigger is gone
    CleanupOrphans,
    /// Check token, storage and output directory
    Diagnostics,
    /// Fire scheduled backups until Ctrl-C
    Daemon,
}

fn parse_filter(raw: &str) -> Result<DimensionFilter, String> {
    let (dimension, expression) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected DIMENSION=VALUE, got '{raw}'"))?;
    let dimension: Dimension = dimension.parse()?;
    Ok(DimensionFilter::equals(dimension, expression.trim()))
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            db_path: self.db_path.clone(),
            output_dir: self.output_dir.clone(),
            import_workbook: self.workbook.clone(),
            api_base: self.api_base.clone(),
            token: self.token.clone(),
            timeout_seconds: self.timeout_seconds,
            max_retries: self.max_retries,
            notification_webhook: self.notification_webhook.clone(),
            notification_recipient: self.notify_to.clone(),
            probe_window: ProbeWindow {
                min_day_lag: self.probe_min_day_lag,
                max_day_lag: self.probe_max_day_lag,
                months_back: self.probe_months_back,
            },
            import_time_budget: Duration::from_secs(self.time_budget_secs),
        }
    }
}

async fn run(config: Config, command: Command) -> Result<String> {
    let app = App::new(config).await?;

    let message = match command {
        Command::ListWebsites => app.list_websites().await?,
        Command::ListSheets => app.list_sheets().await?,
        Command::Import {
            site,
            sheet,
            preset,
            start,
            end,
            dimensions,
            search_type,
            row_limit,
            filters,
            aggregation,
        } => {
            let dates = match (start, end) {
                (Some(start), Some(end)) => DateSelection::Custom { start, end },
                _ => DateSelection::Preset(preset.unwrap_or(DatePreset::Last7Days)),
            };
            let mut params = ImportParams::new(site, dates, dimensions);
            params.search_type = search_type;
            params.row_limit = row_limit;
            params.filters = filters;
            params.aggregation_type = aggregation;
            app.import_now(&sheet, &params).await?
        }
        Command::Setup {
            site,
            backup_type,
            dimensions,
            search_type,
            separate_ungrouped,
            notify,
        } => {
            app.setup_schedule(SetupRequest {
                website: site,
                backup_type,
                dimensions,
                search_type,
                separate_ungrouped,
                email_notification: notify,
            })
            .await?
        }
        Command::ListSchedules => app.list_schedules().await?,
        Command::RunNow { id } => app.run_schedule_now(&id).await?,
        Command::Pause { id } => app.pause_schedule(&id).await?,
        Command::Resume { id } => app.resume_schedule(&id).await?,
        Command::Delete { id } => app.delete_schedule(&id).await?,
        Command::CleanupOrphans => app.cleanup_orphans().await?,
        Command::Diagnostics => app.run_diagnostics().await?,
        Command::Daemon => {
            let shutdown = CancellationToken::new();
            let listener = cancel_on_ctrl_c(shutdown.clone());
            let message = app.daemon(shutdown.clone()).await?;
            shutdown.cancel();
            let _ = listener.await;
            message
        }
    };
    Ok(message)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env from the current directory, then from next to the executable
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let cli = Cli::parse();

    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    let config = cli.config();
    match run(config, cli.command).await {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(e) => {
            eprintln!("search_backup error: {:#}", e);
            process::exit(1);
        }
    }
}
