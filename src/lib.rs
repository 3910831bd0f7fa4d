//! search_backup library: scheduled backups of search-analytics data
//!
//! This library imports search-analytics data into workbooks, either on demand
//! or on a recurring schedule. Schedules and their triggers live in a SQLite
//! database; each scheduled run probes for the newest available data, writes
//! it to a fresh dated workbook and reports the outcome.
//!
//! # Example
//!
//! ```no_run
//! use search_backup::{App, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     token: Some("ya29.token".to_string()),
//!     ..Default::default()
//! };
//!
//! let app = App::new(config).await?;
//! println!("{}", app.list_websites().await?);
//! println!("{}", app.list_schedules().await?);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

pub mod analytics;
pub mod app;
pub mod auth;
pub mod backup;
pub mod config;
mod error_handling;
pub mod import;
pub mod initialization;
pub mod notify;
pub mod probe;
pub mod schedule;
pub mod sheet;
pub mod storage;

// Re-export public API
pub use app::{App, DateSelection, DiagnosticsReport, ImportParams};
pub use backup::{BackupOrchestrator, BackupReport};
pub use config::{Config, LogFormat, LogLevel, ProbeWindow};
pub use error_handling::{BackupError, DatabaseError, InitializationError, SheetError};
pub use schedule::{ScheduleManager, SetupRequest};
pub use storage::{run_migrations, BackupConfig, BackupType, ScheduleStatus};
