//! Logger initialization.
//!
//! Backup runs prefix their messages with `[<schedule id>]`. Both formats
//! lift that prefix into its own field, so a daemon log can be filtered per
//! schedule. The component is the module path below the crate name.

use std::io::Write;

use chrono::{Local, Utc};
use colored::*;
use log::{Level, LevelFilter};
use serde_json::json;

use crate::config::LogFormat;
use crate::error_handling::InitializationError;

const CRATE_TARGET: &str = "search_backup";

/// Initializes the logger with the specified level and format.
///
/// `RUST_LOG` is read first; `level` then applies to this crate, and the
/// HTTP and database crates are capped at `info`.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already installed.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=search_backup=debug,reqwest=info search_backup list-schedules
/// search_backup --log-level debug --log-format json daemon
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::from_default_env();

    builder.filter_level(level);
    for noisy in ["sqlx", "reqwest", "hyper", "hyper_util"] {
        builder.filter_module(noisy, LevelFilter::Info.min(level));
    }
    builder.filter_module(CRATE_TARGET, level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                let line = json_line(
                    Utc::now().timestamp_millis(),
                    record.level(),
                    record.target(),
                    &record.args().to_string(),
                );
                writeln!(buf, "{line}")
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                let message = record.args().to_string();
                let (schedule, text) = split_schedule(&message);
                let level = match record.level() {
                    Level::Error => "ERROR".red().bold(),
                    Level::Warn => "WARN ".yellow(),
                    Level::Info => "INFO ".green(),
                    Level::Debug => "DEBUG".blue(),
                    Level::Trace => "TRACE".purple(),
                };
                let schedule = schedule
                    .map(|id| format!(" {}", format!("[{id}]").magenta()))
                    .unwrap_or_default();
                writeln!(
                    buf,
                    "{} {} {}{} {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    level,
                    component(record.target()).cyan(),
                    schedule,
                    text
                )
            });
        }
    }

    builder.try_init().map_err(InitializationError::from)?;
    Ok(())
}

/// Splits a leading `[<schedule id>] ` off a message.
fn split_schedule(message: &str) -> (Option<&str>, &str) {
    message
        .strip_prefix('[')
        .and_then(|rest| rest.split_once("] "))
        .filter(|(id, _)| !id.is_empty() && !id.contains(char::is_whitespace))
        .map_or((None, message), |(id, text)| (Some(id), text))
}

/// Module path below the crate name; other crates keep their full target.
fn component(target: &str) -> &str {
    match target.strip_prefix(CRATE_TARGET) {
        Some("") => "main",
        Some(rest) => rest.strip_prefix("::").unwrap_or(rest),
        None => target,
    }
}

/// One JSON log record. `schedule` is present only for run messages.
fn json_line(ts_ms: i64, level: Level, target: &str, message: &str) -> String {
    let (schedule, text) = split_schedule(message);
    let mut line = json!({
        "ts": ts_ms,
        "level": level.as_str(),
        "component": component(target),
        "msg": text,
    });
    if let Some(id) = schedule {
        line["schedule"] = json!(id);
    }
    line.to_string()
}
