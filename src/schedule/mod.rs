//! Recurring backup schedules.
//!
//! This module provides:
//! - Trigger specs and the `Scheduler` seam, with a SQLite-backed job queue
//! - The Schedule Manager (setup, pause, resume, delete, list, orphan cleanup)
//! - The daemon loop that fires due triggers

mod manager;
mod runner;
mod trigger;

pub use manager::{
    BackupConfigSummary, ScheduleManager, SetupRequest, UNKNOWN_NEXT_RUN, UNKNOWN_WEBSITE,
};
pub use runner::{ScheduleRunner, TickReport, TriggerHandler};
pub use trigger::{
    new_trigger_id, DueTrigger, Scheduler, SqliteScheduler, TriggerSpec, BACKUP_HANDLER,
};
