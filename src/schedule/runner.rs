//! Daemon loop that fires due triggers.
//!
//! Every `check_interval` the runner asks the `SqliteScheduler` for triggers
//! that are due, moves each to its next run and hands its id to the handler.
//! Runs are sequential; a failed run is logged and does not stop the loop.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::SCHEDULER_POLL_INTERVAL;
use crate::error_handling::BackupError;

use super::trigger::SqliteScheduler;

/// Work performed when a trigger fires.
pub trait TriggerHandler: Send + Sync {
    /// Runs the activation for `trigger_id` and returns its result message.
    fn fire(&self, trigger_id: &str) -> impl Future<Output = Result<String, BackupError>> + Send;
}

/// Outcome of one polling pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Triggers handed to the handler
    pub fired: usize,
    /// Of those, how many returned an error
    pub failed: usize,
    /// Due triggers that could not be advanced and were not fired
    pub skipped: usize,
}

/// Polls the trigger table and fires due triggers.
pub struct ScheduleRunner<H> {
    scheduler: SqliteScheduler,
    handler: H,
    check_interval: Duration,
}

impl<H: TriggerHandler> ScheduleRunner<H> {
    /// Creates a runner with the default poll interval.
    pub fn new(scheduler: SqliteScheduler, handler: H) -> Self {
        Self {
            scheduler,
            handler,
            check_interval: SCHEDULER_POLL_INTERVAL,
        }
    }

    /// Sets the poll interval.
    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Fires every trigger due at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, BackupError> {
        let mut report = TickReport::default();
        for trigger in self.scheduler.due(now).await? {
            // Advance first; a failed run waits for its next slot.
            match self.scheduler.mark_fired(&trigger.id, now).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Trigger {} disappeared before it fired", trigger.id);
                    continue;
                }
                Err(e) => {
                    report.skipped += 1;
                    warn!("Could not advance trigger {}; not firing it: {e}", trigger.id);
                    continue;
                }
            }

            info!(
                "Firing trigger {} (scheduled for {})",
                trigger.id, trigger.next_run
            );
            report.fired += 1;
            match self.handler.fire(&trigger.id).await {
                Ok(message) => info!("Trigger {} finished: {}", trigger.id, message),
                Err(e) => {
                    report.failed += 1;
                    error!("Trigger {} failed: {}", trigger.id, e);
                }
            }
        }
        Ok(report)
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Schedule runner started (checking every {}s)",
            self.check_interval.as_secs()
        );
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Schedule runner stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick(Utc::now()).await {
                        Ok(report) if report.fired > 0 => debug!(
                            "Poll fired {} trigger(s), {} failed",
                            report.fired, report.failed
                        ),
                        Ok(_) => {}
                        Err(e) => warn!("Polling triggers failed: {e}"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::trigger::{Scheduler, TriggerSpec, BACKUP_HANDLER};
    use crate::storage::test_helpers::create_test_pool;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingHandler {
        fired: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl TriggerHandler for RecordingHandler {
        async fn fire(&self, trigger_id: &str) -> Result<String, BackupError> {
            self.fired.lock().unwrap().push(trigger_id.to_string());
            if self.fail {
                Err(BackupError::ConfigNotFound(trigger_id.to_string()))
            } else {
                Ok("done".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_tick_fires_due_once() {
        let scheduler = SqliteScheduler::new(create_test_pool().await);
        let id = scheduler
            .schedule(&TriggerSpec::Daily { hour: 2 })
            .await
            .unwrap();
        let due_at = scheduler.next_run(&id).await.unwrap().unwrap();

        let handler = RecordingHandler::default();
        let runner = ScheduleRunner::new(scheduler.clone(), handler.clone());

        assert_eq!(runner.tick(Utc::now()).await.unwrap().fired, 0);
        assert_eq!(
            runner.tick(due_at).await.unwrap(),
            TickReport {
                fired: 1,
                failed: 0,
                skipped: 0
            }
        );
        assert_eq!(runner.tick(due_at).await.unwrap().fired, 0);
        assert_eq!(*handler.fired.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_failed_run_still_advances() {
        let scheduler = SqliteScheduler::new(create_test_pool().await);
        let id = scheduler
            .schedule(&TriggerSpec::Monthly { day: 3, hour: 2 })
            .await
            .unwrap();
        let due_at = scheduler.next_run(&id).await.unwrap().unwrap();

        let handler = RecordingHandler {
            fail: true,
            ..Default::default()
        };
        let runner = ScheduleRunner::new(scheduler.clone(), handler);
        let report = runner.tick(due_at).await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(scheduler.next_run(&id).await.unwrap().unwrap() > due_at);
    }

    #[tokio::test]
    async fn test_broken_trigger_does_not_stop_the_batch() {
        let pool = create_test_pool().await;
        let scheduler = SqliteScheduler::new(pool.clone());
        let id = scheduler
            .schedule(&TriggerSpec::Daily { hour: 2 })
            .await
            .unwrap();
        let due_at = scheduler.next_run(&id).await.unwrap().unwrap();
        // Due before the good one, with a cron expression that cannot be parsed.
        sqlx::query(
            "INSERT INTO triggers (id, handler, cron, next_run_ms, created_at_ms)
             VALUES ('broken', ?, 'not a cron', 0, 0)",
        )
        .bind(BACKUP_HANDLER)
        .execute(&pool)
        .await
        .unwrap();

        let handler = RecordingHandler::default();
        let runner = ScheduleRunner::new(scheduler, handler.clone());
        let report = runner.tick(due_at).await.unwrap();
        assert_eq!(
            report,
            TickReport {
                fired: 1,
                failed: 0,
                skipped: 1
            }
        );
        assert_eq!(*handler.fired.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let scheduler = SqliteScheduler::new(create_test_pool().await);
        let runner = ScheduleRunner::new(scheduler, RecordingHandler::default())
            .with_check_interval(Duration::from_millis(10));
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), runner.run(shutdown))
            .await
            .expect("runner should stop once cancelled");
    }
}
