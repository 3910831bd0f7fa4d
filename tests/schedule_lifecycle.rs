//! Schedule lifecycle through the application operations.

mod helpers;

use chrono::{Duration, Utc};
use tempfile::tempdir;
use wiremock::MockServer;

use helpers::{app, mount_sites, test_config, SITE};
use search_backup::analytics::{Dimension, SearchType};
use search_backup::schedule::Scheduler;
use search_backup::{BackupError, BackupType, ScheduleStatus, SetupRequest};

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
async fn test_resetup_replaces_schedule_for_same_pair() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;

    app.setup_schedule(request("example.com", BackupType::Daily, vec![Dimension::Query]))
        .await
        .unwrap();
    app.setup_schedule(request("example.com", BackupType::Daily, vec![Dimension::Page]))
        .await
        .unwrap();
    app.setup_schedule(request("example.com", BackupType::Monthly, vec![Dimension::Query]))
        .await
        .unwrap();

    let schedules = app.manager().list().await.unwrap();
    assert_eq!(schedules.len(), 2);
    let daily: Vec<_> = schedules
        .iter()
        .filter(|s| s.backup_type == BackupType::Daily)
        .collect();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].dimensions, vec![Dimension::Page]);

    let triggers = app.manager().scheduler().list().await.unwrap();
    assert_eq!(triggers.len(), 2);
}

#[tokio::test]
async fn test_pause_resume_delete() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;

    app.setup_schedule(request(
        SITE,
        BackupType::Monthly,
        vec![Dimension::Query, Dimension::Country],
    ))
    .await
    .unwrap();
    let id = app.manager().store().list_ids().await.unwrap().remove(0);

    let message = app.pause_schedule(&id).await.unwrap();
    assert!(message.contains("Paused monthly backup"));
    assert!(app.manager().scheduler().list().await.unwrap().is_empty());
    assert!(matches!(
        app.pause_schedule(&id).await,
        Err(BackupError::AlreadyPaused(_))
    ));
    assert!(app.list_schedules().await.unwrap().contains("next: Unknown"));

    let message = app.resume_schedule(&id).await.unwrap();
    let new_id = message.rsplit(' ').next().unwrap().to_string();
    assert_ne!(new_id, id);
    assert!(app.manager().store().get(&id).await.unwrap().is_none());
    let resumed = app.manager().store().get(&new_id).await.unwrap().unwrap();
    assert_eq!(resumed.status, ScheduleStatus::Active);
    assert_eq!(resumed.website, SITE);
    assert_eq!(resumed.dimensions, vec![Dimension::Query, Dimension::Country]);
    assert_eq!(resumed.backup_type, BackupType::Monthly);
    assert!(resumed.resumed_at.is_some());
    assert!(resumed.paused_at.is_none());
    assert_eq!(
        app.manager().scheduler().list().await.unwrap(),
        vec![new_id.clone()]
    );
    assert!(matches!(
        app.resume_schedule(&new_id).await,
        Err(BackupError::NotPaused(_))
    ));

    let message = app.delete_schedule(&new_id).await.unwrap();
    assert_eq!(message, format!("Deleted schedule {new_id} for {SITE}"));
    assert_eq!(
        app.list_schedules().await.unwrap(),
        "No backup schedules configured"
    );
    assert!(app.delete_schedule(&new_id).await.unwrap().ends_with("Unknown"));
}

#[tokio::test]
async fn test_cleanup_removes_configs_without_triggers() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;

    for site in ["a.example", "b.example", "c.example"] {
        app.setup_schedule(request(site, BackupType::Daily, vec![Dimension::Query]))
            .await
            .unwrap();
    }
    let triggers = app.manager().scheduler().list().await.unwrap();
    for id in triggers.iter().skip(1) {
        assert!(app.manager().scheduler().cancel(id).await.unwrap());
    }

    assert_eq!(
        app.cleanup_orphans().await.unwrap(),
        "Removed 2 orphaned configuration(s)"
    );
    assert_eq!(
        app.manager().store().list_ids().await.unwrap(),
        vec![triggers[0].clone()]
    );
    assert_eq!(
        app.cleanup_orphans().await.unwrap(),
        "No orphaned configurations found"
    );
}

#[tokio::test]
async fn test_schedules_survive_restart() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = test_config(&server, dir.path());

    let id = {
        let app = app(config.clone()).await;
        app.setup_schedule(request(SITE, BackupType::Daily, vec![Dimension::Query]))
            .await
            .unwrap();
        app.manager().store().list_ids().await.unwrap().remove(0)
    };

    let app = app(config).await;
    let listing = app.list_schedules().await.unwrap();
    assert!(listing.starts_with("1 schedule(s):"));
    assert!(listing.contains(&id));
    assert!(listing.contains("Daily at 2:00 AM"));
}

#[tokio::test]
async fn test_due_trigger_is_found_by_scheduler() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;
    app.setup_schedule(request(SITE, BackupType::Daily, vec![Dimension::Query]))
        .await
        .unwrap();

    let scheduler = app.manager().scheduler();
    assert!(scheduler.due(Utc::now()).await.unwrap().is_empty());
    let due = scheduler.due(Utc::now() + Duration::days(2)).await.unwrap();
    assert_eq!(due.len(), 1);
}

#[tokio::test]
async fn test_diagnostics_report() {
    let server = MockServer::start().await;
    mount_sites(&server, &[SITE, "sc-domain:example.org"]).await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;
    app.setup_schedule(request(SITE, BackupType::Daily, vec![Dimension::Query]))
        .await
        .unwrap();

    let report = app.diagnostics().await;
    assert!(report.token_configured);
    assert_eq!(report.websites, Ok(2));
    assert_eq!(report.schedules, Ok(1));
    assert_eq!(report.triggers, Ok(1));
    assert_eq!(report.orphans, Ok(0));
    assert!(report.output_dir_error.is_none());
    assert!(report.is_healthy());

    let text = app.run_diagnostics().await.unwrap();
    assert!(text.contains("Verified websites: 2"));
    assert!(text.ends_with("Overall: OK"));
}

#[tokio::test]
async fn test_diagnostics_without_token() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let mut config = test_config(&server, dir.path());
    config.token = None;
    let app = app(config).await;

    let report = app.diagnostics().await;
    assert!(!report.token_configured);
    assert!(report.websites.is_err());
    assert!(!report.is_healthy());
}
