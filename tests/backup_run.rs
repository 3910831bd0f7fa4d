//! End-to-end scheduled backups: App + mock API + workbook directory.

mod helpers;

use std::fs;

use serde_json::{json, Value};
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{app, mount_rows, mount_sites, rows_body, test_config, SITE};
use search_backup::analytics::{Dimension, SearchType};
use search_backup::config::{BACKUP_FOLDER_NAME, PRIMARY_SHEET_NAME, UNGROUPED_SHEET_NAME};
use search_backup::{BackupError, BackupType, SetupRequest};

fn daily(website: &str) -> SetupRequest {
    SetupRequest {
        website: website.to_string(),
        backup_type: BackupType::Daily,
        dimensions: vec![Dimension::Query],
        search_type: SearchType::Web,
        separate_ungrouped: false,
        email_notification: false,
    }
}

async fn mount_notifications(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
}

async fn notifications(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/notify")
        .map(|r| serde_json::from_slice(&r.body).expect("notification body is JSON"))
        .collect()
}

#[tokio::test]
async fn test_scheduled_backup_writes_dated_workbook() {
    let server = MockServer::start().await;
    mount_sites(&server, &[SITE]).await;
    // Ungrouped queries carry all four base dimensions
    Mock::given(method("POST"))
        .and(path_regex(r"/searchAnalytics/query$"))
        .and(body_partial_json(
            json!({"dimensions": ["query", "page", "country", "device"]}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_body(4, 4)))
        .mount(&server)
        .await;
    mount_rows(&server, 3).await;
    mount_notifications(&server).await;

    let dir = tempdir().unwrap();
    let mut config = test_config(&server, dir.path());
    config.notification_webhook = Some(format!("{}/notify", server.uri()));
    config.notification_recipient = Some("owner@example.com".to_string());
    let app = app(config).await;

    let mut request = daily(SITE);
    request.separate_ungrouped = true;
    request.email_notification = true;
    let message = app.setup_schedule(request).await.unwrap();
    let schedule_id = message.rsplit(' ').next().unwrap().to_string();

    let report = app.orchestrator().run(&schedule_id).await.unwrap();
    assert_eq!(report.start_date, report.end_date);
    assert_eq!(report.primary.rows_written, 3);
    assert_eq!(report.ungrouped.as_ref().unwrap().rows_written, 4);
    assert!(report.workbook_name.starts_with("example.com - Daily Backup - "));

    let workbook_dir = dir
        .path()
        .join("workbooks")
        .join(BACKUP_FOLDER_NAME)
        .join(&report.workbook_name);
    let manifest = fs::read_to_string(workbook_dir.join("workbook.json")).unwrap();
    assert!(manifest.contains(PRIMARY_SHEET_NAME));
    assert!(manifest.contains(UNGROUPED_SHEET_NAME));

    let primary = fs::read_to_string(workbook_dir.join("01-Backup Data.csv")).unwrap();
    let mut lines = primary.lines();
    assert_eq!(
        lines.next(),
        Some("Query,Date and Time,Clicks,Impressions,CTR,Position")
    );
    assert_eq!(primary.lines().count(), 4);
    assert!(primary.contains(",10,100,10.00%,3.4"));

    let ungrouped = fs::read_to_string(workbook_dir.join("02-Ungrouped Data.csv")).unwrap();
    assert!(ungrouped.starts_with("Query,Page,Country,Device,Date and Time"));

    let sent = notifications(&server).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["to"], "owner@example.com");
    assert_eq!(
        sent[0]["subject"],
        format!("Search Console Backup Completed - {SITE}")
    );

    let stored = app.manager().store().get(&schedule_id).await.unwrap().unwrap();
    assert!(stored.last_run_at.is_some());
    assert!(stored.last_error.is_none());
}

#[tokio::test]
async fn test_monthly_backup_covers_previous_full_month() {
    let server = MockServer::start().await;
    mount_sites(&server, &[SITE]).await;
    mount_rows(&server, 2).await;

    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;
    let mut request = daily(SITE);
    request.backup_type = BackupType::Monthly;
    app.setup_schedule(request).await.unwrap();
    let schedule_id = app.manager().store().list_ids().await.unwrap().remove(0);

    let report = app.orchestrator().run(&schedule_id).await.unwrap();
    assert_eq!(chrono::Datelike::day(&report.start_date), 1);
    assert!(report.end_date > report.start_date);
    assert!(report.workbook_name.contains("Monthly Backup"));
}

#[tokio::test]
async fn test_revoked_access_fails_and_notifies() {
    let server = MockServer::start().await;
    mount_sites(&server, &["https://other.example/"]).await;
    mount_rows(&server, 1).await;
    mount_notifications(&server).await;

    let dir = tempdir().unwrap();
    let mut config = test_config(&server, dir.path());
    config.notification_webhook = Some(format!("{}/notify", server.uri()));
    let app = app(config).await;

    let mut request = daily(SITE);
    request.email_notification = true;
    app.setup_schedule(request).await.unwrap();
    let schedule_id = app.manager().store().list_ids().await.unwrap().remove(0);

    let err = app.run_schedule_now(&schedule_id).await.unwrap_err();
    assert!(matches!(err, BackupError::AccessRevoked { .. }));

    let sent = notifications(&server).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0]["subject"]
        .as_str()
        .unwrap()
        .starts_with("Search Console Backup Failed"));
    assert!(sent[0].get("to").is_none());

    let stored = app.manager().store().get(&schedule_id).await.unwrap().unwrap();
    assert_eq!(stored.last_error, Some(err.to_string()));

    // No workbook is created before access is confirmed
    assert!(!dir.path().join("workbooks").join(BACKUP_FOLDER_NAME).exists());
}

#[tokio::test]
async fn test_empty_data_is_reported_not_failed() {
    let server = MockServer::start().await;
    mount_sites(&server, &[SITE]).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;
    app.setup_schedule(daily(SITE)).await.unwrap();
    let schedule_id = app.manager().store().list_ids().await.unwrap().remove(0);

    let message = app.run_schedule_now(&schedule_id).await.unwrap();
    assert!(message.contains("No data found"), "{message}");
}

#[tokio::test]
async fn test_unknown_schedule_is_config_not_found() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;
    assert!(matches!(
        app.run_schedule_now("missing").await,
        Err(BackupError::ConfigNotFound(_))
    ));
}
