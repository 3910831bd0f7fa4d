//! Manual imports into the import workbook.

mod helpers;

use std::fs;
use std::time::Duration;

use chrono::{Days, Local};
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{app, mount_rows, mount_sites, rows_body, test_config, SITE};
use search_backup::analytics::{DatePreset, Dimension};
use search_backup::config::IMPORT_WORKBOOK;
use search_backup::{BackupError, DateSelection, ImportParams};

fn params(dimensions: Vec<Dimension>) -> ImportParams {
    ImportParams::new(SITE, DateSelection::Preset(DatePreset::Last7Days), dimensions)
}

fn read_sheet(dir: &std::path::Path, file: &str) -> String {
    fs::read_to_string(dir.join("workbooks").join(IMPORT_WORKBOOK).join(file)).unwrap()
}

#[tokio::test]
async fn test_same_headers_append() {
    let server = MockServer::start().await;
    mount_rows(&server, 2).await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;

    let first = app
        .import_now("Queries", &params(vec![Dimension::Query]))
        .await
        .unwrap();
    assert!(first.starts_with("Successfully imported 2 rows"), "{first}");

    let second = app
        .import_now("Queries", &params(vec![Dimension::Query]))
        .await
        .unwrap();
    assert!(second.starts_with("Successfully appended 2 rows"), "{second}");

    let csv = read_sheet(dir.path(), "01-Queries.csv");
    assert_eq!(csv.lines().count(), 5);
    assert_eq!(
        csv.lines()
            .filter(|l| l.starts_with("Query,Date and Time"))
            .count(),
        1
    );
    assert_eq!(app.list_sheets().await.unwrap(), format!("Sheets in '{IMPORT_WORKBOOK}': Queries"));
}

#[tokio::test]
async fn test_append_keeps_numeric_looking_queries_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                {"keys": ["007"], "clicks": 5, "impressions": 50, "ctr": 0.1, "position": 1.0},
                {"keys": ["1e3"], "clicks": 3, "impressions": 30, "ctr": 0.1, "position": 2.0}
            ]
        })))
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;

    for _ in 0..2 {
        app.import_now("Queries", &params(vec![Dimension::Query]))
            .await
            .unwrap();
    }

    let csv = read_sheet(dir.path(), "01-Queries.csv");
    let queries: Vec<&str> = csv
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next())
        .collect();
    assert_eq!(queries, vec!["007", "1e3", "007", "1e3"]);
}

#[tokio::test]
async fn test_different_headers_overwrite() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"dimensions": ["page", "device"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_body(1, 2)))
        .mount(&server)
        .await;
    mount_rows(&server, 3).await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;

    app.import_now("Data", &params(vec![Dimension::Query]))
        .await
        .unwrap();
    let message = app
        .import_now("Data", &params(vec![Dimension::Page, Dimension::Device]))
        .await
        .unwrap();
    assert!(message.starts_with("Successfully imported 1 rows"), "{message}");

    let csv = read_sheet(dir.path(), "01-Data.csv");
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.starts_with("Page,Device,Date and Time,Clicks,Impressions,CTR,Position"));
}

#[tokio::test]
async fn test_empty_result_reports_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": []})))
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;

    let message = app
        .import_now("Empty", &params(vec![Dimension::Query]))
        .await
        .unwrap();
    assert!(message.starts_with("No data found"), "{message}");
    assert!(!message.contains("Successfully"));
}

#[tokio::test]
async fn test_invalid_range_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;

    let today = Local::now().date_naive();
    let future = ImportParams::new(
        SITE,
        DateSelection::Custom {
            start: today,
            end: today + Days::new(3),
        },
        vec![Dimension::Query],
    );
    assert!(matches!(
        app.import_now("Data", &future).await,
        Err(BackupError::Validation(_))
    ));

    let ancient = ImportParams::new(
        SITE,
        DateSelection::Custom {
            start: today - Days::new(600),
            end: today - Days::new(590),
        },
        vec![Dimension::Query],
    );
    assert!(matches!(
        app.import_now("Data", &ancient).await,
        Err(BackupError::Validation(_))
    ));
}

#[tokio::test]
async fn test_exhausted_budget_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let mut config = test_config(&server, dir.path());
    config.import_time_budget = Duration::ZERO;
    let app = app(config).await;

    assert!(matches!(
        app.import_now("Data", &params(vec![Dimension::Query])).await,
        Err(BackupError::TimeoutExceeded { .. })
    ));
}

#[tokio::test]
async fn test_list_websites_and_missing_workbook() {
    let server = MockServer::start().await;
    mount_sites(&server, &[SITE]).await;
    let dir = tempdir().unwrap();
    let app = app(test_config(&server, dir.path())).await;

    assert_eq!(
        app.list_websites().await.unwrap(),
        format!("1 verified website(s):\n  {SITE} (siteOwner)")
    );
    assert_eq!(
        app.list_sheets().await.unwrap(),
        format!("Workbook '{IMPORT_WORKBOOK}' does not exist yet")
    );
}
