// Shared test helpers: application config pointing at a mock API and
// canned API responses.
//
// Each test file pulls this in with `mod helpers;`, so not every helper is
// used everywhere.

use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use search_backup::{App, Config};

/// Token every mock expects.
#[allow(dead_code)]
pub const TOKEN: &str = "test-token";

/// Property used across tests.
#[allow(dead_code)]
pub const SITE: &str = "https://example.com/";

/// Config with its database and workbooks under `dir` and the API at `server`.
#[allow(dead_code)]
pub fn test_config(server: &MockServer, dir: &Path) -> Config {
    Config {
        db_path: dir.join("schedules.db"),
        output_dir: dir.join("workbooks"),
        api_base: server.uri(),
        token: Some(TOKEN.to_string()),
        timeout_seconds: 5,
        max_retries: 0,
        import_time_budget: Duration::from_secs(60),
        ..Default::default()
    }
}

/// Builds an `App` for `config`, panicking on failure.
#[allow(dead_code)]
pub async fn app(config: Config) -> App {
    App::new(config).await.expect("Failed to build app")
}

/// `{"siteEntry": [...]}` for the given URLs.
#[allow(dead_code)]
pub fn sites_body(urls: &[&str]) -> Value {
    let entries: Vec<Value> = urls
        .iter()
        .map(|url| json!({"siteUrl": url, "permissionLevel": "siteOwner"}))
        .collect();
    json!({ "siteEntry": entries })
}

/// A query response with `count` rows keyed by `keys_per_row` values each.
#[allow(dead_code)]
pub fn rows_body(count: usize, keys_per_row: usize) -> Value {
    let rows: Vec<Value> = (0..count)
        .map(|i| {
            let keys: Vec<String> = (0..keys_per_row).map(|k| format!("key{k}-{i}")).collect();
            json!({
                "keys": keys,
                "clicks": 10 + i,
                "impressions": 100,
                "ctr": 0.1,
                "position": 3.42
            })
        })
        .collect();
    json!({ "rows": rows })
}

/// Mounts `GET /sites` listing `urls`.
#[allow(dead_code)]
pub async fn mount_sites(server: &MockServer, urls: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sites_body(urls)))
        .mount(server)
        .await;
}

/// Mounts a query endpoint answering every query with `count` single-key rows.
#[allow(dead_code)]
pub async fn mount_rows(server: &MockServer, count: usize) {
    Mock::given(method("POST"))
        .and(path_regex(r"/searchAnalytics/query$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_body(count, 1)))
        .mount(server)
        .await;
}
