//! HTTP client for the search-analytics API.

use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};
use serde::Deserialize;
use tokio_retry::RetryIf;

use crate::auth::TokenProvider;
use crate::config::RETRY_MAX_ATTEMPTS;
use crate::error_handling::{classify_status, get_retry_strategy, is_retriable, BackupError};

use super::request::QueryRequest;
use super::types::{QueryResult, ResultRow, Site};

/// Read access to search-analytics data.
///
/// `AnalyticsClient` talks to the real API; tests substitute in-memory
/// sources.
pub trait SearchAnalytics: Send + Sync {
    /// Lists the properties the current credentials can read.
    fn list_verified_sites(&self) -> impl Future<Output = Result<Vec<Site>, BackupError>> + Send;

    /// Runs a query against one property.
    ///
    /// A response without rows is an empty `QueryResult`, not an error.
    fn query(
        &self,
        site: &str,
        request: &QueryRequest,
    ) -> impl Future<Output = Result<QueryResult, BackupError>> + Send;
}

#[derive(Debug, Deserialize)]
struct WireQueryResponse {
    #[serde(default)]
    rows: Option<Vec<WireRow>>,
}

#[derive(Debug, Deserialize)]
struct WireRow {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    ctr: f64,
    #[serde(default)]
    position: f64,
}

impl From<WireRow> for ResultRow {
    fn from(row: WireRow) -> Self {
        ResultRow {
            keys: row.keys,
            clicks: row.clicks.max(0.0).round() as u64,
            impressions: row.impressions.max(0.0).round() as u64,
            ctr: row.ctr.clamp(0.0, 1.0),
            position: row.position.max(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSitesResponse {
    #[serde(default)]
    site_entry: Vec<WireSite>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSite {
    site_url: String,
    #[serde(default)]
    permission_level: String,
}

/// Client for the analytics HTTP API.
///
/// Transient failures (transport errors, 429 and 5xx) are retried with
/// exponential backoff; everything else is classified and returned at once.
#[derive(Clone)]
pub struct AnalyticsClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    max_retries: usize,
}

impl AnalyticsClient {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            max_retries: RETRY_MAX_ATTEMPTS,
        }
    }

    /// Sets how many times a transient failure is retried.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn sites_url(&self) -> String {
        format!("{}/sites", self.base_url)
    }

    fn query_url(&self, site: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(site.as_bytes()).collect();
        format!("{}/sites/{}/searchAnalytics/query", self.base_url, encoded)
    }

    async fn fetch_sites_once(&self) -> Result<Vec<Site>, BackupError> {
        let token = self.tokens.bearer_token()?;
        let response = self
            .http
            .get(self.sites_url())
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if status != 200 {
            // Only credential problems are meaningful on the listing endpoint
            return Err(match classify_status(status, &body) {
                BackupError::Auth(msg) | BackupError::AccessDenied(msg) => BackupError::Auth(msg),
                BackupError::BadRequest(msg) | BackupError::NotFound(msg) => {
                    BackupError::Upstream { status, body: msg }
                }
                other => other,
            });
        }

        let parsed: WireSitesResponse =
            serde_json::from_str(&body).map_err(|e| BackupError::Upstream {
                status,
                body: format!("unreadable site list: {e}"),
            })?;
        Ok(parsed
            .site_entry
            .into_iter()
            .map(|s| Site {
                url: s.site_url,
                permission_level: s.permission_level,
            })
            .collect())
    }

    async fn query_once(
        &self,
        site: &str,
        request: &QueryRequest,
    ) -> Result<QueryResult, BackupError> {
        let token = self.tokens.bearer_token()?;
        let response = self
            .http
            .post(self.query_url(site))
            .bearer_auth(token)
            .json(&request.to_wire())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if status != 200 {
            return Err(classify_status(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(QueryResult::default());
        }

        let parsed: WireQueryResponse =
            serde_json::from_str(&body).map_err(|e| BackupError::Upstream {
                status,
                body: format!("unreadable query response: {e}"),
            })?;
        Ok(QueryResult {
            rows: parsed
                .rows
                .unwrap_or_default()
                .into_iter()
                .map(ResultRow::from)
                .collect(),
        })
    }
}

impl SearchAnalytics for AnalyticsClient {
    async fn list_verified_sites(&self) -> Result<Vec<Site>, BackupError> {
        RetryIf::spawn(
            get_retry_strategy(self.max_retries),
            || self.fetch_sites_once(),
            |e: &BackupError| {
                let retry = is_retriable(e);
                if retry {
                    warn!("Listing sites failed, retrying: {e}");
                }
                retry
            },
        )
        .await
    }

    async fn query(&self, site: &str, request: &QueryRequest) -> Result<QueryResult, BackupError> {
        debug!(
            "Querying {} from {} to {} by [{}] (limit {})",
            site,
            request.start_date,
            request.end_date,
            request
                .dimensions
                .iter()
                .map(|d| d.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            request.row_limit
        );
        let result = RetryIf::spawn(
            get_retry_strategy(self.max_retries),
            || self.query_once(site, request),
            |e: &BackupError| {
                let retry = is_retriable(e);
                if retry {
                    warn!("Query for {site} failed, retrying: {e}");
                }
                retry
            },
        )
        .await?;
        debug!("Query for {} returned {} rows", site, result.len());
        Ok(result)
    }
}
