//! Run notifications: message templates and delivery.
//!
//! Messages are plain-text emails. `WebhookNotifier` hands them to a mail
//! relay as JSON; `LogNotifier` only logs them.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use serde::Serialize;

use crate::analytics::{Dimension, SearchType};
use crate::error_handling::{truncate_message, BackupError};
use crate::storage::BackupType;

/// An outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Recipient address; the relay's default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

/// Delivers notifications.
pub trait Notifier: Send + Sync {
    /// Sends one message.
    fn send(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), BackupError>> + Send;
}

/// Posts `{to, subject, body}` to a mail relay endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: url::Url,
}

impl WebhookNotifier {
    /// Creates a notifier for the relay at `url`.
    pub fn new(http: reqwest::Client, url: url::Url) -> Self {
        Self { http, url }
    }
}

impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), BackupError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(notification)
            .send()
            .await
            .map_err(|e| BackupError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackupError::Notification(format!(
                "relay answered HTTP {}: {}",
                status.as_u16(),
                truncate_message(body.trim())
            )));
        }
        debug!("Notification '{}' accepted by relay", notification.subject);
        Ok(())
    }
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), BackupError> {
        info!(
            "Notification (no relay configured): {}\n{}",
            notification.subject, notification.body
        );
        Ok(())
    }
}

/// Notifier chosen at startup.
#[derive(Debug, Clone)]
pub enum NotifierImpl {
    /// Mail relay
    Webhook(WebhookNotifier),
    /// Log only
    Log(LogNotifier),
}

impl Notifier for NotifierImpl {
    async fn send(&self, notification: &Notification) -> Result<(), BackupError> {
        match self {
            NotifierImpl::Webhook(n) => n.send(notification).await,
            NotifierImpl::Log(n) => n.send(notification).await,
        }
    }
}

/// Everything the success message reports.
#[derive(Debug, Clone)]
pub struct SuccessDetails<'a> {
    /// Property URL
    pub website: &'a str,
    /// Daily or monthly
    pub backup_type: BackupType,
    /// First day backed up
    pub start_date: NaiveDate,
    /// Last day backed up
    pub end_date: NaiveDate,
    /// Grouping dimensions
    pub dimensions: &'a [Dimension],
    /// Search surface
    pub search_type: SearchType,
    /// Whether the ungrouped sheet was requested
    pub separate_ungrouped: bool,
    /// Link to the backup workbook
    pub link: &'a str,
    /// Writer result message
    pub result: &'a str,
}

fn title_case(backup_type: BackupType) -> &'static str {
    match backup_type {
        BackupType::Daily => "Daily",
        BackupType::Monthly => "Monthly",
    }
}

/// Message sent after a successful scheduled backup.
pub fn success_notification(to: Option<String>, details: &SuccessDetails<'_>) -> Notification {
    let dimensions: Vec<&str> = details.dimensions.iter().map(Dimension::as_str).collect();
    let body = format!(
        "Your scheduled Search Console backup has completed successfully.\n\n\
         Website: {}\n\
         Backup Type: {}\n\
         Date Range: {} to {}\n\
         Dimensions: {}\n\
         Search Type: {}\n\
         Separate Ungrouped Sheet: {}\n\
         Spreadsheet: {}\n\n\
         Import Result: {}\n",
        details.website,
        title_case(details.backup_type),
        details.start_date,
        details.end_date,
        dimensions.join(", "),
        details.search_type,
        if details.separate_ungrouped { "Yes" } else { "No" },
        details.link,
        details.result,
    );
    Notification {
        to,
        subject: format!("Search Console Backup Completed - {}", details.website),
        body,
    }
}

/// Message sent when a scheduled backup fails.
pub fn failure_notification(
    to: Option<String>,
    website: &str,
    backup_type: BackupType,
    error: &str,
    at: DateTime<Utc>,
) -> Notification {
    let body = format!(
        "Your scheduled Search Console backup has failed.\n\n\
         Website: {}\n\
         Backup Type: {}\n\
         Error: {}\n\
         Time: {}\n\n\
         Check the backup configuration and run it again with run-schedule-now.\n",
        website,
        title_case(backup_type),
        error,
        at.format("%Y-%m-%d %H:%M:%S UTC"),
    );
    Notification {
        to,
        subject: format!("Search Console Backup Failed - {website}"),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_success_template() {
        let details = SuccessDetails {
            website: "https://example.com/",
            backup_type: BackupType::Monthly,
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
            dimensions: &[Dimension::Query, Dimension::Device],
            search_type: SearchType::Image,
            separate_ungrouped: true,
            link: "file:///backups/report",
            result: "Successfully imported 12 rows",
        };
        let n = success_notification(Some("me@example.com".into()), &details);
        assert_eq!(n.subject, "Search Console Backup Completed - https://example.com/");
        assert!(n.body.contains("Backup Type: Monthly"));
        assert!(n.body.contains("Date Range: 2024-05-01 to 2024-05-31"));
        assert!(n.body.contains("Dimensions: query, device"));
        assert!(n.body.contains("Search Type: image"));
        assert!(n.body.contains("Separate Ungrouped Sheet: Yes"));
        assert!(n.body.contains("Spreadsheet: file:///backups/report"));
        assert!(n.body.contains("Import Result: Successfully imported 12 rows"));
    }

    #[test]
    fn test_failure_template() {
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 2, 0, 5).unwrap();
        let n = failure_notification(None, "sc-domain:example.com", BackupType::Daily, "boom", at);
        assert_eq!(n.subject, "Search Console Backup Failed - sc-domain:example.com");
        assert!(n.body.contains("Error: boom"));
        assert!(n.body.contains("Time: 2024-06-03 02:00:05 UTC"));
        assert!(n.body.contains("Backup Type: Daily"));
    }

    #[test]
    fn test_recipient_omitted_when_absent() {
        let n = Notification {
            to: None,
            subject: "s".into(),
            body: "b".into(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("to").is_none());
        assert_eq!(json["subject"], "s");
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let n = Notification {
            to: None,
            subject: "s".into(),
            body: "b".into(),
        };
        assert!(NotifierImpl::Log(LogNotifier).send(&n).await.is_ok());
    }
}
