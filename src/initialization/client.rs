//! HTTP client initialization.

use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::{Config, DEFAULT_USER_AGENT};

/// Initializes the HTTP client shared by the analytics client and notifier.
///
/// Creates a `reqwest::Client` configured with the crate's User-Agent and the
/// per-request timeout from the configuration.
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(DEFAULT_USER_AGENT)
        .build()
}
