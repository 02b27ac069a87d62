//! HTTP client initialization.
//!
//! This module provides the HTTP client used to download filter lists.

use std::sync::Arc;
use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::FILTER_FETCH_TIMEOUT_SECS;

/// User-Agent sent when downloading filter lists.
const FILTER_USER_AGENT: &str = concat!("dns_control/", env!("CARGO_PKG_VERSION"));

/// Initializes the HTTP client used for filter list downloads.
///
/// Creates a `reqwest::Client` configured with:
/// - A fixed per-request timeout
/// - Redirect following (reqwest default, up to 10 hops)
/// - Rustls TLS backend (no native TLS)
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_filter_client() -> Result<Arc<reqwest::Client>, reqwest::Error> {
    let client = ClientBuilder::new()
        .timeout(Duration::from_secs(FILTER_FETCH_TIMEOUT_SECS))
        .user_agent(FILTER_USER_AGENT)
        .build()?;
    Ok(Arc::new(client))
}
