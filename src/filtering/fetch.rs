//! Filter content download.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

use crate::config::{
    MAX_FILTER_SIZE, RETRY_FACTOR, RETRY_INITIAL_DELAY_MS, RETRY_MAX_ATTEMPTS,
    RETRY_MAX_DELAY_SECS,
};
use crate::error_handling::FetchError;

/// Downloads filter list content.
#[async_trait]
pub trait FilterFetcher: Send + Sync {
    /// Returns the body found at `url`.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Creates the exponential backoff used between download attempts.
///
/// Delays start at `RETRY_INITIAL_DELAY_MS`, grow by `RETRY_FACTOR`, are
/// capped at `RETRY_MAX_DELAY_SECS` and limited to `RETRY_MAX_ATTEMPTS` retries.
pub fn get_retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(RETRY_INITIAL_DELAY_MS)
        .factor(RETRY_FACTOR)
        .max_delay(Duration::from_secs(RETRY_MAX_DELAY_SECS))
        .take(RETRY_MAX_ATTEMPTS)
}

/// [`FilterFetcher`] over HTTP(S) with `reqwest`.
///
/// Transient failures (timeouts, connection errors, 429 and 5xx) are retried
/// with [`get_retry_strategy`].
pub struct HttpFilterFetcher {
    client: Arc<reqwest::Client>,
}

impl HttpFilterFetcher {
    /// Wraps a client built by [`crate::initialization::init_filter_client`].
    pub fn new(client: Arc<reqwest::Client>) -> Self {
        Self { client }
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_FILTER_SIZE as u64)
        {
            return Err(FetchError::TooLarge {
                limit: MAX_FILTER_SIZE,
            });
        }

        let body = response.bytes().await?;
        if body.len() > MAX_FILTER_SIZE {
            return Err(FetchError::TooLarge {
                limit: MAX_FILTER_SIZE,
            });
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl FilterFetcher for HttpFilterFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let result = RetryIf::start(
            get_retry_strategy(),
            || self.fetch_once(url),
            |e: &FetchError| {
                let retry = e.is_retriable();
                if retry {
                    log::debug!("Retrying download of {url}: {e}");
                }
                retry
            },
        )
        .await;

        if let Err(e) = &result {
            log::warn!("Failed to download filter from {url}: {e}");
        }
        result
    }
}
