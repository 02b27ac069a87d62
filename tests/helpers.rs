// Shared test doubles for the filter fetcher, upstream resolvers and control state.
//
// Each integration test file pulls this in with `mod helpers;`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use dns_control::config::PROBE_EXPECTED_ADDR;
use dns_control::control_server::{ControlSettings, ControlState, FileConfigHooks};
use dns_control::error_handling::FetchError;
use dns_control::filtering::{FilterFetcher, FilterManager};
use dns_control::stats::{MemoryCounterStore, StatsAggregator};
use dns_control::upstream::{AnswerRecord, ResolverFactory, ResolverProber, UpstreamResolver};

/// Builds filter content with a title header and `rules` blocking rules.
#[allow(dead_code)]
pub fn filter_content(title: &str, rules: usize) -> String {
    let mut content = format!("! Title: {title}\n! Homepage: https://example.test/\n\n");
    for i in 0..rules {
        content.push_str(&format!("||ads{i}.example.test^\n"));
    }
    content
}

/// Fetcher answering from a table of URL to body or HTTP status.
#[derive(Default)]
pub struct FakeFetcher {
    bodies: Mutex<HashMap<String, Result<String, u16>>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serves `body` for `url` from now on.
    pub fn serve(&self, url: &str, body: impl Into<String>) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(body.into()));
    }

    /// Fails requests for `url` with `status`.
    pub fn fail(&self, url: &str, status: u16) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(status));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FilterFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.bodies.lock().unwrap().get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Status(*status)),
            None => Err(FetchError::Status(404)),
        }
    }
}

struct FixedAnswers(Result<Vec<AnswerRecord>, String>);

#[async_trait]
impl UpstreamResolver for FixedAnswers {
    async fn query_a(&self, _name: &str) -> Result<Vec<AnswerRecord>, String> {
        self.0.clone()
    }
}

/// Resolver factory for a few well-known fake upstreams:
///
/// - `good`, `tls://good`: answers with the expected address
/// - `lying`: answers with a private address
/// - `empty`: answers with no records
/// - `down`: fails the exchange
///
/// Anything else is rejected as an invalid upstream.
pub struct FakeFactory;

#[async_trait]
impl ResolverFactory for FakeFactory {
    async fn build(
        &self,
        address: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn UpstreamResolver>, String> {
        let answers = match address {
            "good" | "tls://good" => Ok(vec![AnswerRecord::A(PROBE_EXPECTED_ADDR)]),
            "lying" => Ok(vec![AnswerRecord::A("10.0.0.1".parse().unwrap())]),
            "empty" => Ok(vec![]),
            "down" => Err("connection refused".to_string()),
            _ => return Err(format!("unsupported upstream address {address}")),
        };
        Ok(Box::new(FixedAnswers(answers)))
    }
}

/// Control state backed by fakes, persisting to `data_dir/dns_control.json`.
#[allow(dead_code)]
pub fn control_state(
    data_dir: &Path,
    fetcher: Arc<FakeFetcher>,
    store: Arc<MemoryCounterStore>,
) -> ControlState {
    let filters_dir = data_dir.join("filters");
    std::fs::create_dir_all(&filters_dir).unwrap();
    ControlState::new(
        Arc::new(FilterManager::new(filters_dir, fetcher)),
        StatsAggregator::new(store),
        ResolverProber::new(Arc::new(FakeFactory)),
        ControlSettings::default(),
        Arc::new(FileConfigHooks::new(data_dir.join("dns_control.json"))),
    )
}
