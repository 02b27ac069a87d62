//! Configuration constants.
//!
//! This module defines the fixed operational values used by the control plane:
//! refresh periods, ranking limits, probe targets and network timeouts.

use std::net::Ipv4Addr;
use std::time::Duration;

// Filter lists
/// Minimum interval between two fetches of the same filter list.
///
/// A non-forced refresh skips lists fetched more recently than this.
pub const FILTER_REFRESH_PERIOD: Duration = Duration::from_secs(30 * 60);
/// Timeout for a single filter list download.
pub const FILTER_FETCH_TIMEOUT_SECS: u64 = 30;
/// Maximum filter list size in bytes (64MB).
/// Larger downloads are rejected instead of being written to disk.
pub const MAX_FILTER_SIZE: usize = 64 * 1024 * 1024;
/// Subdirectory of the data directory holding filter list content.
pub const FILTERS_DIR_NAME: &str = "filters";
/// How often the background task looks for stale filter lists.
pub const FILTER_REFRESH_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// File in the data directory holding the persisted control-plane configuration.
pub const CONFIG_FILE_NAME: &str = "dns_control.json";

// Retry strategy for filter downloads
/// Initial delay in milliseconds before first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 15;
/// Maximum number of attempts (initial attempt + 2 retries)
pub const RETRY_MAX_ATTEMPTS: usize = 3;

// Statistics
/// Top-N rankings never return more entries than this.
pub const TOP_N_LIMIT: usize = 50;
/// Length of the window covered by aggregated statistics.
pub const STATS_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
/// Human readable label of [`STATS_PERIOD`] reported by the API.
pub const STATS_PERIOD_LABEL: &str = "24 hours";
/// Maximum number of windows a history query may return.
pub const MAX_HISTORY_WINDOWS: u64 = 100_000;
/// Maximum number of queries kept by the in-memory counter store.
pub const MAX_RECORDED_QUERIES: usize = 500_000;

// Upstream probing
/// Hostname queried when checking whether an upstream resolver works.
pub const PROBE_HOSTNAME: &str = "google-public-dns-a.google.com.";
/// The only acceptable `A` answer for [`PROBE_HOSTNAME`].
pub const PROBE_EXPECTED_ADDR: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);
/// Per-query timeout for a probe in seconds
pub const PROBE_TIMEOUT_SECS: u64 = 10;
/// Default port for plain DNS upstreams
pub const DNS_PORT: u16 = 53;
/// Default port for DNS-over-TLS upstreams
pub const DNS_OVER_TLS_PORT: u16 = 853;
/// Default port for DNS-over-HTTPS upstreams
pub const DNS_OVER_HTTPS_PORT: u16 = 443;

// Listeners
/// TLS handshake timeout in seconds
pub const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 5;
/// Default bind port of the control API
pub const DEFAULT_BIND_PORT: u16 = 3000;
/// Default HTTPS port proposed when TLS is first configured
pub const DEFAULT_HTTPS_PORT: u16 = 443;
/// Default DNS-over-TLS port proposed when TLS is first configured
pub const DEFAULT_DNS_OVER_TLS_PORT: u16 = 853;

/// Upstream resolvers used when none are configured.
pub const DEFAULT_UPSTREAM_DNS: &[&str] = &["tls://1.1.1.1", "tls://1.0.0.1"];

// HTTP status codes (for clarity and consistency)
/// Too Many Requests, retried with backoff
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
