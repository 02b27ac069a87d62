//! Error type definitions.
//!
//! This module defines the error types of every control-plane subsystem. The
//! `Display` strings are the operator-facing messages returned by the control API.

use std::io;
use std::net::Ipv4Addr;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// Error preparing the filter content directory.
    #[error("Filter storage initialization error: {0}")]
    StorageError(#[from] io::Error),
}

/// Errors raised while downloading filter list content.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, timeout, body read).
    #[error("{0}")]
    Http(#[from] ReqwestError),

    /// The server answered with a non-success status code.
    #[error("server responded with status {0}")]
    Status(u16),

    /// The body is an HTML page rather than a list of rules.
    #[error("content looks like an HTML page, not a filter list")]
    NotAFilter,

    /// The body exceeds the maximum accepted filter size.
    #[error("content exceeds {limit} bytes")]
    TooLarge {
        /// Maximum accepted size in bytes
        limit: usize,
    },
}

impl FetchError {
    /// Returns `true` for failures that may succeed on another attempt.
    ///
    /// Timeouts, connection failures, 429 and 5xx responses are retriable.
    /// Other client errors and content problems are permanent.
    pub fn is_retriable(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::Status(code) => {
                *code == crate::config::HTTP_STATUS_TOO_MANY_REQUESTS || (500..600).contains(code)
            }
            FetchError::NotAFilter | FetchError::TooLarge { .. } => false,
        }
    }
}

/// Errors returned by the filter list manager.
///
/// Validation variants leave the managed collection untouched; I/O variants
/// are raised before the in-memory collection is updated.
#[derive(Error, Debug)]
pub enum FilterError {
    /// The request did not carry a URL.
    #[error("URL parameter was not specified")]
    MissingUrl,

    /// The URL is not an absolute http(s) URL.
    #[error("URL parameter is not valid request URL: {0}")]
    InvalidUrl(String),

    /// A list with the same URL is already managed.
    #[error("Filter URL already added -- {0}")]
    Duplicate(String),

    /// No managed list has this URL.
    #[error("URL parameter was not previously added: {0}")]
    UnknownUrl(String),

    /// Downloading the list failed.
    #[error("Couldn't fetch filter from url {url}: {source}")]
    Fetch {
        /// URL of the list
        url: String,
        /// Underlying download failure
        #[source]
        source: FetchError,
    },

    /// The downloaded content contains no rules.
    #[error("Filter at the url {0} has no rules (maybe it points to blank page?)")]
    NoRules(String),

    /// Persisting the content to disk failed.
    #[error("Failed to save filter {id} due to {source}")]
    Save {
        /// ID of the list being saved
        id: i64,
        /// Underlying filesystem failure
        #[source]
        source: io::Error,
    },

    /// Removing persisted content failed for a reason other than absence.
    #[error("Couldn't remove the filter file: {0}")]
    Remove(#[source] io::Error),
}

impl FilterError {
    /// Returns `true` when the error was caused by the request itself rather
    /// than by the network or the filesystem.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FilterError::MissingUrl
                | FilterError::InvalidUrl(_)
                | FilterError::Duplicate(_)
                | FilterError::UnknownUrl(_)
                | FilterError::NoRules(_)
        )
    }
}

/// Errors returned when a statistics history request is malformed.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The time unit is not one of seconds, minutes, hours, days.
    #[error("Must specify valid time_unit parameter, got {0:?}")]
    InvalidTimeUnit(String),

    /// A boundary is not an RFC 3339 timestamp.
    #[error("Must specify valid {field} parameter: {source}")]
    InvalidTimestamp {
        /// Name of the query parameter
        field: &'static str,
        /// Parse failure
        #[source]
        source: chrono::ParseError,
    },

    /// The window ends before it starts.
    #[error("Cannot get stats history: start_time is after end_time")]
    StartAfterEnd,

    /// The range would produce more windows than are served at once.
    #[error("Cannot get stats history: {windows} windows requested, at most {limit} allowed")]
    TooManyWindows {
        /// Number of windows the range covers
        windows: u64,
        /// Maximum number of windows
        limit: u64,
    },
}

/// Reasons an upstream resolver failed its probe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The upstream specification could not be turned into a resolver.
    #[error("failed to choose upstream for {address}: {reason}")]
    InvalidUpstream {
        /// Upstream as given by the operator
        address: String,
        /// Why it was rejected
        reason: String,
    },

    /// The query could not be exchanged with the upstream.
    #[error("couldn't communicate with DNS server {address}: {reason}")]
    Exchange {
        /// Upstream as given by the operator
        address: String,
        /// Transport or protocol failure
        reason: String,
    },

    /// The reply did not carry exactly one answer record.
    #[error("DNS server {address} returned wrong answer")]
    WrongAnswerCount {
        /// Upstream as given by the operator
        address: String,
        /// Number of answer records received
        count: usize,
    },

    /// The single `A` answer is not the expected address.
    #[error("DNS server {address} returned wrong answer: {got}")]
    WrongAddress {
        /// Upstream as given by the operator
        address: String,
        /// Address that was returned
        got: Ipv4Addr,
    },

    /// The request named no upstreams to test.
    #[error("No servers specified")]
    NoServers,
}

/// Errors decoding a TLS configuration payload from the wire.
#[derive(Error, Debug)]
pub enum TlsPayloadError {
    /// The body is not the expected JSON document.
    #[error("Failed to parse new TLS config json: {0}")]
    Json(#[from] serde_json::Error),

    /// A PEM field is not valid base64.
    #[error("Failed to base64-decode {field}: {source}")]
    Base64 {
        /// Name of the field
        field: &'static str,
        /// Decode failure
        #[source]
        source: base64::DecodeError,
    },

    /// A decoded PEM field is not UTF-8 text.
    #[error("{field} is not valid UTF-8 text")]
    Utf8 {
        /// Name of the field
        field: &'static str,
    },
}

/// Errors raised by network listeners.
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The address could not be bound.
    #[error("Impossible to listen on {addr} due to {source}")]
    Bind {
        /// Host and port that were requested
        addr: String,
        /// Bind failure
        #[source]
        source: io::Error,
    },

    /// The TLS material could not be turned into a server configuration.
    #[error("Invalid TLS configuration: {0}")]
    Tls(String),

    /// The serving task ended with an error or panicked.
    #[error("Listener task failed: {0}")]
    Serve(String),
}

/// Errors raised while persisting or applying a configuration change.
#[derive(Error, Debug)]
pub enum ReconfigureError {
    /// The configuration could not be written; nothing was committed.
    #[error("Couldn't write config file: {0:#}")]
    Write(anyhow::Error),

    /// The configuration was written but the DNS server did not reload it.
    #[error("Couldn't reconfigure the DNS server: {0:#}")]
    Reload(anyhow::Error),
}
