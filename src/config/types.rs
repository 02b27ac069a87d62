//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::constants::{CONFIG_FILE_NAME, DEFAULT_BIND_PORT, DNS_PORT, FILTERS_DIR_NAME};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Control plane configuration.
///
/// Parsed from the command line by the binary, or constructed programmatically
/// (every field has a default).
///
/// # Examples
///
/// ```bash
/// # Serve the control API on all interfaces, port 3000
/// dns_control --bind-host 0.0.0.0 --bind-port 3000
///
/// # Keep filter lists under /var/lib/dns_control and probe two upstreams by default
/// dns_control --data-dir /var/lib/dns_control --upstream-dns tls://1.1.1.1 --upstream-dns 8.8.8.8
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dns_control",
    about = "Control plane for a local DNS-filtering appliance."
)]
pub struct Config {
    /// Address the control API binds to
    #[arg(long, default_value = "127.0.0.1")]
    pub bind_host: String,

    /// Port the control API binds to
    #[arg(long, default_value_t = DEFAULT_BIND_PORT)]
    pub bind_port: u16,

    /// Directory holding persisted filter list content
    #[arg(long, value_parser, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Address the DNS server listens on (reported by the status endpoint)
    #[arg(long, default_value = "0.0.0.0")]
    pub dns_address: String,

    /// Port the DNS server listens on (reported by the status endpoint)
    #[arg(long, default_value_t = DNS_PORT)]
    pub dns_port: u16,

    /// Upstream DNS servers (repeatable); defaults are used when empty
    #[arg(long = "upstream-dns")]
    pub upstream_dns: Vec<String>,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: DEFAULT_BIND_PORT,
            data_dir: PathBuf::from("./data"),
            dns_address: "0.0.0.0".to_string(),
            dns_port: DNS_PORT,
            upstream_dns: Vec::new(),
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}

/// A configuration field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Name of the offending field
    pub field: &'static str,
    /// What is wrong with it and what is expected instead
    pub message: String,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

impl Config {
    /// Checks the configuration for values the control plane cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first field that failed validation.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.bind_port == 0 {
            return Err(ConfigValidationError {
                field: "bind_port",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.bind_host.trim().is_empty() {
            return Err(ConfigValidationError {
                field: "bind_host",
                message: "must not be empty (use 0.0.0.0 to listen on all interfaces)"
                    .to_string(),
            });
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError {
                field: "data_dir",
                message: "must not be empty".to_string(),
            });
        }
        if self.dns_port == 0 {
            return Err(ConfigValidationError {
                field: "dns_port",
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Directory where filter list content is persisted.
    pub fn filters_dir(&self) -> PathBuf {
        self.data_dir.join(FILTERS_DIR_NAME)
    }

    /// File where the configuration changed through the control API is persisted.
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE_NAME)
    }
}
