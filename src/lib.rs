//! dns_control library: control plane of a local DNS-filtering appliance
//!
//! This library mutates the live state of a running DNS server without
//! dropping service:
//! - TLS certificate and private key validation ([`tls`])
//! - Live restarts of the control listeners ([`listener`])
//! - Block-list subscriptions ([`filtering`])
//! - Top-N and historical traffic statistics ([`stats`])
//! - Upstream resolver health probes ([`upstream`])
//!
//! Everything is exposed over an HTTP control API ([`control_server`]).
//!
//! # Example
//!
//! ```no_run
//! use dns_control::{run_control_plane, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     bind_port: 3000,
//!     data_dir: std::path::PathBuf::from("/var/lib/dns_control"),
//!     ..Default::default()
//! };
//!
//! // Serves until Ctrl+C
//! run_control_plane(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

pub mod config;
pub mod control_server;
pub mod error_handling;
pub mod filtering;
pub mod initialization;
pub mod listener;
pub mod stats;
pub mod tls;
pub mod upstream;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use run::run_control_plane;

// Internal run module (wires the subsystems together and serves until shutdown)
mod run {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use log::{info, warn};
    use tokio_util::sync::CancellationToken;

    use crate::config::{Config, FILTER_REFRESH_CHECK_INTERVAL};
    use crate::control_server::{
        run_control_listener, run_https_listener, ControlSettings, ControlState,
        FileConfigHooks, ReconfigureHooks,
    };
    use crate::filtering::{FilterManager, FilteringStatus, HttpFilterFetcher};
    use crate::initialization::{init_filter_client, init_filters_dir};
    use crate::stats::{MemoryCounterStore, StatsAggregator};
    use crate::tls::validate_certificates;
    use crate::upstream::{HickoryResolverFactory, ResolverProber};

    /// Runs the control plane until Ctrl+C.
    ///
    /// Configuration written by a previous run is reloaded from the data
    /// directory; without one, the command line provides the initial settings.
    /// Upstreams given on the command line always take precedence.
    ///
    /// The logger and the crypto provider must already be initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the data directory
    /// cannot be prepared or the persisted configuration cannot be read.
    pub async fn run_control_plane(config: Config) -> Result<()> {
        config.validate().context("Invalid configuration")?;

        let filters_dir = config.filters_dir();
        init_filters_dir(&filters_dir).context("Failed to prepare the data directory")?;

        let hooks = Arc::new(FileConfigHooks::new(config.config_path()));
        let (mut settings, filtering) = match hooks.load().await? {
            Some(snapshot) => {
                info!("Loaded configuration from {}", hooks.path().display());
                (snapshot.settings, snapshot.filtering)
            }
            None => (ControlSettings::from_config(&config), FilteringStatus::default()),
        };
        if !config.upstream_dns.is_empty() {
            settings.upstream_dns = config.upstream_dns.clone();
        }
        settings.tls_status = validate_certificates(&settings.tls);
        if settings.tls.enabled && !settings.tls_status.usable {
            warn!(
                "TLS is enabled but unusable: {}",
                settings.tls_status.warning_validation
            );
        }

        let client = init_filter_client().context("Failed to initialize HTTP client")?;
        let fetcher = Arc::new(HttpFilterFetcher::new(client));
        let filters = FilterManager::load(filters_dir.clone(), fetcher, filtering.filters).await;
        filters.set_filtering_enabled(filtering.enabled);
        filters.set_user_rules(&filtering.user_rules.join("\n")).await;

        let state = ControlState::new(
            Arc::new(filters),
            StatsAggregator::new(Arc::new(MemoryCounterStore::new())),
            ResolverProber::new(Arc::new(HickoryResolverFactory)),
            settings,
            hooks as Arc<dyn ReconfigureHooks>,
        );

        let cancel = CancellationToken::new();
        let control = tokio::spawn(run_control_listener(state.clone(), cancel.clone()));
        let https = tokio::spawn(run_https_listener(state.clone(), cancel.clone()));
        let refresher = tokio::spawn(refresh_filters_periodically(state, cancel.clone()));

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for the shutdown signal")?;
        info!("Shutdown requested, closing listeners");
        shutdown_gracefully(cancel, vec![control, https, refresher]).await;
        Ok(())
    }

    /// Refreshes stale filter lists in the background.
    async fn refresh_filters_periodically(state: ControlState, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(FILTER_REFRESH_CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            let updated = state.filters.refresh(false).await;
            if updated == 0 {
                continue;
            }
            info!("Periodic refresh updated {updated} filters");
            // Same serialized path as the API handlers
            if let Err(e) = state.save_and_reload().await {
                warn!("{e}");
            }
        }
    }

    /// Signals every background task to stop and waits for them.
    async fn shutdown_gracefully(cancel: CancellationToken, tasks: Vec<tokio::task::JoinHandle<()>>) {
        cancel.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Background task failed during shutdown: {e}");
            }
        }
    }
}
