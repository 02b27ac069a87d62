//! Control server data structures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use super::hooks::ReconfigureHooks;
use crate::config::{Config, DEFAULT_BIND_PORT, DNS_PORT};
use crate::error_handling::ReconfigureError;
use crate::filtering::{FilterManager, FilteringStatus};
use crate::listener::{ListenerCoordinator, ListenerKind};
use crate::stats::StatsAggregator;
use crate::tls::{CertificateStatus, TlsSettings};
use crate::upstream::{effective_upstreams, ResolverProber};

/// Settings changed through the control API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Address of the plain control listener
    pub bind_host: String,
    /// Port of the plain control listener
    pub bind_port: u16,
    /// Address the DNS server listens on
    pub dns_address: String,
    /// Port the DNS server listens on
    pub dns_port: u16,
    /// Whether the DNS server filters at all
    pub protection_enabled: bool,
    /// Upstream resolvers
    pub upstream_dns: Vec<String>,
    /// Active TLS settings
    pub tls: TlsSettings,
    /// Report for `tls`, recomputed on load
    #[serde(skip)]
    pub tls_status: CertificateStatus,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: DEFAULT_BIND_PORT,
            dns_address: "0.0.0.0".to_string(),
            dns_port: DNS_PORT,
            protection_enabled: true,
            upstream_dns: effective_upstreams(&[]),
            tls: TlsSettings::default(),
            tls_status: CertificateStatus::default(),
        }
    }
}

impl ControlSettings {
    /// Initial settings taken from the command line.
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_host: config.bind_host.clone(),
            bind_port: config.bind_port,
            dns_address: config.dns_address.clone(),
            dns_port: config.dns_port,
            upstream_dns: effective_upstreams(&config.upstream_dns),
            ..Default::default()
        }
    }
}

/// Everything the persistence hook writes and the binary reloads at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    /// Control settings
    pub settings: ControlSettings,
    /// Filter lists, user rules and the filtering switch
    pub filtering: FilteringStatus,
}

/// Shared state of the control API.
#[derive(Clone)]
pub struct ControlState {
    /// Filter list manager
    pub filters: Arc<FilterManager>,
    /// Statistics views
    pub stats: StatsAggregator,
    /// Upstream prober
    pub prober: ResolverProber,
    /// Current settings
    pub settings: Arc<RwLock<ControlSettings>>,
    /// Persistence and reload hooks
    pub hooks: Arc<dyn ReconfigureHooks>,
    /// Restart coordinator of the plain control listener
    pub control_listener: ListenerCoordinator,
    /// Restart coordinator of the HTTPS listener
    pub https_listener: ListenerCoordinator,
    /// Serializes configuration writes
    pub(crate) write_lock: Arc<Mutex<()>>,
}

impl ControlState {
    /// Builds the state and spawns the listener coordinators.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(
        filters: Arc<FilterManager>,
        stats: StatsAggregator,
        prober: ResolverProber,
        settings: ControlSettings,
        hooks: Arc<dyn ReconfigureHooks>,
    ) -> Self {
        Self {
            filters,
            stats,
            prober,
            settings: Arc::new(RwLock::new(settings)),
            hooks,
            control_listener: ListenerCoordinator::spawn(ListenerKind::Control),
            https_listener: ListenerCoordinator::spawn(ListenerKind::Https),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Point-in-time copy of the whole configuration.
    pub async fn snapshot(&self) -> ConfigSnapshot {
        let settings = self.settings.read().await.clone();
        ConfigSnapshot {
            settings,
            filtering: self.filters.status().await,
        }
    }

    /// Persists the settings produced by `update` and only then makes them current.
    ///
    /// `update` runs on a copy of the current settings. When the write fails
    /// the current settings are left untouched, so retrying the same change
    /// is seen as a change again. Returns what `update` returned.
    pub async fn save_settings<T>(
        &self,
        update: impl FnOnce(&mut ControlSettings) -> T,
    ) -> Result<T, ReconfigureError> {
        let _guard = self.write_lock.lock().await;
        let mut candidate = self.settings.read().await.clone();
        let result = update(&mut candidate);
        let snapshot = ConfigSnapshot {
            settings: candidate,
            filtering: self.filters.status().await,
        };
        self.hooks
            .write_config(&snapshot)
            .await
            .map_err(ReconfigureError::Write)?;
        *self.settings.write().await = snapshot.settings;
        Ok(result)
    }

    /// Asks the filtering engine to reload the current configuration.
    pub async fn reload(&self) -> Result<(), ReconfigureError> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot().await;
        self.hooks
            .reload_filtering(&snapshot)
            .await
            .map_err(ReconfigureError::Reload)
    }

    /// Persists the current configuration, then reloads it.
    ///
    /// Used after filter list changes, which the manager has already applied.
    pub async fn save_and_reload(&self) -> Result<(), ReconfigureError> {
        self.save_settings(|_| ()).await?;
        self.reload().await
    }
}

/// JSON response for `/control/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Address the DNS server listens on
    pub dns_address: String,
    /// Port of the plain control listener
    pub http_port: u16,
    /// Port the DNS server listens on
    pub dns_port: u16,
    /// Whether the DNS server filters at all
    pub protection_enabled: bool,
    /// Upstream resolvers in use
    pub upstream_dns: Vec<String>,
    /// Whether the HTTPS listener is serving
    pub https_running: bool,
    /// Crate version
    pub version: &'static str,
}

/// Body of `/control/filtering/add_url`.
#[derive(Debug, Deserialize)]
pub struct AddUrlRequest {
    /// List URL
    #[serde(default)]
    pub url: String,
    /// Display name overriding the list title
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `/control/http/configure`.
#[derive(Debug, Deserialize)]
pub struct HttpSettingsRequest {
    /// New bind address
    pub ip: String,
    /// New bind port
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            bind_port: 8080,
            upstream_dns: vec!["9.9.9.9".to_string()],
            ..Default::default()
        };
        let settings = ControlSettings::from_config(&config);
        assert_eq!(settings.bind_port, 8080);
        assert_eq!(settings.upstream_dns, vec!["9.9.9.9"]);
        assert!(settings.protection_enabled);

        let defaults = ControlSettings::from_config(&Config::default());
        assert_eq!(defaults.upstream_dns.len(), crate::config::DEFAULT_UPSTREAM_DNS.len());
    }

    #[test]
    fn test_snapshot_skips_derived_tls_status() {
        let mut snapshot = ConfigSnapshot::default();
        snapshot.settings.tls_status.usable = true;
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("usable"));

        let back: ConfigSnapshot = serde_json::from_str(&json).unwrap();
        assert!(!back.settings.tls_status.usable);
        assert_eq!(back.settings.bind_port, snapshot.settings.bind_port);
    }
}
