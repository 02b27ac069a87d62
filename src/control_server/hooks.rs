//! Side effects run after a successful configuration change.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempfile::NamedTempFile;

use super::types::ConfigSnapshot;

/// Collaborators notified after the control API changed the configuration.
///
/// Settings changes become current only after `write_config` succeeded;
/// filter list changes are already applied by the manager. `reload_filtering`
/// runs after a successful write. A failure of either is reported to the API
/// caller as a server error.
#[async_trait]
pub trait ReconfigureHooks: Send + Sync {
    /// Persists the configuration.
    async fn write_config(&self, snapshot: &ConfigSnapshot) -> Result<()>;

    /// Tells the DNS filtering engine to reload its settings and lists.
    async fn reload_filtering(&self, snapshot: &ConfigSnapshot) -> Result<()>;
}

/// Writes the configuration as JSON and logs reload requests.
///
/// The file is replaced atomically, so a crash never leaves a truncated
/// configuration behind.
pub struct FileConfigHooks {
    path: PathBuf,
}

impl FileConfigHooks {
    /// Hooks persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the configuration written by a previous run, if any.
    pub async fn load(&self) -> Result<Option<ConfigSnapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(snapshot))
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ReconfigureHooks for FileConfigHooks {
    async fn write_config(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot).context("Failed to serialize config")?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .context("Config writer task failed")?
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        log::debug!("Configuration written to {}", self.path.display());
        Ok(())
    }

    async fn reload_filtering(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        let filtering = &snapshot.filtering;
        log::info!(
            "Filtering reload requested: protection {}, filtering {}, {} of {} lists enabled, {} user rules",
            if snapshot.settings.protection_enabled { "on" } else { "off" },
            if filtering.enabled { "on" } else { "off" },
            filtering.filters.iter().filter(|f| f.enabled).count(),
            filtering.filters.len(),
            filtering.user_rules.len()
        );
        Ok(())
    }
}
