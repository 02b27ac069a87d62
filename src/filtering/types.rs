//! Filter list data types.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A block-list subscription.
///
/// The URL is unique across the lists held by a manager. Content lives at
/// `<filters dir>/<id>.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterList {
    /// Stable numeric identity
    pub id: i64,
    /// Source URL
    pub url: String,
    /// Whether the list feeds the filtering engine
    pub enabled: bool,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Number of rules in the stored content
    #[serde(default)]
    pub rules_count: usize,
    /// Time of the last successful fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) checksum: Option<String>,
}

impl FilterList {
    /// Creates an enabled list that has not been fetched yet.
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            enabled: true,
            name: String::new(),
            rules_count: 0,
            last_updated: None,
            checksum: None,
        }
    }

    /// Path of the stored content inside `dir`.
    pub fn content_path(&self, dir: &Path) -> PathBuf {
        content_path(dir, self.id)
    }
}

pub(crate) fn content_path(dir: &Path, id: i64) -> PathBuf {
    dir.join(format!("{id}.txt"))
}

/// Snapshot of the filtering configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilteringStatus {
    /// Global filtering switch
    pub enabled: bool,
    /// Managed lists, in insertion order
    pub filters: Vec<FilterList>,
    /// Operator-written rules
    pub user_rules: Vec<String>,
}

impl Default for FilteringStatus {
    fn default() -> Self {
        Self {
            enabled: true,
            filters: Vec::new(),
            user_rules: Vec::new(),
        }
    }
}
