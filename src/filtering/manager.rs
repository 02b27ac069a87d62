//! Filter list lifecycle.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::fetch::FilterFetcher;
use super::parse::{looks_like_html, parse_filter, ParsedFilter};
use super::types::{content_path, FilterList, FilteringStatus};
use crate::config::FILTER_REFRESH_PERIOD;
use crate::error_handling::{FetchError, FilterError};

/// Validates a filter URL: absolute, `http` or `https`, with a host.
///
/// Returns the trimmed URL as given; lists are matched on this exact string.
pub fn validate_filter_url(url: &str) -> Result<String, FilterError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(FilterError::MissingUrl);
    }
    let parsed = Url::parse(url).map_err(|_| FilterError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some_and(|h| !h.is_empty()) => Ok(url.to_string()),
        _ => Err(FilterError::InvalidUrl(url.to_string())),
    }
}

/// Writes `content` to `<dir>/<id>.txt` atomically.
///
/// The content goes to a temporary file in `dir` first and is renamed over
/// the target, so a failure never leaves a partial file behind.
async fn persist_content(dir: &Path, id: i64, content: &str) -> io::Result<PathBuf> {
    let dir = dir.to_path_buf();
    let content = content.to_owned();
    tokio::task::spawn_blocking(move || {
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        let path = content_path(&dir, id);
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    })
    .await
    .map_err(io::Error::other)?
}

/// Owns the filter list subscriptions and their content on disk.
///
/// Mutations (add, remove, enable, disable, refresh) are serialized by one
/// exclusive section that is held across downloads. The collection itself is
/// replaced only once a mutation has fully succeeded, so readers always see a
/// consistent snapshot.
///
/// The manager does not persist configuration or reload the filtering engine;
/// callers do that after a successful mutation.
pub struct FilterManager {
    dir: PathBuf,
    fetcher: Arc<dyn FilterFetcher>,
    refresh_period: Duration,
    mutation: Mutex<()>,
    lists: RwLock<Vec<FilterList>>,
    next_id: AtomicI64,
    filtering_enabled: AtomicBool,
    user_rules: RwLock<Vec<String>>,
}

impl FilterManager {
    /// Creates an empty manager storing content in `dir`.
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<dyn FilterFetcher>) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            refresh_period: FILTER_REFRESH_PERIOD,
            mutation: Mutex::new(()),
            lists: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            filtering_enabled: AtomicBool::new(true),
            user_rules: RwLock::new(Vec::new()),
        }
    }

    /// Creates a manager for previously configured lists.
    ///
    /// Rule counts, titles and checksums are recomputed from the stored
    /// content. A list whose content file is missing keeps a zero rule count
    /// and is fetched on the next refresh.
    pub async fn load(
        dir: impl Into<PathBuf>,
        fetcher: Arc<dyn FilterFetcher>,
        lists: Vec<FilterList>,
    ) -> Self {
        let manager = Self::new(dir, fetcher);
        let mut loaded = Vec::with_capacity(lists.len());

        for mut list in lists {
            let path = list.content_path(&manager.dir);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    apply_parsed(&mut list, parse_filter(&content));
                    log::debug!(
                        "Loaded filter {} ({} rules) from {}",
                        list.id,
                        list.rules_count,
                        path.display()
                    );
                }
                Err(e) => {
                    log::warn!("Couldn't load filter {} from {}: {e}", list.id, path.display());
                    list.rules_count = 0;
                    list.last_updated = None;
                }
            }
            loaded.push(list);
        }

        let next_id = loaded.iter().map(|l| l.id).max().unwrap_or(0) + 1;
        manager.next_id.store(next_id, Ordering::SeqCst);
        *manager.lists.write().await = loaded;
        manager
    }

    /// Overrides the minimum interval between two fetches of a list.
    pub fn with_refresh_period(mut self, period: Duration) -> Self {
        self.refresh_period = period;
        self
    }

    /// Directory holding the list content.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot of the managed lists.
    pub async fn lists(&self) -> Vec<FilterList> {
        self.lists.read().await.clone()
    }

    /// Snapshot of the whole filtering configuration.
    pub async fn status(&self) -> FilteringStatus {
        FilteringStatus {
            enabled: self.filtering_enabled(),
            filters: self.lists().await,
            user_rules: self.user_rules.read().await.clone(),
        }
    }

    /// Global filtering switch.
    pub fn filtering_enabled(&self) -> bool {
        self.filtering_enabled.load(Ordering::SeqCst)
    }

    /// Turns filtering on or off as a whole.
    pub fn set_filtering_enabled(&self, enabled: bool) {
        self.filtering_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Replaces the operator-written rules, one rule per line.
    pub async fn set_user_rules(&self, text: &str) {
        let rules = text.split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect();
        *self.user_rules.write().await = rules;
    }

    /// Operator-written rules.
    pub async fn user_rules(&self) -> Vec<String> {
        self.user_rules.read().await.clone()
    }

    /// Subscribes to a new list.
    ///
    /// The content is downloaded and persisted before the list is added; any
    /// failure leaves the collection untouched. `name` overrides the title
    /// found in the content.
    pub async fn add(&self, url: &str, name: Option<&str>) -> Result<FilterList, FilterError> {
        let url = validate_filter_url(url)?;
        let _guard = self.mutation.lock().await;

        if self.lists.read().await.iter().any(|l| l.url == url) {
            return Err(FilterError::Duplicate(url));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut list = FilterList::new(id, url.clone());

        let content = self.fetch_content(&url).await?;
        let parsed = parse_filter(&content);
        if parsed.rules_count == 0 {
            return Err(FilterError::NoRules(url));
        }
        persist_content(&self.dir, id, &content)
            .await
            .map_err(|source| FilterError::Save { id, source })?;

        apply_parsed(&mut list, parsed);
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            list.name = name.to_string();
        }
        list.last_updated = Some(Utc::now());

        self.lists.write().await.push(list.clone());
        log::info!("Added filter {} from {} ({} rules)", list.id, url, list.rules_count);
        Ok(list)
    }

    /// Unsubscribes from every list with this URL and deletes their content.
    ///
    /// A missing content file is ignored. Any other filesystem error aborts
    /// the removal before the collection is changed.
    pub async fn remove(&self, url: &str) -> Result<usize, FilterError> {
        let url = validate_filter_url(url)?;
        let _guard = self.mutation.lock().await;

        let matching: Vec<FilterList> = self
            .lists
            .read()
            .await
            .iter()
            .filter(|l| l.url == url)
            .cloned()
            .collect();
        if matching.is_empty() {
            return Err(FilterError::UnknownUrl(url));
        }

        for list in &matching {
            let path = list.content_path(&self.dir);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("Filter file {} was already gone", path.display());
                }
                Err(e) => {
                    log::error!("Couldn't remove the filter file {}: {e}", path.display());
                    return Err(FilterError::Remove(e));
                }
            }
        }

        self.lists.write().await.retain(|l| l.url != url);
        log::info!("Removed filter {url}");
        Ok(matching.len())
    }

    /// Enables every list with this URL, then refreshes stale lists.
    ///
    /// Refresh failures are logged and do not affect the result.
    pub async fn enable(&self, url: &str) -> Result<usize, FilterError> {
        let changed = self.set_enabled(url, true).await?;
        let updated = self.refresh(false).await;
        log::debug!("Refresh after enabling {url} updated {updated} filters");
        Ok(changed)
    }

    /// Disables every list with this URL.
    pub async fn disable(&self, url: &str) -> Result<usize, FilterError> {
        self.set_enabled(url, false).await
    }

    async fn set_enabled(&self, url: &str, enabled: bool) -> Result<usize, FilterError> {
        let url = validate_filter_url(url)?;
        let _guard = self.mutation.lock().await;

        let mut lists = self.lists.write().await;
        let mut matched = 0;
        for list in lists.iter_mut().filter(|l| l.url == url) {
            list.enabled = enabled;
            matched += 1;
        }
        if matched == 0 {
            return Err(FilterError::UnknownUrl(url));
        }
        Ok(matched)
    }

    /// Re-downloads enabled lists and returns how many changed.
    ///
    /// Without `force`, lists fetched within the refresh period are skipped.
    /// A list whose content did not change only gets a new `last_updated`.
    /// A failure on one list is logged and the pass continues.
    pub async fn refresh(&self, force: bool) -> usize {
        let _guard = self.mutation.lock().await;
        let mut lists = self.lists.read().await.clone();
        let now = Utc::now();
        let mut updated = 0;

        for list in lists.iter_mut().filter(|l| l.enabled) {
            if !force && self.is_fresh(list, now) {
                continue;
            }

            let content = match self.fetch_content(&list.url).await {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("Failed to refresh filter {}: {e}", list.id);
                    continue;
                }
            };
            let parsed = parse_filter(&content);
            if parsed.rules_count == 0 {
                log::warn!("Filter {} at {} has no rules, keeping previous content", list.id, list.url);
                continue;
            }

            if list.checksum.as_deref() == Some(parsed.checksum.as_str()) {
                list.last_updated = Some(Utc::now());
                continue;
            }
            if let Err(e) = persist_content(&self.dir, list.id, &content).await {
                log::error!("Failed to save filter {} due to {e}", list.id);
                continue;
            }
            apply_parsed(list, parsed);
            list.last_updated = Some(Utc::now());
            updated += 1;
            log::info!("Updated filter {} ({} rules)", list.id, list.rules_count);
        }

        *self.lists.write().await = lists;
        updated
    }

    fn is_fresh(&self, list: &FilterList, now: chrono::DateTime<Utc>) -> bool {
        let Some(last) = list.last_updated else {
            return false;
        };
        match (now - last).to_std() {
            Ok(age) => age < self.refresh_period,
            // Timestamps in the future count as fresh
            Err(_) => true,
        }
    }

    async fn fetch_content(&self, url: &str) -> Result<String, FilterError> {
        let content = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|source| FilterError::Fetch {
                url: url.to_string(),
                source,
            })?;
        if looks_like_html(&content) {
            return Err(FilterError::Fetch {
                url: url.to_string(),
                source: FetchError::NotAFilter,
            });
        }
        Ok(content)
    }
}

fn apply_parsed(list: &mut FilterList, parsed: ParsedFilter) {
    list.rules_count = parsed.rules_count;
    if list.name.is_empty() {
        if let Some(title) = parsed.title {
            list.name = title;
        }
    }
    list.checksum = Some(parsed.checksum);
}
