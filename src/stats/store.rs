//! Counter store contract and the in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::types::{AggregatedStats, Counters, StatsSample};
use crate::config::{MAX_RECORDED_QUERIES, STATS_PERIOD};

/// Source of DNS traffic counters.
///
/// Implementations are owned by the DNS engine. Every method must be cheap
/// and non-blocking; rankings are returned unsorted, in the store's own
/// iteration order.
pub trait CounterStore: Send + Sync {
    /// Query counts per domain.
    fn top_domains(&self) -> Vec<(String, u64)>;
    /// Blocked query counts per domain.
    fn top_blocked(&self) -> Vec<(String, u64)>;
    /// Query counts per client address.
    fn top_clients(&self) -> Vec<(String, u64)>;
    /// Counters summed over the statistics period.
    fn aggregated(&self) -> AggregatedStats;
    /// Samples recorded within `[start, end]`, oldest first.
    fn samples_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<StatsSample>;
    /// Resets every counter.
    fn purge(&self);
}

/// How the DNS engine answered a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Resolved normally
    Allowed,
    /// Blocked by a filter list
    Blocked,
    /// Blocked by safe browsing
    SafeBrowsing,
    /// Blocked by parental control
    Parental,
    /// Rewritten by safe search
    SafeSearch,
}

impl QueryOutcome {
    fn counters(self) -> Counters {
        let mut counters = Counters {
            dns_queries: 1,
            ..Default::default()
        };
        match self {
            QueryOutcome::Allowed => {}
            QueryOutcome::Blocked => counters.blocked_filtering = 1,
            QueryOutcome::SafeBrowsing => counters.replaced_safebrowsing = 1,
            QueryOutcome::Parental => counters.replaced_parental = 1,
            QueryOutcome::SafeSearch => counters.replaced_safesearch = 1,
        }
        counters
    }

    fn is_blocked(self) -> bool {
        !matches!(self, QueryOutcome::Allowed | QueryOutcome::SafeSearch)
    }
}

/// One answered query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    /// When the query was answered
    pub at: DateTime<Utc>,
    /// Queried domain
    pub domain: String,
    /// Client address
    pub client: String,
    /// How it was answered
    pub outcome: QueryOutcome,
    /// Time spent answering
    pub elapsed: Duration,
}

/// Counts keyed by name, iterated in first-seen order.
#[derive(Default)]
struct OrderedCounts {
    index: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl OrderedCounts {
    fn increment(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    fn into_entries(self) -> Vec<(String, u64)> {
        self.entries
    }
}

/// In-process [`CounterStore`] keeping the queries of the last statistics period.
///
/// Queries older than the period are dropped on write and ignored on read.
/// At most `MAX_RECORDED_QUERIES` queries are kept; the oldest go first.
pub struct MemoryCounterStore {
    period: TimeDelta,
    events: RwLock<VecDeque<QueryEvent>>,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCounterStore {
    /// Creates an empty store covering the default statistics period.
    pub fn new() -> Self {
        Self::with_period(STATS_PERIOD)
    }

    /// Creates an empty store covering `period`.
    pub fn with_period(period: Duration) -> Self {
        Self {
            period: TimeDelta::from_std(period).unwrap_or_else(|_| TimeDelta::days(36500)),
            events: RwLock::new(VecDeque::new()),
        }
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.period)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Records an answered query.
    pub fn record(&self, event: QueryEvent) {
        let cutoff = self.cutoff(event.at);
        let mut events = match self.events.write() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        while events.front().is_some_and(|e| e.at < cutoff) {
            events.pop_front();
        }
        if events.len() >= MAX_RECORDED_QUERIES {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Runs `f` over the queries within the period ending now.
    fn with_recent<T>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &QueryEvent>) -> T) -> T {
        let cutoff = self.cutoff(Utc::now());
        let events = match self.events.read() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut recent = events.iter().filter(|e| e.at >= cutoff);
        f(&mut recent)
    }

    fn ranking(&self, key: impl Fn(&QueryEvent) -> Option<&str>) -> Vec<(String, u64)> {
        self.with_recent(|events| {
            let mut counts = OrderedCounts::default();
            for event in events {
                if let Some(k) = key(event) {
                    counts.increment(k);
                }
            }
            counts.into_entries()
        })
    }
}

impl CounterStore for MemoryCounterStore {
    fn top_domains(&self) -> Vec<(String, u64)> {
        self.ranking(|e| Some(e.domain.as_str()))
    }

    fn top_blocked(&self) -> Vec<(String, u64)> {
        self.ranking(|e| e.outcome.is_blocked().then_some(e.domain.as_str()))
    }

    fn top_clients(&self) -> Vec<(String, u64)> {
        self.ranking(|e| Some(e.client.as_str()))
    }

    fn aggregated(&self) -> AggregatedStats {
        self.with_recent(|events| {
            let mut counters = Counters::default();
            let mut elapsed = Duration::ZERO;
            for event in events {
                counters += event.outcome.counters();
                elapsed += event.elapsed;
            }
            let avg_processing_time = if counters.dns_queries == 0 {
                0.0
            } else {
                elapsed.as_secs_f64() / counters.dns_queries as f64
            };
            AggregatedStats {
                counters,
                avg_processing_time,
            }
        })
    }

    fn samples_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<StatsSample> {
        let events = match self.events.read() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events
            .iter()
            .filter(|e| e.at >= start && e.at <= end)
            .map(|e| StatsSample {
                at: e.at,
                counters: e.outcome.counters(),
            })
            .collect()
    }

    fn purge(&self) {
        let mut events = match self.events.write() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.clear();
        log::info!("Statistics purged");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(domain: &str, client: &str, outcome: QueryOutcome) -> QueryEvent {
        QueryEvent {
            at: Utc::now(),
            domain: domain.to_string(),
            client: client.to_string(),
            outcome,
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_rankings_in_first_seen_order() {
        let store = MemoryCounterStore::new();
        store.record(event("a.test", "10.0.0.1", QueryOutcome::Allowed));
        store.record(event("b.test", "10.0.0.2", QueryOutcome::Blocked));
        store.record(event("a.test", "10.0.0.1", QueryOutcome::Allowed));

        assert_eq!(
            store.top_domains(),
            vec![("a.test".to_string(), 2), ("b.test".to_string(), 1)]
        );
        assert_eq!(store.top_blocked(), vec![("b.test".to_string(), 1)]);
        assert_eq!(store.top_clients()[0], ("10.0.0.1".to_string(), 2));
    }

    #[test]
    fn test_aggregated_counters() {
        let store = MemoryCounterStore::new();
        store.record(event("a.test", "c", QueryOutcome::Allowed));
        store.record(event("b.test", "c", QueryOutcome::Blocked));
        store.record(event("c.test", "c", QueryOutcome::Parental));
        store.record(event("d.test", "c", QueryOutcome::SafeSearch));

        let stats = store.aggregated();
        assert_eq!(stats.counters.dns_queries, 4);
        assert_eq!(stats.counters.blocked_filtering, 1);
        assert_eq!(stats.counters.replaced_parental, 1);
        assert_eq!(stats.counters.replaced_safesearch, 1);
        assert!((stats.avg_processing_time - 0.01).abs() < 1e-9);
        // Safe search rewrites are not blocks
        assert_eq!(store.top_blocked().len(), 2);
    }

    #[test]
    fn test_old_queries_are_ignored() {
        let store = MemoryCounterStore::with_period(Duration::from_secs(60));
        let mut old = event("old.test", "c", QueryOutcome::Allowed);
        old.at = Utc::now() - TimeDelta::minutes(5);
        store.record(old);
        store.record(event("new.test", "c", QueryOutcome::Allowed));

        assert_eq!(store.top_domains(), vec![("new.test".to_string(), 1)]);
        assert_eq!(store.aggregated().counters.dns_queries, 1);
    }

    #[test]
    fn test_purge_resets_everything() {
        let store = MemoryCounterStore::new();
        store.record(event("a.test", "c", QueryOutcome::Blocked));
        store.purge();
        assert!(store.top_domains().is_empty());
        assert_eq!(store.aggregated(), AggregatedStats::default());
        store.purge();
        assert!(store.top_clients().is_empty());
    }
}
