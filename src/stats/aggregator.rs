//! Read-only views over a counter store.

use std::sync::Arc;

use super::store::CounterStore;
use super::types::{AggregatedStats, Counters, HistoryBucket, HistoryQuery, StatsTop, TopKind};
use crate::config::{STATS_PERIOD_LABEL, TOP_N_LIMIT};

/// Sorts entries by count, highest first, and keeps at most `TOP_N_LIMIT`.
///
/// The sort is stable: entries with equal counts keep their input order.
pub fn top_n(mut entries: Vec<(String, u64)>) -> Vec<(String, u64)> {
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(TOP_N_LIMIT);
    entries
}

/// Answers statistics queries from a [`CounterStore`].
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn CounterStore>,
}

impl StatsAggregator {
    /// Creates an aggregator reading from `store`.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// One ranking, sorted and truncated.
    pub fn top(&self, kind: TopKind) -> Vec<(String, u64)> {
        let entries = match kind {
            TopKind::QueriedDomains => self.store.top_domains(),
            TopKind::BlockedDomains => self.store.top_blocked(),
            TopKind::Clients => self.store.top_clients(),
        };
        top_n(entries)
    }

    /// All three rankings.
    pub fn top_all(&self) -> StatsTop {
        StatsTop {
            top_queried_domains: self.top(TopKind::QueriedDomains),
            top_blocked_domains: self.top(TopKind::BlockedDomains),
            top_clients: self.top(TopKind::Clients),
            stats_period: STATS_PERIOD_LABEL,
        }
    }

    /// Counters summed over the statistics period.
    pub fn aggregate(&self) -> AggregatedStats {
        self.store.aggregated()
    }

    /// One bucket per window of `query`, empty windows included.
    pub fn history(&self, query: &HistoryQuery) -> Vec<HistoryBucket> {
        let unit = query.unit().duration();
        let mut buckets: Vec<HistoryBucket> = (0..query.window_count())
            .map(|i| HistoryBucket {
                time: query.start() + unit * i as i32,
                counters: Counters::default(),
            })
            .collect();

        for sample in self.store.samples_between(query.start(), query.end()) {
            if let Some(i) = query.window_of(sample.at) {
                buckets[i].counters += sample.counters;
            }
        }
        buckets
    }

    /// Resets every counter of the store.
    pub fn purge(&self) {
        self.store.purge();
    }
}
