//! DNS traffic statistics.
//!
//! Counters are owned by a [`CounterStore`]; this module only reads them,
//! ranks them and buckets them into history windows. [`MemoryCounterStore`]
//! is the in-process store the binary runs with.

mod aggregator;
mod store;
mod types;

pub use aggregator::{top_n, StatsAggregator};
pub use store::{CounterStore, MemoryCounterStore, QueryEvent, QueryOutcome};
pub use types::{
    AggregatedStats, Counters, HistoryBucket, HistoryQuery, StatsSample, StatsTop, TimeUnit,
    TopKind,
};
