//! Statistics data types.

use std::ops::AddAssign;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use strum_macros::{Display, EnumString};

use crate::config::MAX_HISTORY_WINDOWS;
use crate::error_handling::HistoryError;

/// Width of a history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// One second
    Seconds,
    /// One minute
    Minutes,
    /// One hour
    Hours,
    /// One day
    Days,
}

impl TimeUnit {
    /// Length of one window.
    pub fn duration(self) -> TimeDelta {
        match self {
            TimeUnit::Seconds => TimeDelta::seconds(1),
            TimeUnit::Minutes => TimeDelta::minutes(1),
            TimeUnit::Hours => TimeDelta::hours(1),
            TimeUnit::Days => TimeDelta::days(1),
        }
    }
}

/// Which ranking a top-N query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TopKind {
    /// Most queried domains
    #[strum(serialize = "top_queried_domains")]
    QueriedDomains,
    /// Most blocked domains
    #[strum(serialize = "top_blocked_domains")]
    BlockedDomains,
    /// Most active clients
    #[strum(serialize = "top_clients")]
    Clients,
}

/// Additive traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Queries answered
    pub dns_queries: u64,
    /// Queries blocked by filter lists
    pub blocked_filtering: u64,
    /// Queries blocked by safe browsing
    pub replaced_safebrowsing: u64,
    /// Queries blocked by parental control
    pub replaced_parental: u64,
    /// Queries rewritten by safe search
    pub replaced_safesearch: u64,
}

impl AddAssign for Counters {
    fn add_assign(&mut self, rhs: Self) {
        self.dns_queries += rhs.dns_queries;
        self.blocked_filtering += rhs.blocked_filtering;
        self.replaced_safebrowsing += rhs.replaced_safebrowsing;
        self.replaced_parental += rhs.replaced_parental;
        self.replaced_safesearch += rhs.replaced_safesearch;
    }
}

/// Counters summed over the statistics period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregatedStats {
    /// Summed counters
    #[serde(flatten)]
    pub counters: Counters,
    /// Mean processing time per query, in seconds
    pub avg_processing_time: f64,
}

/// Counters recorded at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSample {
    /// When the counters were recorded
    pub at: DateTime<Utc>,
    /// Counter increments
    pub counters: Counters,
}

/// Counter totals of one history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryBucket {
    /// Start of the window
    pub time: DateTime<Utc>,
    /// Totals of the window
    #[serde(flatten)]
    pub counters: Counters,
}

/// A validated history request.
///
/// `start` and `end` are inclusive and `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    unit: TimeUnit,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, HistoryError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| HistoryError::InvalidTimestamp { field, source })
}

impl HistoryQuery {
    /// Builds a query from already parsed values.
    pub fn new(unit: TimeUnit, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, HistoryError> {
        if start > end {
            return Err(HistoryError::StartAfterEnd);
        }
        let query = Self { unit, start, end };
        let windows = query.window_count() as u64;
        if windows > MAX_HISTORY_WINDOWS {
            return Err(HistoryError::TooManyWindows {
                windows,
                limit: MAX_HISTORY_WINDOWS,
            });
        }
        Ok(query)
    }

    /// Parses the `time_unit`, `start_time` and `end_time` request parameters.
    ///
    /// Timestamps are RFC 3339.
    ///
    /// # Examples
    ///
    /// ```
    /// use dns_control::stats::HistoryQuery;
    ///
    /// let query = HistoryQuery::parse("hours", "2024-01-01T00:00:00Z", "2024-01-01T03:00:00Z").unwrap();
    /// assert_eq!(query.window_count(), 3);
    /// assert!(HistoryQuery::parse("weeks", "2024-01-01T00:00:00Z", "2024-01-01T03:00:00Z").is_err());
    /// ```
    pub fn parse(unit: &str, start: &str, end: &str) -> Result<Self, HistoryError> {
        let unit =
            TimeUnit::from_str(unit).map_err(|_| HistoryError::InvalidTimeUnit(unit.to_string()))?;
        let start = parse_timestamp("start_time", start)?;
        let end = parse_timestamp("end_time", end)?;
        Self::new(unit, start, end)
    }

    /// Window width.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// First instant covered.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Last instant covered.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Number of windows covering `[start, end]`; never zero.
    pub fn window_count(&self) -> usize {
        let span = (self.end - self.start).num_milliseconds();
        let unit = self.unit.duration().num_milliseconds();
        let windows = (span + unit - 1) / unit;
        windows.max(1) as usize
    }

    /// Index of the window containing `at`, if `at` lies within the query.
    pub fn window_of(&self, at: DateTime<Utc>) -> Option<usize> {
        if at < self.start || at > self.end {
            return None;
        }
        let offset = (at - self.start).num_milliseconds();
        let index = (offset / self.unit.duration().num_milliseconds()) as usize;
        Some(index.min(self.window_count() - 1))
    }
}

/// Serializes `(key, count)` pairs as a JSON object, keeping their order.
pub(crate) fn as_ordered_map<S: Serializer>(
    entries: &[(String, u64)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, count) in entries {
        map.serialize_entry(key, count)?;
    }
    map.end()
}

/// All three rankings, as returned by the top endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsTop {
    /// Most queried domains
    #[serde(serialize_with = "as_ordered_map")]
    pub top_queried_domains: Vec<(String, u64)>,
    /// Most blocked domains
    #[serde(serialize_with = "as_ordered_map")]
    pub top_blocked_domains: Vec<(String, u64)>,
    /// Most active clients
    #[serde(serialize_with = "as_ordered_map")]
    pub top_clients: Vec<(String, u64)>,
    /// Period the rankings cover
    pub stats_period: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_time_unit_parsing() {
        assert_eq!(TimeUnit::from_str("seconds").unwrap(), TimeUnit::Seconds);
        assert_eq!(TimeUnit::from_str("days").unwrap(), TimeUnit::Days);
        assert!(TimeUnit::from_str("weeks").is_err());
        assert!(TimeUnit::from_str("").is_err());
        assert_eq!(TimeUnit::Minutes.to_string(), "minutes");
    }

    #[test]
    fn test_window_count() {
        let query = HistoryQuery::parse("hours", "2024-01-01T00:00:00Z", "2024-01-01T03:00:00Z").unwrap();
        assert_eq!(query.window_count(), 3);

        let query = HistoryQuery::parse("hours", "2024-01-01T00:00:00Z", "2024-01-01T03:30:00Z").unwrap();
        assert_eq!(query.window_count(), 4);

        let query = HistoryQuery::parse("days", "2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z").unwrap();
        assert_eq!(query.window_count(), 1);
    }

    #[test]
    fn test_window_of() {
        let query = HistoryQuery::parse("hours", "2024-01-01T00:00:00Z", "2024-01-01T03:00:00Z").unwrap();
        assert_eq!(query.window_of(at("2024-01-01T00:00:00Z")), Some(0));
        assert_eq!(query.window_of(at("2024-01-01T01:59:59Z")), Some(1));
        assert_eq!(query.window_of(at("2024-01-01T03:00:00Z")), Some(2));
        assert_eq!(query.window_of(at("2023-12-31T23:59:59Z")), None);
        assert_eq!(query.window_of(at("2024-01-01T03:00:01Z")), None);
    }

    #[test]
    fn test_parse_rejections() {
        assert!(matches!(
            HistoryQuery::parse("hours", "2024-01-01T03:00:00Z", "2024-01-01T00:00:00Z"),
            Err(HistoryError::StartAfterEnd)
        ));
        assert!(matches!(
            HistoryQuery::parse("hours", "yesterday", "2024-01-01T00:00:00Z"),
            Err(HistoryError::InvalidTimestamp { field: "start_time", .. })
        ));
        assert!(matches!(
            HistoryQuery::parse("hours", "2024-01-01T00:00:00Z", ""),
            Err(HistoryError::InvalidTimestamp { field: "end_time", .. })
        ));
        assert!(matches!(
            HistoryQuery::parse("fortnights", "2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z"),
            Err(HistoryError::InvalidTimeUnit(_))
        ));
        assert!(matches!(
            HistoryQuery::parse("seconds", "2000-01-01T00:00:00Z", "2024-01-01T00:00:00Z"),
            Err(HistoryError::TooManyWindows { .. })
        ));
    }

    #[test]
    fn test_timestamps_with_offsets() {
        let query = HistoryQuery::parse("hours", "2024-01-01T02:00:00+02:00", "2024-01-01T01:00:00Z").unwrap();
        assert_eq!(query.start(), at("2024-01-01T00:00:00Z"));
        assert_eq!(query.window_count(), 1);
    }

    #[test]
    fn test_stats_top_keeps_order() {
        let top = StatsTop {
            top_queried_domains: vec![("b.test".into(), 5), ("a.test".into(), 3)],
            top_blocked_domains: vec![],
            top_clients: vec![("10.0.0.2".into(), 1)],
            stats_period: "24 hours",
        };
        let json = serde_json::to_string(&top).unwrap();
        assert!(json.find("b.test").unwrap() < json.find("a.test").unwrap());
        assert!(json.contains(r#""stats_period":"24 hours""#));
        assert!(json.contains(r#""top_blocked_domains":{}"#));
    }
}
