//! Filter list management.
//!
//! This module owns the block-list subscriptions fed to the DNS filtering
//! engine:
//! - Adding lists (download, validation, atomic persistence)
//! - Removing lists and their stored content
//! - Enabling and disabling lists
//! - Periodic and forced refreshes with change detection
//!
//! Downloads go through the [`FilterFetcher`] trait; [`HttpFilterFetcher`] is
//! the `reqwest` implementation with retries.

mod fetch;
mod manager;
mod parse;
mod types;

pub use fetch::{get_retry_strategy, FilterFetcher, HttpFilterFetcher};
pub use manager::{validate_filter_url, FilterManager};
pub use parse::{checksum, looks_like_html, parse_filter, ParsedFilter};
pub use types::{FilterList, FilteringStatus};
