//! Upstream resolver probing.
//!
//! Operators change the upstream DNS servers through the control API and can
//! test candidates before applying them. [`ResolverProber`] performs those
//! tests through a [`ResolverFactory`]; [`HickoryResolverFactory`] speaks plain
//! DNS, DNS-over-TLS and DNS-over-HTTPS.

mod prober;
mod resolver;
mod spec;

pub use prober::{ProbeReport, ResolverProber, PROBE_OK};
pub use resolver::{AnswerRecord, HickoryResolverFactory, ResolverFactory, UpstreamResolver};
pub use spec::{Transport, UpstreamSpec, DOH_PATH};

/// Splits a whitespace separated list of upstream addresses.
pub fn parse_upstream_list(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// The configured upstreams, or the defaults when none are configured.
pub fn effective_upstreams(configured: &[String]) -> Vec<String> {
    if configured.is_empty() {
        crate::config::DEFAULT_UPSTREAM_DNS
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        configured.to_vec()
    }
}
