//! Upstream health probes.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::resolver::{AnswerRecord, ResolverFactory};
use crate::config::{PROBE_EXPECTED_ADDR, PROBE_HOSTNAME, PROBE_TIMEOUT_SECS};
use crate::error_handling::ProbeError;

/// Result text reported for a working upstream.
pub const PROBE_OK: &str = "OK";

/// Outcome of probing several upstreams, in request order.
///
/// Serializes as a JSON object mapping each upstream to `"OK"` or the
/// failure message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    results: Vec<(String, Result<(), ProbeError>)>,
}

impl ProbeReport {
    /// Upstreams with their outcome, in request order.
    pub fn results(&self) -> &[(String, Result<(), ProbeError>)] {
        &self.results
    }

    /// Outcome for `address`, if it was probed.
    pub fn get(&self, address: &str) -> Option<&Result<(), ProbeError>> {
        self.results
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, r)| r)
    }

    /// Returns `true` when every upstream passed.
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }
}

impl Serialize for ProbeReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.results.len()))?;
        for (address, result) in &self.results {
            match result {
                Ok(()) => map.serialize_entry(address, PROBE_OK)?,
                Err(e) => map.serialize_entry(address, &e.to_string())?,
            }
        }
        map.end()
    }
}

/// Checks that upstream resolvers answer correctly.
///
/// A probe asks the upstream for the `A` record of a well-known name and
/// expects exactly one answer. If that answer is an `A` record it must carry
/// the expected address; other record types are accepted as-is.
#[derive(Clone)]
pub struct ResolverProber {
    factory: Arc<dyn ResolverFactory>,
    timeout: Duration,
}

impl ResolverProber {
    /// Creates a prober using the default probe timeout.
    pub fn new(factory: Arc<dyn ResolverFactory>) -> Self {
        Self {
            factory,
            timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
        }
    }

    /// Overrides the per-query timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probes a single upstream.
    pub async fn probe(&self, address: &str) -> Result<(), ProbeError> {
        log::info!("Checking if DNS {address} works...");
        let resolver = self
            .factory
            .build(address, self.timeout)
            .await
            .map_err(|reason| ProbeError::InvalidUpstream {
                address: address.to_string(),
                reason,
            })?;

        let answers = resolver
            .query_a(PROBE_HOSTNAME)
            .await
            .map_err(|reason| ProbeError::Exchange {
                address: address.to_string(),
                reason,
            })?;

        if answers.len() != 1 {
            return Err(ProbeError::WrongAnswerCount {
                address: address.to_string(),
                count: answers.len(),
            });
        }
        if let AnswerRecord::A(got) = answers[0] {
            if got != PROBE_EXPECTED_ADDR {
                return Err(ProbeError::WrongAddress {
                    address: address.to_string(),
                    got,
                });
            }
        }

        log::info!("DNS {address} works OK");
        Ok(())
    }

    /// Probes every upstream concurrently.
    ///
    /// Duplicate addresses are probed once.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::NoServers`] when `addresses` is empty.
    pub async fn probe_all(&self, addresses: &[String]) -> Result<ProbeReport, ProbeError> {
        let mut unique: Vec<&str> = Vec::with_capacity(addresses.len());
        for address in addresses {
            if !unique.contains(&address.as_str()) {
                unique.push(address.as_str());
            }
        }
        if unique.is_empty() {
            return Err(ProbeError::NoServers);
        }

        let outcomes = join_all(unique.iter().map(|address| self.probe(address))).await;
        let results = unique
            .into_iter()
            .zip(outcomes)
            .map(|(address, outcome)| {
                if let Err(e) = &outcome {
                    log::warn!("{e}");
                }
                (address.to_string(), outcome)
            })
            .collect();
        Ok(ProbeReport { results })
    }
}
