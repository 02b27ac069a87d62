//! Resolver construction for upstream probes.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;

use super::spec::{Transport, UpstreamSpec};

/// One record of the answer section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerRecord {
    /// An `A` record
    A(Ipv4Addr),
    /// Any other record type, by name
    Other(String),
}

/// A resolver bound to a single upstream.
#[async_trait]
pub trait UpstreamResolver: Send + Sync {
    /// Queries `name` for `A` records and returns the full answer section.
    ///
    /// An empty answer is `Ok(vec![])`, not an error.
    async fn query_a(&self, name: &str) -> Result<Vec<AnswerRecord>, String>;
}

/// Builds resolvers from operator-supplied upstream addresses.
#[async_trait]
pub trait ResolverFactory: Send + Sync {
    /// Returns a resolver for `address` using `timeout` per query.
    async fn build(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn UpstreamResolver>, String>;
}

fn only_protocol(group: NameServerConfigGroup, protocol: Protocol) -> NameServerConfigGroup {
    let servers: Vec<_> = group
        .into_inner()
        .into_iter()
        .filter(|ns| ns.protocol == protocol)
        .collect();
    NameServerConfigGroup::from(servers)
}

fn name_servers(spec: &UpstreamSpec, ips: &[IpAddr]) -> NameServerConfigGroup {
    match spec.transport {
        Transport::Plain => NameServerConfigGroup::from_ips_clear(ips, spec.port, false),
        Transport::Udp => only_protocol(
            NameServerConfigGroup::from_ips_clear(ips, spec.port, false),
            Protocol::Udp,
        ),
        Transport::Tcp => only_protocol(
            NameServerConfigGroup::from_ips_clear(ips, spec.port, false),
            Protocol::Tcp,
        ),
        Transport::Tls => {
            NameServerConfigGroup::from_ips_tls(ips, spec.port, spec.host.clone(), false)
        }
        Transport::Https => {
            NameServerConfigGroup::from_ips_https(ips, spec.port, spec.host.clone(), false)
        }
    }
}

/// [`ResolverFactory`] backed by `hickory-resolver`.
///
/// Resolvers make a single attempt, keep no cache and report CNAME chains as
/// part of the answer, so the probe sees the reply the way a client would.
#[derive(Debug, Clone, Copy, Default)]
pub struct HickoryResolverFactory;

#[async_trait]
impl ResolverFactory for HickoryResolverFactory {
    async fn build(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn UpstreamResolver>, String> {
        let spec = UpstreamSpec::parse(address)?;
        let ips = spec.resolve_ips().await?;
        log::debug!(
            "Upstream {address} uses {} on port {} via {:?}",
            spec.transport,
            spec.port,
            ips
        );

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        opts.cache_size = 0;
        opts.ndots = 0;
        opts.preserve_intermediates = true;
        opts.use_hosts_file = false;

        let config = ResolverConfig::from_parts(None, vec![], name_servers(&spec, &ips));
        Ok(Box::new(HickoryUpstream {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }))
    }
}

struct HickoryUpstream {
    resolver: TokioAsyncResolver,
}

#[async_trait]
impl UpstreamResolver for HickoryUpstream {
    async fn query_a(&self, name: &str) -> Result<Vec<AnswerRecord>, String> {
        match self.resolver.lookup(name, RecordType::A).await {
            Ok(lookup) => Ok(lookup
                .records()
                .iter()
                .filter_map(|record| record.data())
                .map(|data| match data {
                    RData::A(a) => AnswerRecord::A(a.0),
                    other => AnswerRecord::Other(other.record_type().to_string()),
                })
                .collect()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                _ => Err(e.to_string()),
            },
        }
    }
}
