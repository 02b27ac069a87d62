//! Upstream server specifications.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use url::Url;

use crate::config::{DNS_OVER_HTTPS_PORT, DNS_OVER_TLS_PORT, DNS_PORT};

/// Path served by DNS-over-HTTPS upstreams.
pub const DOH_PATH: &str = "/dns-query";

/// How queries reach an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// UDP with TCP fallback for truncated replies
    Plain,
    /// UDP only
    Udp,
    /// TCP only
    Tcp,
    /// DNS-over-TLS
    Tls,
    /// DNS-over-HTTPS
    Https,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transport::Plain => "plain",
            Transport::Udp => "udp",
            Transport::Tcp => "tcp",
            Transport::Tls => "tls",
            Transport::Https => "https",
        };
        f.write_str(name)
    }
}

/// A parsed upstream address.
///
/// Accepted forms:
/// - `1.1.1.1`, `1.1.1.1:53`, `2606:4700::1111`, `[2606:4700::1111]:53`, `dns.example:53`
/// - `udp://host[:port]`, `tcp://host[:port]`
/// - `tls://host[:port]` (port 853 by default)
/// - `https://host[:port]/dns-query`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamSpec {
    /// Transport to use
    pub transport: Transport,
    /// Host name or IP literal (without brackets)
    pub host: String,
    /// Server port
    pub port: u16,
}

fn split_host_port(input: &str, default_port: u16) -> Result<(String, u16), String> {
    let input = input.trim_end_matches('/');
    if input.is_empty() {
        return Err("missing host".to_string());
    }

    if let Some(rest) = input.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated IPv6 literal in {input:?}"))?;
        let port = match after.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None if after.is_empty() => default_port,
            None => return Err(format!("unexpected {after:?} after IPv6 literal")),
        };
        return Ok((host.to_string(), port));
    }

    // Bare IPv6 literals contain colons but no port
    if input.parse::<IpAddr>().is_ok() {
        return Ok((input.to_string(), default_port));
    }

    match input.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), parse_port(port)?)),
        Some(_) => Err(format!("missing host in {input:?}")),
        None => Ok((input.to_string(), default_port)),
    }
}

fn parse_port(port: &str) -> Result<u16, String> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("invalid port {port:?}")),
        Ok(port) => Ok(port),
    }
}

impl UpstreamSpec {
    /// Parses an operator-supplied upstream address.
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err("empty upstream address".to_string());
        }

        let Some((scheme, rest)) = input.split_once("://") else {
            if let Ok(addr) = input.parse::<SocketAddr>() {
                if addr.port() == 0 {
                    return Err(format!("invalid port in {input:?}"));
                }
                return Ok(Self {
                    transport: Transport::Plain,
                    host: addr.ip().to_string(),
                    port: addr.port(),
                });
            }
            let (host, port) = split_host_port(input, DNS_PORT)?;
            return Ok(Self {
                transport: Transport::Plain,
                host,
                port,
            });
        };

        let (transport, default_port) = match scheme.to_ascii_lowercase().as_str() {
            "udp" => (Transport::Udp, DNS_PORT),
            "tcp" => (Transport::Tcp, DNS_PORT),
            "tls" => (Transport::Tls, DNS_OVER_TLS_PORT),
            "https" => return Self::parse_https(input),
            other => return Err(format!("unsupported scheme {other:?}")),
        };
        let (host, port) = split_host_port(rest, default_port)?;
        Ok(Self {
            transport,
            host,
            port,
        })
    }

    fn parse_https(input: &str) -> Result<Self, String> {
        let url = Url::parse(input).map_err(|e| format!("invalid DNS-over-HTTPS URL: {e}"))?;
        let host = url
            .host_str()
            .ok_or_else(|| "DNS-over-HTTPS URL has no host".to_string())?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let path = url.path();
        if path != "/" && path != DOH_PATH {
            return Err(format!("only the {DOH_PATH} endpoint is supported, got {path:?}"));
        }
        Ok(Self {
            transport: Transport::Https,
            host,
            port: url.port().unwrap_or(DNS_OVER_HTTPS_PORT),
        })
    }

    /// The host as an IP address, if it is a literal.
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// Resolves the host to addresses, using the system resolver for names.
    pub async fn resolve_ips(&self) -> Result<Vec<IpAddr>, String> {
        if let Some(ip) = self.ip() {
            return Ok(vec![ip]);
        }
        let addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| format!("couldn't resolve {}: {e}", self.host))?;
        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        if ips.is_empty() {
            return Err(format!("{} has no addresses", self.host));
        }
        Ok(ips)
    }
}
