//! TLS settings and the certificate report derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::config::{DEFAULT_DNS_OVER_TLS_PORT, DEFAULT_HTTPS_PORT};

/// Operator-supplied TLS settings.
///
/// `certificate_chain` and `private_key` hold PEM text. On the wire they are
/// base64-encoded (see [`crate::tls::decode_tls_payload`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    /// Whether the HTTPS listener should be served at all
    pub enabled: bool,
    /// Host name clients are expected to use; also the chain verification name
    pub server_name: String,
    /// Redirect plain HTTP control requests to HTTPS
    pub force_https: bool,
    /// Port of the HTTPS listener
    pub port_https: u16,
    /// Port of the DNS-over-TLS listener (owned by the DNS engine)
    pub port_dns_over_tls: u16,
    /// PEM certificate chain, leaf first
    pub certificate_chain: String,
    /// PEM private key
    pub private_key: String,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            server_name: String::new(),
            force_https: false,
            port_https: DEFAULT_HTTPS_PORT,
            port_dns_over_tls: DEFAULT_DNS_OVER_TLS_PORT,
            certificate_chain: String::new(),
            private_key: String::new(),
        }
    }
}

/// Private key algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum KeyType {
    /// RSA key (PKCS#1 or PKCS#8)
    #[serde(rename = "RSA")]
    #[strum(serialize = "RSA")]
    Rsa,
    /// ECDSA key (SEC1 or PKCS#8)
    #[serde(rename = "ECDSA")]
    #[strum(serialize = "ECDSA")]
    Ecdsa,
}

/// Report produced by validating a certificate chain and private key.
///
/// Rebuilt from scratch on every validation. `usable` implies `valid_cert`,
/// `valid_key` and a proven key/certificate match; it never implies
/// `valid_chain`, self-signed certificates are usable but flagged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateStatus {
    /// At least one certificate parsed successfully
    pub valid_cert: bool,
    /// The leaf verifies against the system trust roots
    pub valid_chain: bool,
    /// Leaf subject
    pub subject: String,
    /// Leaf issuer
    pub issuer: String,
    /// Start of the leaf validity window
    pub not_before: Option<DateTime<Utc>>,
    /// End of the leaf validity window
    pub not_after: Option<DateTime<Utc>>,
    /// DNS names from the leaf's subjectAltName extension
    pub dns_names: Vec<String>,
    /// The private key parsed successfully
    pub valid_key: bool,
    /// Algorithm of the private key
    pub key_type: Option<KeyType>,
    /// Human readable description of the last problem found
    pub warning_validation: String,
    /// Certificate and key are valid and form a matching pair
    pub usable: bool,
}

/// Decides whether a change of TLS settings requires the HTTPS listener to be restarted.
///
/// Only the fields that affect listener setup are compared: the enable flag,
/// the strict-SNI host name, the HTTPS port, the certificate chain and the key.
pub fn restart_required(active: &TlsSettings, candidate: &TlsSettings) -> bool {
    active.enabled != candidate.enabled
        || active.server_name != candidate.server_name
        || active.port_https != candidate.port_https
        || active.certificate_chain != candidate.certificate_chain
        || active.private_key != candidate.private_key
}
