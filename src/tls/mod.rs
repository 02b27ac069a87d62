//! TLS certificate validation.
//!
//! This module inspects operator-supplied PEM material before it is used to
//! serve HTTPS:
//! - Certificate chain parsing and leaf metadata (subject, issuer, validity, DNS names)
//! - Chain verification against the bundled web PKI roots
//! - Private key parsing (PKCS#1, PKCS#8, SEC1) and key type detection
//! - Proof that the key matches the leaf certificate
//!
//! Validation never fails as a whole. Problems are reported through the
//! `warning_validation` field of the resulting [`CertificateStatus`], and an
//! untrusted chain is only a warning: self-signed certificates stay usable.
//!
//! Uses `x509-parser` for PEM, X.509 and private key DER decoding, `rustls`
//! for chain verification, and `ring` to check the key pair.

mod chain;
mod extract;
mod key;
mod pem;
mod server;
mod settings;
mod wire;

use rustls::pki_types::CertificateDer;
use x509_parser::certificate::X509Certificate;

pub use server::build_server_config;
pub use settings::{restart_required, CertificateStatus, KeyType, TlsSettings};
pub use wire::{decode_tls_payload, encode_tls_payload, TlsPayload};

use chain::verify_chain;
use extract::{fill_leaf_metadata, verification_name};
use key::{parse_private_key, verify_key_pair};
use pem::{certificate_blocks, first_private_key_block};

/// Validates the certificate chain and private key of `settings`.
///
/// Empty fields are skipped. The checks run in order and the first hard
/// failure stops validation with the report built so far:
///
/// 1. Every `CERTIFICATE` block must parse; at least one is required.
/// 2. The leaf is verified against the system roots (a failure is only a warning).
/// 3. The first private key block must parse as PKCS#1, PKCS#8 or SEC1.
/// 4. When both are present, the key must match the leaf.
///
/// # Examples
///
/// ```
/// use dns_control::tls::{validate_certificates, TlsSettings};
///
/// let status = validate_certificates(&TlsSettings {
///     private_key: "garbage".to_string(),
///     ..Default::default()
/// });
/// assert!(!status.usable);
/// assert_eq!(status.warning_validation, "No valid keys were found");
/// ```
pub fn validate_certificates(settings: &TlsSettings) -> CertificateStatus {
    let mut status = CertificateStatus::default();

    let mut leaf_der: Option<Vec<u8>> = None;
    if !settings.certificate_chain.is_empty() {
        match check_chain(settings, &mut status) {
            Ok(der) => leaf_der = Some(der),
            Err(warning) => {
                status.warning_validation = warning;
                return status;
            }
        }
    }

    let mut parsed_key = None;
    if !settings.private_key.is_empty() {
        let (block, skipped) = first_private_key_block(&settings.private_key);
        if !skipped.is_empty() {
            log::debug!("Skipped PEM blocks before private key: {skipped:?}");
        }
        let Some(block) = block else {
            status.warning_validation = "No valid keys were found".to_string();
            return status;
        };
        match parse_private_key(&block.contents) {
            Ok(key) => {
                status.valid_key = true;
                status.key_type = Some(key.key_type);
                parsed_key = Some(key);
            }
            Err(e) => {
                status.warning_validation = format!("Failed to parse private key: {e}");
                return status;
            }
        }
    }

    if let (Some(der), Some(key)) = (leaf_der, parsed_key) {
        let paired = x509_parser::parse_x509_certificate(&der)
            .map_err(|e| e.to_string())
            .and_then(|(_, leaf)| verify_key_pair(&leaf, &key));
        if let Err(e) = paired {
            status.warning_validation = format!("Invalid certificate or key: {e}");
            return status;
        }
        status.usable = true;
    }

    status
}

/// Parses the chain, verifies it and records leaf metadata.
///
/// Returns the leaf DER, or the warning that ends validation.
fn check_chain(settings: &TlsSettings, status: &mut CertificateStatus) -> Result<Vec<u8>, String> {
    let (blocks, skipped) = certificate_blocks(&settings.certificate_chain);
    if !skipped.is_empty() {
        log::debug!("Skipped non-certificate PEM blocks: {skipped:?}");
    }

    let mut parsed: Vec<X509Certificate<'_>> = Vec::with_capacity(blocks.len());
    for block in &blocks {
        let (_, cert) = x509_parser::parse_x509_certificate(&block.contents)
            .map_err(|e| format!("Failed to parse certificate: {e}"))?;
        parsed.push(cert);
    }

    let Some(leaf) = parsed.first() else {
        return Err("You have specified an empty certificate".to_string());
    };
    status.valid_cert = true;
    log::debug!("Number of certificates in chain: {}", parsed.len());

    fill_leaf_metadata(leaf, status);

    let chain_result = match verification_name(&settings.server_name, leaf, &status.dns_names) {
        Some(name) => {
            let leaf_der = CertificateDer::from(blocks[0].contents.as_slice());
            let intermediates: Vec<CertificateDer<'_>> = blocks[1..]
                .iter()
                .map(|block| CertificateDer::from(block.contents.as_slice()))
                .collect();
            verify_chain(&leaf_der, &intermediates, &name)
        }
        None => Err("certificate names no host to verify".to_string()),
    };
    match chain_result {
        Ok(()) => status.valid_chain = true,
        Err(e) => status.warning_validation = format!("Your certificate does not verify: {e}"),
    }

    Ok(blocks[0].contents.clone())
}
