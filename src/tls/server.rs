//! rustls server configuration for the HTTPS listener.

use std::sync::Arc;

use rustls::crypto::ring::default_provider;
use rustls::pki_types::CertificateDer;
use rustls::ServerConfig;

use super::key::parse_private_key;
use super::pem::{certificate_blocks, first_private_key_block};
use super::settings::TlsSettings;
use crate::error_handling::ListenerError;

/// Builds a server configuration from the PEM material in `settings`.
///
/// The settings are expected to have passed validation already; any failure
/// here is reported as [`ListenerError::Tls`].
pub fn build_server_config(settings: &TlsSettings) -> Result<Arc<ServerConfig>, ListenerError> {
    let (blocks, _) = certificate_blocks(&settings.certificate_chain);
    if blocks.is_empty() {
        return Err(ListenerError::Tls("no certificates in chain".to_string()));
    }
    let chain: Vec<CertificateDer<'static>> = blocks
        .into_iter()
        .map(|block| CertificateDer::from(block.contents))
        .collect();

    let (key_block, _) = first_private_key_block(&settings.private_key);
    let key_block = key_block.ok_or_else(|| ListenerError::Tls("no private key".to_string()))?;
    let key = parse_private_key(&key_block.contents).map_err(ListenerError::Tls)?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| ListenerError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(chain, key.der)
        .map_err(|e| ListenerError::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
