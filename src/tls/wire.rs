//! JSON wire format of the TLS settings.
//!
//! The PEM fields travel base64-encoded so the payload stays a single JSON
//! document with no embedded newlines.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use super::settings::{CertificateStatus, TlsSettings};
use crate::error_handling::TlsPayloadError;

/// TLS settings merged with their certificate report, as returned by the control API.
#[derive(Debug, Clone, Serialize)]
pub struct TlsPayload {
    /// Settings with base64-encoded PEM fields
    #[serde(flatten)]
    pub settings: TlsSettings,
    /// Report for the settings
    #[serde(flatten)]
    pub status: CertificateStatus,
}

fn decode_field(field: &'static str, value: &str) -> Result<String, TlsPayloadError> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|source| TlsPayloadError::Base64 { field, source })?;
    String::from_utf8(bytes).map_err(|_| TlsPayloadError::Utf8 { field })
}

/// Decodes a TLS settings request body.
///
/// # Errors
///
/// Fails when the body is not JSON or a PEM field is not valid base64 text.
pub fn decode_tls_payload(body: &[u8]) -> Result<TlsSettings, TlsPayloadError> {
    let mut settings: TlsSettings = serde_json::from_slice(body)?;
    settings.certificate_chain = decode_field("certificate_chain", &settings.certificate_chain)?;
    settings.private_key = decode_field("private_key", &settings.private_key)?;
    Ok(settings)
}

/// Builds the response payload, base64-encoding the PEM fields.
pub fn encode_tls_payload(settings: &TlsSettings, status: &CertificateStatus) -> TlsPayload {
    let mut settings = settings.clone();
    settings.certificate_chain = STANDARD.encode(settings.certificate_chain.as_bytes());
    settings.private_key = STANDARD.encode(settings.private_key.as_bytes());
    TlsPayload {
        settings,
        status: status.clone(),
    }
}
