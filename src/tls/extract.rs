//! Certificate metadata extraction.

use chrono::{DateTime, Utc};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::time::ASN1Time;

use super::settings::CertificateStatus;

/// Extracts DNS names from the Subject Alternative Name extension.
///
/// Only DNS names are returned. IP addresses, e-mail addresses and other
/// general name types are ignored.
pub(crate) fn extract_certificate_sans(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut sans = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(ref san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                if let GeneralName::DNSName(dns_name) = general_name {
                    sans.push(dns_name.to_string());
                }
            }
        }
    }

    sans
}

/// First common name of the certificate subject, if any.
pub(crate) fn subject_common_name(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
}

fn to_utc(time: &ASN1Time) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(time.timestamp(), 0)
}

/// Copies leaf metadata (subject, issuer, validity window, DNS names) into the report.
pub(crate) fn fill_leaf_metadata(cert: &X509Certificate<'_>, status: &mut CertificateStatus) {
    status.subject = cert.subject().to_string();
    status.issuer = cert.issuer().to_string();
    status.not_before = to_utc(&cert.validity().not_before);
    status.not_after = to_utc(&cert.validity().not_after);
    status.dns_names = extract_certificate_sans(cert);
}

/// Host name the chain is verified for.
///
/// The configured server name wins. Without one, the leaf's first DNS name
/// is used, then its subject common name.
pub(crate) fn verification_name(
    configured: &str,
    cert: &X509Certificate<'_>,
    dns_names: &[String],
) -> Option<String> {
    let configured = configured.trim();
    if !configured.is_empty() {
        return Some(configured.to_string());
    }
    dns_names
        .first()
        .cloned()
        .or_else(|| subject_common_name(cert))
}
