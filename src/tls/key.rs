//! Private key parsing and key/certificate pairing.
//!
//! Parsing is structural: the DER is decoded as PKCS#1, then PKCS#8, then
//! SEC1, without regard to what `ring` can sign with. Key sizes and curves
//! `ring` rejects still parse; their pairing falls back to comparing the
//! public half embedded in the key with the certificate's.

use ring::signature::{
    RsaPublicKeyComponents, UnparsedPublicKey, ECDSA_P256_SHA256_ASN1, ECDSA_P384_SHA384_ASN1,
    RSA_PKCS1_2048_8192_SHA256,
};
use rustls::crypto::ring::sign::any_supported_type;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer};
use rustls::SignatureScheme;
use x509_parser::asn1_rs::{Any, Class, FromDer, Tag};
use x509_parser::certificate::X509Certificate;
use x509_parser::oid_registry::{
    OID_EC_P256, OID_KEY_TYPE_EC_PUBLIC_KEY, OID_NIST_EC_P384, OID_NIST_EC_P521,
    OID_PKCS1_RSAENCRYPTION,
};
use x509_parser::public_key::PublicKey;

use super::settings::KeyType;

/// Message signed to prove that a private key matches a certificate.
const PAIRING_MESSAGE: &[u8] = b"dns_control certificate/key pairing check";

/// Signature schemes offered when proving the key pair.
const PAIRING_SCHEMES: [SignatureScheme; 3] = [
    SignatureScheme::RSA_PKCS1_SHA256,
    SignatureScheme::ECDSA_NISTP256_SHA256,
    SignatureScheme::ECDSA_NISTP384_SHA384,
];

const UNKNOWN_PKCS8_KEY: &str = "tls: found unknown private key type in PKCS#8 wrapping";
const TYPE_MISMATCH: &str = "private key type does not match public key type";
const KEY_MISMATCH: &str = "private key does not match public key";

/// Named curves accepted for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    fn from_oid(oid: &Any<'_>) -> Option<Self> {
        if !is_universal(oid, Tag::Oid) {
            return None;
        }
        [
            (OID_EC_P256.as_bytes(), Curve::P256),
            (OID_NIST_EC_P384.as_bytes(), Curve::P384),
            (OID_NIST_EC_P521.as_bytes(), Curve::P521),
        ]
        .into_iter()
        .find(|(bytes, _)| *bytes == oid.data)
        .map(|(_, curve)| curve)
    }
}

/// The public half recorded inside a private key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PublicHalf {
    Rsa { modulus: Vec<u8>, exponent: Vec<u8> },
    // SEC1 makes the public point optional
    Ec { curve: Curve, point: Option<Vec<u8>> },
}

/// A structurally valid private key.
pub(crate) struct ParsedKey {
    pub(crate) der: PrivateKeyDer<'static>,
    pub(crate) key_type: KeyType,
    public: PublicHalf,
}

fn is_universal(any: &Any<'_>, tag: Tag) -> bool {
    any.class() == Class::Universal && any.tag() == tag
}

fn is_context(any: &Any<'_>, tag: u32) -> bool {
    any.class() == Class::ContextSpecific && any.tag() == Tag(tag)
}

/// Decodes one complete DER element with nothing after it.
fn single(der: &[u8]) -> Option<Any<'_>> {
    match Any::from_der(der) {
        Ok((rest, any)) if rest.is_empty() => Some(any),
        _ => None,
    }
}

/// Decodes the elements of a complete DER SEQUENCE.
fn sequence_items(der: &[u8]) -> Option<Vec<Any<'_>>> {
    elements(&single(der)?)
}

/// Decodes the elements of an already decoded SEQUENCE.
fn elements<'a>(seq: &Any<'a>) -> Option<Vec<Any<'a>>> {
    if !is_universal(seq, Tag::Sequence) {
        return None;
    }
    let mut items = Vec::new();
    let mut input = seq.data;
    while !input.is_empty() {
        let (rest, item) = Any::from_der(input).ok()?;
        items.push(item);
        input = rest;
    }
    Some(items)
}

fn positive_integer(any: &Any<'_>) -> Option<Vec<u8>> {
    if !is_universal(any, Tag::Integer) || any.data.is_empty() || any.data[0] & 0x80 != 0 {
        return None;
    }
    let value = trim_leading_zeros(any.data);
    (!value.is_empty()).then(|| value.to_vec())
}

fn small_integer(any: &Any<'_>) -> Option<u8> {
    match (is_universal(any, Tag::Integer), any.data) {
        (true, [value]) => Some(*value),
        _ => None,
    }
}

/// `RSAPrivateKey` (RFC 8017, A.1.2).
fn parse_pkcs1(der: &[u8]) -> Option<PublicHalf> {
    let items = sequence_items(der)?;
    // version, n, e, d, p, q, dp, dq, qinv and optional other primes
    if items.len() < 9 || !matches!(small_integer(&items[0]), Some(0 | 1)) {
        return None;
    }
    let mut numbers = items[1..9].iter().map(positive_integer);
    let modulus = numbers.next()??;
    let exponent = numbers.next()??;
    if numbers.any(|n| n.is_none()) {
        return None;
    }
    Some(PublicHalf::Rsa { modulus, exponent })
}

/// `ECPrivateKey` (RFC 5915). `outer_curve` comes from a PKCS#8 wrapper.
fn parse_sec1(der: &[u8], outer_curve: Option<Curve>) -> Option<PublicHalf> {
    let items = sequence_items(der)?;
    if items.len() < 2
        || small_integer(&items[0]) != Some(1)
        || !is_universal(&items[1], Tag::OctetString)
        || items[1].data.is_empty()
    {
        return None;
    }

    let mut curve = outer_curve;
    let mut point = None;
    for item in &items[2..] {
        if is_context(item, 0) {
            let named = Curve::from_oid(&single(item.data)?)?;
            if curve.is_some_and(|outer| outer != named) {
                return None;
            }
            curve = Some(named);
        } else if is_context(item, 1) {
            let bits = single(item.data)?;
            match bits.data.split_first() {
                Some((0, key)) if is_universal(&bits, Tag::BitString) => point = Some(key.to_vec()),
                _ => return None,
            }
        } else {
            return None;
        }
    }

    Some(PublicHalf::Ec {
        curve: curve?,
        point,
    })
}

enum Pkcs8 {
    Key(PublicHalf, KeyType),
    OtherAlgorithm,
}

/// `PrivateKeyInfo` (RFC 5208), classified by its algorithm OID.
fn parse_pkcs8(der: &[u8]) -> Option<Pkcs8> {
    let items = sequence_items(der)?;
    if items.len() < 3
        || !matches!(small_integer(&items[0]), Some(0 | 1))
        || !is_universal(&items[2], Tag::OctetString)
    {
        return None;
    }
    let algorithm = elements(&items[1])?;
    let oid = algorithm.first().filter(|oid| is_universal(oid, Tag::Oid))?;

    if oid.data == OID_PKCS1_RSAENCRYPTION.as_bytes() {
        return parse_pkcs1(items[2].data).map(|public| Pkcs8::Key(public, KeyType::Rsa));
    }
    if oid.data == OID_KEY_TYPE_EC_PUBLIC_KEY.as_bytes() {
        let curve = Curve::from_oid(algorithm.get(1)?)?;
        return parse_sec1(items[2].data, Some(curve)).map(|public| Pkcs8::Key(public, KeyType::Ecdsa));
    }
    Some(Pkcs8::OtherAlgorithm)
}

/// Parses a DER private key.
///
/// Encodings are tried in order: PKCS#1 (RSA), PKCS#8 (RSA or ECDSA), SEC1
/// (ECDSA). The first that decodes wins. A PKCS#8 key of any other algorithm
/// is rejected outright.
pub(crate) fn parse_private_key(der: &[u8]) -> Result<ParsedKey, String> {
    if let Some(public) = parse_pkcs1(der) {
        return Ok(ParsedKey {
            der: PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(der.to_vec())),
            key_type: KeyType::Rsa,
            public,
        });
    }

    match parse_pkcs8(der) {
        Some(Pkcs8::Key(public, key_type)) => {
            return Ok(ParsedKey {
                der: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der.to_vec())),
                key_type,
                public,
            })
        }
        Some(Pkcs8::OtherAlgorithm) => return Err(UNKNOWN_PKCS8_KEY.to_string()),
        None => {}
    }

    if let Some(public) = parse_sec1(der, None) {
        return Ok(ParsedKey {
            der: PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(der.to_vec())),
            key_type: KeyType::Ecdsa,
            public,
        });
    }

    Err("tls: failed to parse private key".to_string())
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn leaf_curve(leaf: &X509Certificate<'_>) -> Option<Curve> {
    leaf.public_key()
        .algorithm
        .parameters
        .as_ref()
        .and_then(Curve::from_oid)
}

/// Proves that `key` is the private half of the leaf's public key.
///
/// Keys `ring` can sign with sign a fixed message that is verified against
/// the certificate's subject public key. Other keys must carry a public half
/// equal to the certificate's.
pub(crate) fn verify_key_pair(leaf: &X509Certificate<'_>, key: &ParsedKey) -> Result<(), String> {
    let public_key = leaf
        .public_key()
        .parsed()
        .map_err(|e| format!("unsupported certificate public key: {e}"))?;

    match (&key.public, &public_key) {
        (PublicHalf::Rsa { .. }, PublicKey::RSA(_)) => {}
        (PublicHalf::Ec { curve, .. }, PublicKey::EC(_)) if leaf_curve(leaf) == Some(*curve) => {}
        _ => return Err(TYPE_MISMATCH.to_string()),
    }

    match any_supported_type(&key.der) {
        Ok(signer) => prove_by_signature(signer.as_ref(), &public_key),
        Err(e) => {
            log::debug!("Comparing public keys, key cannot sign here: {e}");
            compare_public_halves(&key.public, &public_key)
        }
    }
}

fn prove_by_signature(signer: &dyn rustls::sign::SigningKey, public_key: &PublicKey<'_>) -> Result<(), String> {
    let signer = signer
        .choose_scheme(&PAIRING_SCHEMES)
        .ok_or_else(|| TYPE_MISMATCH.to_string())?;
    let signature = signer
        .sign(PAIRING_MESSAGE)
        .map_err(|e| format!("signing with private key failed: {e}"))?;

    let verified = match (signer.scheme(), public_key) {
        (SignatureScheme::RSA_PKCS1_SHA256, PublicKey::RSA(rsa)) => RsaPublicKeyComponents {
            n: trim_leading_zeros(rsa.modulus),
            e: trim_leading_zeros(rsa.exponent),
        }
        .verify(&RSA_PKCS1_2048_8192_SHA256, PAIRING_MESSAGE, &signature),
        (SignatureScheme::ECDSA_NISTP256_SHA256, PublicKey::EC(point)) => {
            UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, point.data())
                .verify(PAIRING_MESSAGE, &signature)
        }
        (SignatureScheme::ECDSA_NISTP384_SHA384, PublicKey::EC(point)) => {
            UnparsedPublicKey::new(&ECDSA_P384_SHA384_ASN1, point.data())
                .verify(PAIRING_MESSAGE, &signature)
        }
        _ => return Err(TYPE_MISMATCH.to_string()),
    };

    verified.map_err(|_| KEY_MISMATCH.to_string())
}

fn compare_public_halves(half: &PublicHalf, public_key: &PublicKey<'_>) -> Result<(), String> {
    let matches = match (half, public_key) {
        (PublicHalf::Rsa { modulus, exponent }, PublicKey::RSA(rsa)) => {
            trim_leading_zeros(rsa.modulus) == modulus.as_slice()
                && trim_leading_zeros(rsa.exponent) == exponent.as_slice()
        }
        (PublicHalf::Ec { point: Some(point), .. }, PublicKey::EC(leaf_point)) => {
            leaf_point.data() == point.as_slice()
        }
        (PublicHalf::Ec { point: None, .. }, _) => {
            return Err("private key does not record its public key".to_string())
        }
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(KEY_MISMATCH.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::pem::{certificate_blocks, first_private_key_block};

    const RSA_CERT: &str = include_str!("../../tests/fixtures/rsa_self_signed.crt");
    const EC_CERT: &str = include_str!("../../tests/fixtures/ec_self_signed.crt");
    const RSA_PKCS1: &str = include_str!("../../tests/fixtures/rsa_pkcs1.key");
    const RSA_PKCS8: &str = include_str!("../../tests/fixtures/rsa_pkcs8.key");
    const EC_SEC1: &str = include_str!("../../tests/fixtures/ec_sec1.key");
    const EC_PKCS8: &str = include_str!("../../tests/fixtures/ec_pkcs8.key");
    const ED25519: &str = include_str!("../../tests/fixtures/ed25519_pkcs8.key");
    const RSA1024_CERT: &str = include_str!("../../tests/fixtures/rsa1024_self_signed.crt");
    const RSA1024_PKCS1: &str = include_str!("../../tests/fixtures/rsa1024_pkcs1.key");
    const P521_CERT: &str = include_str!("../../tests/fixtures/ec_p521_self_signed.crt");
    const P521_SEC1: &str = include_str!("../../tests/fixtures/ec_p521_sec1.key");
    const P521_PKCS8: &str = include_str!("../../tests/fixtures/ec_p521_pkcs8.key");

    fn parse(pem: &str) -> Result<ParsedKey, String> {
        let (block, _) = first_private_key_block(pem);
        parse_private_key(&block.unwrap().contents)
    }

    fn pair(cert_pem: &str, key_pem: &str) -> Result<(), String> {
        let (blocks, _) = certificate_blocks(cert_pem);
        let (_, cert) = x509_parser::parse_x509_certificate(&blocks[0].contents).unwrap();
        verify_key_pair(&cert, &parse(key_pem)?)
    }

    #[test]
    fn test_parse_each_encoding() {
        let key = parse(RSA_PKCS1).unwrap();
        assert_eq!(key.key_type, KeyType::Rsa);
        assert!(matches!(key.der, PrivateKeyDer::Pkcs1(_)));

        let key = parse(RSA_PKCS8).unwrap();
        assert_eq!(key.key_type, KeyType::Rsa);
        assert!(matches!(key.der, PrivateKeyDer::Pkcs8(_)));

        let key = parse(EC_SEC1).unwrap();
        assert_eq!(key.key_type, KeyType::Ecdsa);
        assert!(matches!(key.der, PrivateKeyDer::Sec1(_)));

        let key = parse(EC_PKCS8).unwrap();
        assert_eq!(key.key_type, KeyType::Ecdsa);
        assert!(matches!(key.der, PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn test_parse_keys_ring_cannot_sign_with() {
        let key = parse(RSA1024_PKCS1).unwrap();
        assert_eq!(key.key_type, KeyType::Rsa);
        assert!(any_supported_type(&key.der).is_err());

        let key = parse(P521_SEC1).unwrap();
        assert_eq!(key.key_type, KeyType::Ecdsa);
        assert!(matches!(
            key.public,
            PublicHalf::Ec {
                curve: Curve::P521,
                point: Some(_)
            }
        ));

        // The curve of a wrapped key comes from the algorithm parameters
        let key = parse(P521_PKCS8).unwrap();
        assert_eq!(key.key_type, KeyType::Ecdsa);
        assert!(matches!(key.der, PrivateKeyDer::Pkcs8(_)));
        assert!(matches!(key.public, PublicHalf::Ec { curve: Curve::P521, .. }));
    }

    #[test]
    fn test_pkcs8_of_other_algorithm_is_rejected() {
        let err = parse(ED25519).err().unwrap();
        assert_eq!(err, UNKNOWN_PKCS8_KEY);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = parse_private_key(b"not a key").err().unwrap();
        assert_eq!(err, "tls: failed to parse private key");
        // A well-formed SEQUENCE of the wrong shape
        assert!(parse_private_key(&[0x30, 0x03, 0x02, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_trailing_data_is_rejected() {
        let (block, _) = first_private_key_block(RSA_PKCS1);
        let mut der = block.unwrap().contents;
        der.push(0);
        assert!(parse_private_key(&der).is_err());
    }

    #[test]
    fn test_matching_pairs_verify() {
        pair(RSA_CERT, RSA_PKCS1).unwrap();
        pair(RSA_CERT, RSA_PKCS8).unwrap();
        pair(EC_CERT, EC_SEC1).unwrap();
        pair(EC_CERT, EC_PKCS8).unwrap();
        pair(RSA1024_CERT, RSA1024_PKCS1).unwrap();
        pair(P521_CERT, P521_SEC1).unwrap();
        pair(P521_CERT, P521_PKCS8).unwrap();
    }

    #[test]
    fn test_mismatched_pairs_fail() {
        assert_eq!(pair(RSA_CERT, EC_SEC1).unwrap_err(), TYPE_MISMATCH);
        assert_eq!(pair(EC_CERT, RSA_PKCS1).unwrap_err(), TYPE_MISMATCH);
        assert_eq!(pair(EC_CERT, P521_SEC1).unwrap_err(), TYPE_MISMATCH);
        assert_eq!(pair(RSA_CERT, RSA1024_PKCS1).unwrap_err(), KEY_MISMATCH);
        assert_eq!(pair(RSA1024_CERT, RSA_PKCS1).unwrap_err(), KEY_MISMATCH);
    }

    #[test]
    fn test_trim_leading_zeros() {
        assert_eq!(trim_leading_zeros(&[0, 0, 1, 0]), &[1, 0]);
        assert_eq!(trim_leading_zeros(&[0, 0]), &[] as &[u8]);
    }
}
