//! PEM block decoding.

use x509_parser::pem::Pem;

/// Label of certificate blocks.
const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Decodes every PEM block in `text`, in order.
///
/// Text between blocks is ignored. Decoding stops at the first malformed
/// block, the blocks before it are kept.
pub(crate) fn decode_blocks(text: &str) -> Vec<Pem> {
    let mut blocks = Vec::new();
    for block in Pem::iter_from_buffer(text.as_bytes()) {
        match block {
            Ok(pem) => blocks.push(pem),
            Err(e) => {
                log::debug!("Stopped decoding PEM input at malformed block: {e}");
                break;
            }
        }
    }
    blocks
}

/// Splits PEM blocks into certificate blocks and the labels of everything else.
pub(crate) fn certificate_blocks(text: &str) -> (Vec<Pem>, Vec<String>) {
    let mut certs = Vec::new();
    let mut skipped = Vec::new();
    for block in decode_blocks(text) {
        if block.label == CERTIFICATE_LABEL {
            certs.push(block);
        } else {
            skipped.push(block.label);
        }
    }
    (certs, skipped)
}

/// Returns `true` for labels such as `PRIVATE KEY`, `RSA PRIVATE KEY` or `EC PRIVATE KEY`.
fn is_private_key_label(label: &str) -> bool {
    label == "PRIVATE KEY" || label.ends_with(" PRIVATE KEY")
}

/// Finds the first private key block, ignoring everything else.
///
/// Returns the key block (if any) and the labels skipped before it.
pub(crate) fn first_private_key_block(text: &str) -> (Option<Pem>, Vec<String>) {
    let mut skipped = Vec::new();
    for block in decode_blocks(text) {
        if is_private_key_label(&block.label) {
            return (Some(block), skipped);
        }
        skipped.push(block.label);
    }
    (None, skipped)
}
