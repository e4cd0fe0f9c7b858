//! BOLT11 payment hash extraction and preimage verification
//!
//! Only the tagged field stream is walked, looking for the payment hash
//! (`p`). The signature, expiry and every other tag are ignored.

use bitcoin::hashes::{sha256, Hash};
use bitcoin::hex::FromHex;
use thiserror::Error;

use crate::bech32::{self, convert_bits};

/// Optional URI scheme in front of an invoice
const LIGHTNING_SCHEME: &str = "lightning:";
/// Signature (64 bytes) and recovery id (1 byte) as 5-bit groups
const SIGNATURE_GROUPS: usize = 104;
/// 35-bit timestamp as 5-bit groups
const TIMESTAMP_GROUPS: usize = 7;
/// Tag (1 group) and data length (2 groups)
const FIELD_HEADER_GROUPS: usize = 3;
/// `p` in the bech32 alphabet
const PAYMENT_HASH_TAG: u8 = 1;

/// Bolt11 Error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Empty or otherwise unusable invoice string
    #[error("Invalid invoice")]
    InvalidInvoice,
    /// Bech32 decoding failed
    #[error(transparent)]
    Bech32(#[from] bech32::Error),
    /// Payload shorter than signature and timestamp
    #[error("Invoice too short")]
    InvoiceTooShort,
    /// Tagged field runs past the end of the payload
    #[error("Truncated tagged field")]
    TruncatedField,
    /// Payment hash field is not 32 bytes
    #[error("Malformed payment hash")]
    MalformedPaymentHash,
    /// No payment hash field
    #[error("Payment hash missing")]
    PaymentHashMissing,
    /// Preimage is not valid hex
    #[error("Invalid preimage: {0}")]
    InvalidPreimage(String),
    /// Hash of the preimage differs from the invoice payment hash
    #[error("Preimage does not match invoice payment hash")]
    PreimageMismatch,
}

/// Extract the 32-byte payment hash from a BOLT11 invoice
///
/// Accepts upper or lower case and an optional `lightning:` prefix.
pub fn extract_payment_hash(invoice: &str) -> Result<[u8; 32], Error> {
    let normalized = invoice.trim().to_lowercase();
    let normalized = normalized
        .strip_prefix(LIGHTNING_SCHEME)
        .unwrap_or(normalized.as_str());

    if normalized.is_empty() {
        return Err(Error::InvalidInvoice);
    }

    let decoded = bech32::decode(normalized)?;

    if decoded.data.len() < SIGNATURE_GROUPS + TIMESTAMP_GROUPS {
        return Err(Error::InvoiceTooShort);
    }

    let fields = &decoded.data[TIMESTAMP_GROUPS..decoded.data.len() - SIGNATURE_GROUPS];

    let mut pos = 0;
    while pos < fields.len() {
        if pos + FIELD_HEADER_GROUPS > fields.len() {
            return Err(Error::TruncatedField);
        }

        let tag = fields[pos];
        let len = (usize::from(fields[pos + 1]) << 5) | usize::from(fields[pos + 2]);
        let start = pos + FIELD_HEADER_GROUPS;
        let end = start + len;

        if end > fields.len() {
            return Err(Error::TruncatedField);
        }

        if tag == PAYMENT_HASH_TAG {
            let bytes = convert_bits(&fields[start..end], 5, 8, false)
                .map_err(|_| Error::MalformedPaymentHash)?;

            return bytes
                .try_into()
                .map_err(|_| Error::MalformedPaymentHash);
        }

        pos = end;
    }

    Err(Error::PaymentHashMissing)
}

/// Check that `SHA256(preimage)` equals the payment hash of `invoice`
pub fn verify_preimage(preimage_hex: &str, invoice: &str) -> Result<(), Error> {
    let payment_hash = extract_payment_hash(invoice)?;

    let preimage = Vec::<u8>::from_hex(preimage_hex.trim())
        .map_err(|e| Error::InvalidPreimage(e.to_string()))?;

    let hash = sha256::Hash::hash(&preimage);

    if hash.to_byte_array() != payment_hash {
        return Err(Error::PreimageMismatch);
    }

    Ok(())
}
