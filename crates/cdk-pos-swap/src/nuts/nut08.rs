//! NUT-08: Lightning fee return
//!
//! <https://github.com/cashubtc/nuts/blob/main/08.md>

use bitcoin::secp256k1::hashes::{hmac, sha256, Hash, HashEngine, HmacEngine};
use bitcoin::hex::DisplayHex;
use tracing::instrument;

use super::nut00::BlindedMessage;
use super::nut01::SecretKey;
use super::nut02::Id;
use crate::amount::Satoshis;
use crate::dhke::{self, blind_message};

/// Number of blank outputs needed to receive up to `overpaid` in change
///
/// Zero when nothing can be returned.
pub fn blank_output_count(overpaid: Satoshis) -> u32 {
    if overpaid.is_zero() {
        return 0;
    }

    ((overpaid.value() as f64).log2().ceil() as u64).max(1) as u32
}

/// Secret and blinding factor of one output, kept to unblind the signature
#[derive(Debug, Clone)]
pub struct PreMint {
    /// Blinded message sent to the mint
    pub blinded_message: BlindedMessage,
    /// Secret
    pub secret: String,
    /// Blinding factor
    pub r: SecretKey,
}

/// Prepared outputs
#[derive(Debug, Clone, Default)]
pub struct PreMintSecrets {
    /// Outputs in the order sent to the mint
    pub secrets: Vec<PreMint>,
}

impl PreMintSecrets {
    /// Blank outputs for up to `overpaid` change, derived from `seed` starting at `counter`
    #[instrument(skip(seed))]
    pub fn from_seed_blank(
        keyset_id: &Id,
        counter: u32,
        seed: &[u8; 64],
        overpaid: Satoshis,
    ) -> Result<Self, dhke::Error> {
        let count = blank_output_count(overpaid);
        let mut secrets = Vec::with_capacity(count as usize);

        for counter in counter..counter + count {
            let secret = derive_secret(seed, keyset_id, counter);
            let blinding_factor = derive_blinding_factor(seed, keyset_id, counter)?;

            let (blinded, r) = blind_message(secret.as_bytes(), Some(blinding_factor))?;

            secrets.push(PreMint {
                blinded_message: BlindedMessage {
                    amount: Satoshis::ZERO,
                    keyset_id: keyset_id.clone(),
                    blinded_secret: blinded,
                },
                secret,
                r,
            });
        }

        Ok(Self { secrets })
    }

    /// Blinded messages
    pub fn blinded_messages(&self) -> Vec<BlindedMessage> {
        self.secrets
            .iter()
            .map(|pm| pm.blinded_message.clone())
            .collect()
    }

    /// Secrets
    pub fn secrets(&self) -> Vec<String> {
        self.secrets.iter().map(|pm| pm.secret.clone()).collect()
    }

    /// Blinding factors
    pub fn rs(&self) -> Vec<SecretKey> {
        self.secrets.iter().map(|pm| pm.r.clone()).collect()
    }

    /// Number of outputs
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// No outputs
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

fn kdf(seed: &[u8; 64], keyset_id: &Id, counter: u32, domain: u8) -> [u8; 32] {
    let mut message = Vec::new();
    message.extend_from_slice(b"Cashu_KDF_HMAC_SHA256");
    message.extend_from_slice(&keyset_id.to_bytes());
    message.extend_from_slice(&(counter as u64).to_be_bytes());
    message.push(domain);

    let mut engine = HmacEngine::<sha256::Hash>::new(seed);
    engine.input(&message);
    hmac::Hmac::<sha256::Hash>::from_engine(engine).to_byte_array()
}

fn derive_secret(seed: &[u8; 64], keyset_id: &Id, counter: u32) -> String {
    kdf(seed, keyset_id, counter, 0x00).to_lower_hex_string()
}

fn derive_blinding_factor(
    seed: &[u8; 64],
    keyset_id: &Id,
    counter: u32,
) -> Result<SecretKey, dhke::Error> {
    Ok(SecretKey::from(bitcoin::secp256k1::SecretKey::from_slice(
        &kdf(seed, keyset_id, counter, 0x01),
    )?))
}
