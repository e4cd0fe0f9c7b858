//! NUT-00: Notation and Models
//!
//! <https://github.com/cashubtc/nuts/blob/main/00.md>

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::nut01::PublicKey;
use super::nut02::Id;
use crate::amount::Satoshis;

pub mod token;

pub use token::{Token, TokenV3, TokenV4};

/// List of [Proof]
pub type Proofs = Vec<Proof>;

/// Blinded Message (also called `output`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedMessage {
    /// Amount
    ///
    /// Zero for NUT-08 blank outputs, the mint picks the value.
    pub amount: Satoshis,
    /// Keyset ID
    #[serde(rename = "id")]
    pub keyset_id: Id,
    /// Blinded secret message (B_)
    #[serde(rename = "B_")]
    pub blinded_secret: PublicKey,
}

/// Blind Signature (also called `promise`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    /// Amount
    pub amount: Satoshis,
    /// Keyset ID
    #[serde(rename = "id")]
    pub keyset_id: Id,
    /// Blinded signature (C_)
    #[serde(rename = "C_")]
    pub c: PublicKey,
}

/// Proof
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Amount
    pub amount: Satoshis,
    /// `Keyset id`
    #[serde(rename = "id")]
    pub keyset_id: Id,
    /// Secret message
    pub secret: String,
    /// Unblinded signature
    #[serde(rename = "C")]
    pub c: PublicKey,
    /// Witness
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<String>,
}

impl PartialEq for Proof {
    fn eq(&self, other: &Self) -> bool {
        self.secret == other.secret
    }
}

impl Hash for Proof {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.secret.hash(state);
    }
}

/// Total value of proofs
pub fn proofs_total(proofs: &[Proof]) -> Result<Satoshis, crate::amount::Error> {
    Satoshis::try_sum(proofs.iter().map(|p| p.amount))
}
