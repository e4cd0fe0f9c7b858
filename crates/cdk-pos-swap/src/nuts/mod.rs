//! Nuts
//!
//! The subset of the Cashu protocol a melt-only wallet needs.
//! See all at <https://github.com/cashubtc/nuts>

use thiserror::Error;

pub mod nut00;
pub mod nut01;
pub mod nut02;
pub mod nut05;
pub mod nut08;

pub use nut00::{BlindSignature, BlindedMessage, Proof, Proofs, Token, TokenV3, TokenV4};
pub use nut01::{Keys, PublicKey, SecretKey};
pub use nut02::{Id, KeySet, KeySetInfo, KeysResponse, KeysetResponse};
pub use nut05::{MeltQuoteBolt11Request, MeltQuoteBolt11Response, MeltQuoteState, MeltRequest};

/// Nuts Error
#[derive(Debug, Error)]
pub enum Error {
    /// Unsupported token
    #[error("Unsupported token")]
    UnsupportedToken,
    /// Proofs in token span more than one mint
    #[error("Multi mint token not supported")]
    MultiMintTokenNotSupported,
    /// Duplicate proofs in token
    #[error("Duplicate proofs in token")]
    DuplicateProofs,
    /// Keyset id is malformed
    #[error("Invalid keyset id")]
    InvalidKeysetId,
    /// Keyset not known to the mint
    #[error("Keyset id not known: `{0}`")]
    KeysetUnknown(String),
    /// Hex error
    #[error("Hex error: {0}")]
    Hex(String),
    /// Amount error
    #[error(transparent)]
    Amount(#[from] crate::amount::Error),
    /// Secp256k1 error
    #[error(transparent)]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
    /// Base64 error
    #[error(transparent)]
    Base64Error(#[from] bitcoin::base64::DecodeError),
    /// Utf8 parse error
    #[error(transparent)]
    Utf8ParseError(#[from] std::string::FromUtf8Error),
    /// Serde Json error
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
    /// Ciborium deserialization error
    #[error(transparent)]
    CiboriumError(#[from] ciborium::de::Error<std::io::Error>),
}
