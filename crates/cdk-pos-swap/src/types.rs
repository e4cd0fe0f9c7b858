//! Wallet result types shared by the trusted and temporary wallets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::Satoshis;

/// Quote status Error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Unknown quote state
    #[error("Unknown quote state: `{0}`")]
    UnknownState(String),
}

/// State of a mint or melt quote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteStatus {
    /// Quote has not been paid
    Unpaid,
    /// Payment is in flight
    Pending,
    /// Quote has been paid
    Paid,
    /// Ecash for the quote has been issued
    Issued,
    /// Quote expired before it was paid
    Expired,
    /// State reported by the mint is not known
    #[default]
    Unknown,
}

impl QuoteStatus {
    /// Quote was paid, possibly already issued
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Paid | Self::Issued)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "UNPAID"),
            Self::Pending => write!(f, "PENDING"),
            Self::Paid => write!(f, "PAID"),
            Self::Issued => write!(f, "ISSUED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for QuoteStatus {
    type Err = Error;

    fn from_str(state: &str) -> Result<Self, Self::Err> {
        match state {
            "UNPAID" => Ok(Self::Unpaid),
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "ISSUED" => Ok(Self::Issued),
            "EXPIRED" => Ok(Self::Expired),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(Error::UnknownState(state.to_string())),
        }
    }
}

/// Melt quote offered by a mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteResult {
    /// Quote id
    pub quote_id: String,
    /// Amount the mint will pay out
    pub amount: Satoshis,
    /// Maximum Lightning fee the mint reserves
    pub fee_reserve: Satoshis,
    /// Quote state
    pub status: QuoteStatus,
    /// Unix timestamp until the quote is valid
    pub expiry: Option<u64>,
}

impl MeltQuoteResult {
    /// Amount plus fee reserve, `None` on overflow
    pub fn total_required(&self) -> Option<Satoshis> {
        self.amount.checked_add(self.fee_reserve)
    }
}

/// Outcome of a melt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltResult {
    /// Final quote state
    pub status: QuoteStatus,
    /// Fee actually paid
    pub fee_paid: Satoshis,
    /// Hex encoded payment preimage
    pub preimage: Option<String>,
    /// Number of change proofs returned by the mint
    pub change_proofs_count: usize,
}

impl MeltResult {
    /// Melt paid the invoice
    pub fn is_paid(&self) -> bool {
        self.status == QuoteStatus::Paid
    }
}

/// Mint quote from the trusted mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuoteResult {
    /// Quote id
    pub quote_id: String,
    /// Bolt11 invoice to pay
    pub bolt11: String,
    /// Amount of the quote
    pub amount: Satoshis,
    /// Quote state
    pub status: QuoteStatus,
    /// Unix timestamp until the quote is valid
    pub expiry: Option<u64>,
}

/// Result of minting ecash against a paid quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintResult {
    /// Number of proofs minted
    pub proofs_count: usize,
    /// Total amount minted
    pub amount: Satoshis,
}
