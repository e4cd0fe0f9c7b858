//! Errors

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::amount::Satoshis;
use crate::types::QuoteStatus;

/// Wallet Error
///
/// Returned by every trusted and temporary wallet operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Wallet is closed or was never set up
    #[error("Wallet not initialized")]
    NotInitialized,
    /// Mint url could not be parsed
    #[error("Invalid mint url `{url}`: {reason}")]
    InvalidMintUrl {
        /// Url as given
        url: String,
        /// Parse failure
        reason: String,
    },
    /// Mint could not be reached or answered with a protocol error
    #[error("Mint `{mint_url}` unreachable: {reason}")]
    MintUnreachable {
        /// Mint url
        mint_url: String,
        /// Failure
        reason: String,
    },
    /// Quote not known to the mint
    #[error("Quote `{quote_id}` not found")]
    QuoteNotFound {
        /// Quote id
        quote_id: String,
    },
    /// Quote expired
    #[error("Quote `{quote_id}` expired")]
    QuoteExpired {
        /// Quote id
        quote_id: String,
    },
    /// Quote is not in the expected state
    #[error("Quote `{quote_id}` is {actual}, expected {expected}")]
    InvalidQuoteState {
        /// Quote id
        quote_id: String,
        /// Expected state
        expected: QuoteStatus,
        /// Actual state
        actual: QuoteStatus,
    },
    /// Not enough funds
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Required amount
        required: Satoshis,
        /// Available amount
        available: Satoshis,
    },
    /// Token could not be decoded or does not belong to the mint
    #[error("Invalid token: {reason}")]
    InvalidToken {
        /// Failure
        reason: String,
    },
    /// Proofs already spent
    #[error("Token already spent")]
    TokenAlreadySpent,
    /// Proofs rejected by the mint
    #[error("Invalid proofs: {reason}")]
    InvalidProofs {
        /// Failure
        reason: String,
    },
    /// Melt failed
    #[error("Melt of quote `{quote_id}` failed: {reason}")]
    MeltFailed {
        /// Quote id
        quote_id: String,
        /// Failure
        reason: String,
    },
    /// Mint failed
    #[error("Mint of quote `{quote_id}` failed: {reason}")]
    MintFailed {
        /// Quote id
        quote_id: String,
        /// Failure
        reason: String,
    },
    /// Network error
    #[error("Network error: {reason}")]
    NetworkError {
        /// Failure
        reason: String,
    },
    /// Unknown error
    #[error("Unknown error: {reason}")]
    Unknown {
        /// Failure
        reason: String,
    },
}

/// Wallet Result
pub type WalletResult<T> = Result<T, WalletError>;

/// CDK Error Response
///
/// See NUT definition in [00](https://github.com/cashubtc/nuts/blob/main/00.md)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error Code
    pub code: ErrorCode,
    /// Human readable description
    #[serde(default)]
    pub detail: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: {}, detail: {}", self.code, self.detail)
    }
}

impl ErrorResponse {
    /// Create new [`ErrorResponse`]
    pub fn new(code: ErrorCode, detail: String) -> Self {
        Self { code, detail }
    }

    /// Error response from json
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(json)?;

        Self::from_value(value)
    }

    /// Error response from json Value
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match serde_json::from_value::<ErrorResponse>(value.clone()) {
            Ok(res) => Ok(res),
            Err(_) => Ok(Self {
                code: ErrorCode::Unknown(999),
                detail: value.to_string(),
            }),
        }
    }
}

/// Possible Error Codes
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ErrorCode {
    /// Proof verification failed (10001)
    TokenNotVerified,
    /// Proofs already spent (11001)
    TokenAlreadySpent,
    /// Proofs are pending (11002)
    TokenPending,
    /// Transaction is not balanced (11005)
    TransactionUnbalanced,
    /// Unit in request is not supported (11013)
    UnsupportedUnit,
    /// Keyset is not known (12001)
    KeysetNotFound,
    /// Keyset is inactive, cannot sign messages (12002)
    KeysetInactive,
    /// Quote request is not paid (20001)
    QuoteNotPaid,
    /// Lightning payment failed (20004)
    LightningError,
    /// Quote is pending (20005)
    QuotePending,
    /// Invoice already paid (20006)
    InvoiceAlreadyPaid,
    /// Quote is expired (20007)
    QuoteExpired,
    /// Unknown error code
    Unknown(u16),
}

impl ErrorCode {
    /// Error code from u16
    pub fn from_code(code: u16) -> Self {
        match code {
            10001 => Self::TokenNotVerified,
            11001 => Self::TokenAlreadySpent,
            11002 => Self::TokenPending,
            11005 => Self::TransactionUnbalanced,
            11013 => Self::UnsupportedUnit,
            12001 => Self::KeysetNotFound,
            12002 => Self::KeysetInactive,
            20001 => Self::QuoteNotPaid,
            20004 => Self::LightningError,
            20005 => Self::QuotePending,
            20006 => Self::InvoiceAlreadyPaid,
            20007 => Self::QuoteExpired,
            _ => Self::Unknown(code),
        }
    }

    /// Error code to u16
    pub fn to_code(&self) -> u16 {
        match self {
            Self::TokenNotVerified => 10001,
            Self::TokenAlreadySpent => 11001,
            Self::TokenPending => 11002,
            Self::TransactionUnbalanced => 11005,
            Self::UnsupportedUnit => 11013,
            Self::KeysetNotFound => 12001,
            Self::KeysetInactive => 12002,
            Self::QuoteNotPaid => 20001,
            Self::LightningError => 20004,
            Self::QuotePending => 20005,
            Self::InvoiceAlreadyPaid => 20006,
            Self::QuoteExpired => 20007,
            Self::Unknown(code) => *code,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.to_code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u16::deserialize(deserializer)?;

        Ok(ErrorCode::from_code(code))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_code())
    }
}
