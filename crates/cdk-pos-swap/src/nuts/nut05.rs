//! NUT-05: Melting Tokens
//!
//! <https://github.com/cashubtc/nuts/blob/main/05.md>

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::nut00::{BlindSignature, BlindedMessage, Proofs};
use crate::amount::Satoshis;
use crate::types::{MeltQuoteResult, QuoteStatus};

/// Melt quote request [NUT-05]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteBolt11Request {
    /// Bolt11 invoice to be paid
    pub request: String,
    /// Unit wallet would like to pay with
    pub unit: String,
}

/// Possible states of a melt quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeltQuoteState {
    /// Quote has not been paid
    Unpaid,
    /// Quote has been paid
    Paid,
    /// Paying quote is in progress
    Pending,
    /// Payment failed
    Failed,
    /// Unknown state
    #[default]
    Unknown,
}

impl fmt::Display for MeltQuoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "UNPAID"),
            Self::Paid => write!(f, "PAID"),
            Self::Pending => write!(f, "PENDING"),
            Self::Failed => write!(f, "FAILED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for MeltQuoteState {
    type Err = std::convert::Infallible;

    fn from_str(state: &str) -> Result<Self, Self::Err> {
        Ok(match state {
            "UNPAID" => Self::Unpaid,
            "PAID" => Self::Paid,
            "PENDING" => Self::Pending,
            "FAILED" => Self::Failed,
            _ => Self::Unknown,
        })
    }
}

impl Serialize for MeltQuoteState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MeltQuoteState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let state = String::deserialize(deserializer)?;
        Ok(Self::from_str(&state).unwrap_or_default())
    }
}

impl From<MeltQuoteState> for QuoteStatus {
    fn from(state: MeltQuoteState) -> Self {
        match state {
            MeltQuoteState::Unpaid => QuoteStatus::Unpaid,
            MeltQuoteState::Paid => QuoteStatus::Paid,
            MeltQuoteState::Pending => QuoteStatus::Pending,
            MeltQuoteState::Failed | MeltQuoteState::Unknown => QuoteStatus::Unknown,
        }
    }
}

/// Melt quote response [NUT-05]
///
/// Returned by the quote endpoints and by the melt itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteBolt11Response {
    /// Quote Id
    pub quote: String,
    /// The amount that needs to be provided
    pub amount: Satoshis,
    /// The fee reserve that is required
    pub fee_reserve: Satoshis,
    /// Quote State
    #[serde(default)]
    pub state: MeltQuoteState,
    /// Deprecated paid flag of older mints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid: Option<bool>,
    /// Unix timestamp until the quote is valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
    /// Payment preimage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_preimage: Option<String>,
    /// Change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<Vec<BlindSignature>>,
}

impl MeltQuoteBolt11Response {
    /// Quote state, falling back to the `paid` flag when no state is sent
    pub fn quote_state(&self) -> MeltQuoteState {
        match (self.state, self.paid) {
            (MeltQuoteState::Unknown, Some(true)) => MeltQuoteState::Paid,
            (MeltQuoteState::Unknown, Some(false)) => MeltQuoteState::Unpaid,
            (state, _) => state,
        }
    }

    /// Total change returned
    pub fn change_amount(&self) -> Option<Satoshis> {
        self.change
            .as_ref()
            .and_then(|c| Satoshis::try_sum(c.iter().map(|b| b.amount)).ok())
    }
}

impl From<&MeltQuoteBolt11Response> for MeltQuoteResult {
    fn from(response: &MeltQuoteBolt11Response) -> Self {
        Self {
            quote_id: response.quote.clone(),
            amount: response.amount,
            fee_reserve: response.fee_reserve,
            status: response.quote_state().into(),
            expiry: response.expiry,
        }
    }
}

/// Melt Request [NUT-05]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltRequest {
    /// Quote ID
    pub quote: String,
    /// Proofs
    pub inputs: Proofs,
    /// Blinded Message that can be used to return change [NUT-08]
    /// Amount field of BlindedMessages `SHOULD` be set to zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<BlindedMessage>>,
}

impl MeltRequest {
    /// Create new [`MeltRequest`]
    pub fn new(quote: String, inputs: Proofs, outputs: Option<Vec<BlindedMessage>>) -> Self {
        Self {
            quote,
            inputs,
            outputs,
        }
    }
}
