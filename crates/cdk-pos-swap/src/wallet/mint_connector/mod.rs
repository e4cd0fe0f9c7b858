//! Mint connector
//!
//! The endpoints a melt-only wallet talks to.

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{ErrorCode, ErrorResponse, WalletError};
use crate::mint_url::{self, MintUrl};
use crate::nuts::{
    Id, KeySet, KeysetResponse, MeltQuoteBolt11Request, MeltQuoteBolt11Response, MeltRequest,
};

#[cfg(feature = "http")]
pub mod http_client;

#[cfg(feature = "http")]
pub use http_client::HttpClient;

/// Mint connector Error
#[derive(Debug, Error)]
pub enum Error {
    /// Transport error, with the HTTP status if one was received
    #[error("HTTP error: {1}")]
    HttpError(Option<u16>, String),
    /// Error returned by the mint
    #[error("Mint error: {0}")]
    ErrorResponse(ErrorResponse),
    /// Keys response did not contain the requested keyset
    #[error("Keyset `{0}` not in keys response")]
    UnknownKeySet(String),
    /// Mint url error
    #[error(transparent)]
    MintUrl(#[from] mint_url::Error),
    /// Serde Json error
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl From<ErrorResponse> for Error {
    fn from(err: ErrorResponse) -> Self {
        Self::ErrorResponse(err)
    }
}

impl Error {
    /// Map to a [`WalletError`]
    ///
    /// Mint error codes with a wallet meaning keep it. Everything else is
    /// reported as the mint being unreachable, or a network error when no
    /// HTTP response was received at all.
    pub fn into_wallet_error(self, mint_url: &MintUrl, quote_id: Option<&str>) -> WalletError {
        let quote_id = quote_id.unwrap_or_default().to_string();

        match self {
            Self::HttpError(None, reason) => WalletError::NetworkError { reason },
            Self::ErrorResponse(response) => match response.code {
                ErrorCode::TokenAlreadySpent => WalletError::TokenAlreadySpent,
                ErrorCode::TokenNotVerified
                | ErrorCode::TokenPending
                | ErrorCode::KeysetNotFound
                | ErrorCode::KeysetInactive
                | ErrorCode::TransactionUnbalanced => WalletError::InvalidProofs {
                    reason: response.to_string(),
                },
                ErrorCode::QuoteExpired => WalletError::QuoteExpired { quote_id },
                ErrorCode::QuotePending => WalletError::InvalidQuoteState {
                    quote_id,
                    expected: crate::types::QuoteStatus::Unpaid,
                    actual: crate::types::QuoteStatus::Pending,
                },
                ErrorCode::InvoiceAlreadyPaid => WalletError::InvalidQuoteState {
                    quote_id,
                    expected: crate::types::QuoteStatus::Unpaid,
                    actual: crate::types::QuoteStatus::Paid,
                },
                ErrorCode::LightningError => WalletError::MeltFailed {
                    quote_id,
                    reason: response.to_string(),
                },
                _ if response.detail.to_lowercase().contains("not found") => {
                    WalletError::QuoteNotFound { quote_id }
                }
                _ => WalletError::Unknown {
                    reason: response.to_string(),
                },
            },
            err => WalletError::MintUnreachable {
                mint_url: mint_url.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// Interface that connects a wallet to a mint. Typically represents an [`HttpClient`].
#[async_trait]
pub trait MintConnector: Debug + Send + Sync {
    /// Get Keysets [NUT-02]
    async fn get_mint_keysets(&self) -> Result<KeysetResponse, Error>;
    /// Get Keyset Keys [NUT-01]
    async fn get_mint_keyset(&self, keyset_id: &Id) -> Result<KeySet, Error>;
    /// Melt Quote [NUT-05]
    async fn post_melt_quote(
        &self,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error>;
    /// Melt Quote Status
    async fn get_melt_quote_status(&self, quote_id: &str)
        -> Result<MeltQuoteBolt11Response, Error>;
    /// Melt [NUT-05]
    /// [Nut-08] Lightning fee return if outputs defined
    async fn post_melt(&self, request: MeltRequest) -> Result<MeltQuoteBolt11Response, Error>;
}
