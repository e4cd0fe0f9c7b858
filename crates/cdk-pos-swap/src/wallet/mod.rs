//! Wallets
//!
//! The merchant's trusted wallet is an external collaborator reached through
//! [`TrustedWallet`]. Unknown mints are only ever touched through a
//! [`TemporaryMintWallet`] created for a single swap.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::amount::Satoshis;
use crate::error::WalletResult;
use crate::mint_url::MintUrl;
use crate::nuts::KeySetInfo;
use crate::types::{MeltQuoteResult, MeltResult, MintQuoteResult, MintResult};

mod guard;
pub mod mint_connector;
#[cfg(feature = "http")]
mod temporary;

pub use guard::TemporaryWalletGuard;
pub use mint_connector::MintConnector;
#[cfg(feature = "http")]
pub use mint_connector::HttpClient;
#[cfg(feature = "http")]
pub use temporary::{EphemeralWallet, EphemeralWalletFactory};

/// Single mint wallet living for the duration of one swap
#[async_trait]
pub trait TemporaryMintWallet: Debug + Send + Sync {
    /// Mint this wallet is bound to
    fn mint_url(&self) -> &MintUrl;

    /// Load the mint's keysets
    ///
    /// Must succeed before a token from this mint can be melted.
    async fn refresh_keysets(&self) -> WalletResult<Vec<KeySetInfo>>;

    /// Ask the mint what paying `bolt11` would cost
    async fn request_melt_quote(&self, bolt11: &str) -> WalletResult<MeltQuoteResult>;

    /// Receive `token` and melt it against `quote_id`
    async fn melt_with_token(&self, quote_id: &str, token: &str) -> WalletResult<MeltResult>;

    /// Release all wallet state
    ///
    /// Idempotent. Every later call fails with
    /// [`WalletError::NotInitialized`](crate::WalletError::NotInitialized).
    fn close(&self);
}

/// Creates [`TemporaryMintWallet`]s
#[async_trait]
pub trait TemporaryMintWalletFactory: Debug + Send + Sync {
    /// New isolated wallet for `mint_url`
    async fn create_temporary_wallet(
        &self,
        mint_url: &str,
    ) -> WalletResult<Box<dyn TemporaryMintWallet>>;
}

/// The merchant's wallet at its trusted mints
#[async_trait]
pub trait TrustedWallet: Debug + Send + Sync {
    /// Request a mint quote, the returned bolt11 pays into the wallet
    async fn request_mint_quote(
        &self,
        mint_url: &MintUrl,
        amount: Satoshis,
    ) -> WalletResult<MintQuoteResult>;

    /// Current state of a mint quote
    async fn check_mint_quote(
        &self,
        mint_url: &MintUrl,
        quote_id: &str,
    ) -> WalletResult<MintQuoteResult>;

    /// Mint ecash for a paid quote
    async fn mint(&self, mint_url: &MintUrl, quote_id: &str) -> WalletResult<MintResult>;
}

/// Access to trusted and temporary wallets
pub trait WalletManager: TemporaryMintWalletFactory {
    /// Trusted wallet, `None` until it is set up
    fn trusted_wallet(&self) -> Option<Arc<dyn TrustedWallet>>;
}

/// [`WalletManager`] over an optional trusted wallet and a temporary wallet factory
#[derive(Debug, Clone)]
pub struct CashuWalletManager {
    trusted: Option<Arc<dyn TrustedWallet>>,
    factory: Arc<dyn TemporaryMintWalletFactory>,
}

impl CashuWalletManager {
    /// Create new [`CashuWalletManager`]
    pub fn new(
        trusted: Option<Arc<dyn TrustedWallet>>,
        factory: Arc<dyn TemporaryMintWalletFactory>,
    ) -> Self {
        Self { trusted, factory }
    }
}

#[async_trait]
impl TemporaryMintWalletFactory for CashuWalletManager {
    async fn create_temporary_wallet(
        &self,
        mint_url: &str,
    ) -> WalletResult<Box<dyn TemporaryMintWallet>> {
        self.factory.create_temporary_wallet(mint_url).await
    }
}

impl WalletManager for CashuWalletManager {
    fn trusted_wallet(&self) -> Option<Arc<dyn TrustedWallet>> {
        self.trusted.clone()
    }
}
