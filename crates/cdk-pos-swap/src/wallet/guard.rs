//! Scoped ownership of a temporary wallet

use std::fmt;
use std::ops::Deref;

use super::TemporaryMintWallet;

/// Closes the wrapped [`TemporaryMintWallet`] exactly once
///
/// Either through [`TemporaryWalletGuard::close`] or when dropped, which
/// covers early returns, panics and cancelled futures.
pub struct TemporaryWalletGuard {
    wallet: Box<dyn TemporaryMintWallet>,
    closed: bool,
}

impl fmt::Debug for TemporaryWalletGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryWalletGuard")
            .field("mint_url", self.wallet.mint_url())
            .field("closed", &self.closed)
            .finish()
    }
}

impl TemporaryWalletGuard {
    /// Take ownership of `wallet`
    pub fn new(wallet: Box<dyn TemporaryMintWallet>) -> Self {
        Self {
            wallet,
            closed: false,
        }
    }

    /// Close the wallet now
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;
        tracing::debug!("Closing temporary wallet for {}", self.wallet.mint_url());
        self.wallet.close();
    }
}

impl Deref for TemporaryWalletGuard {
    type Target = dyn TemporaryMintWallet;

    fn deref(&self) -> &Self::Target {
        self.wallet.as_ref()
    }
}

impl Drop for TemporaryWalletGuard {
    fn drop(&mut self) {
        self.release();
    }
}
