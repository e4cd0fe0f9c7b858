//! Unknown-mint swap for Cashu point of sale
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod amount;
pub mod bech32;
pub mod bolt11;
pub mod config;
pub mod dhke;
pub mod error;
pub mod history;
pub mod invoice;
pub mod mint_manager;
pub mod mint_url;
pub mod nuts;
pub mod swap;
pub mod types;
pub mod util;
pub mod wallet;

#[cfg(test)]
mod test_utils;

#[doc(hidden)]
pub use bitcoin::secp256k1;

pub use self::amount::Satoshis;
pub use self::error::{WalletError, WalletResult};
pub use self::history::{MemoryPaymentHistory, PaymentHistory, SwapFrame};
pub use self::invoice::{LightningInvoice, LightningInvoiceProvider};
pub use self::mint_manager::{MintManager, StaticMintManager};
pub use self::mint_url::MintUrl;
pub use self::swap::{PaymentContext, SwapCoordinator, SwapError, SwapResult};
pub use self::types::QuoteStatus;
pub use self::util::SECP256K1;

/// Ensure condition is true, otherwise return the error
#[macro_export]
macro_rules! ensure_swap {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
