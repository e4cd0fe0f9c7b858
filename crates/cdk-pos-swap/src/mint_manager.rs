//! Merchant mint configuration

use std::fmt::Debug;

use crate::config::Settings;
use crate::mint_url::MintUrl;

/// Merchant mint configuration lookup
pub trait MintManager: Debug + Send + Sync {
    /// Trusted mint that issues Lightning invoices, if configured
    fn preferred_lightning_mint(&self) -> Option<MintUrl>;
}

/// [`MintManager`] with a fixed preferred mint
#[derive(Debug, Clone, Default)]
pub struct StaticMintManager {
    preferred_lightning_mint: Option<MintUrl>,
}

impl StaticMintManager {
    /// Create new [`StaticMintManager`]
    pub fn new(preferred_lightning_mint: Option<MintUrl>) -> Self {
        Self {
            preferred_lightning_mint,
        }
    }

    /// Preferred mint from [`Settings`]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.lightning.preferred_mint.clone())
    }
}

impl MintManager for StaticMintManager {
    fn preferred_lightning_mint(&self) -> Option<MintUrl> {
        self.preferred_lightning_mint.clone()
    }
}
