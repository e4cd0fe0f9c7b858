//! Lightning invoices from the trusted mint

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{WalletError, WalletResult};
use crate::history::PaymentHistory;
use crate::mint_url::MintUrl;
use crate::swap::PaymentContext;
use crate::wallet::WalletManager;

/// Invoice issued by a trusted mint for a mint quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightningInvoice {
    /// Bolt11 invoice
    pub bolt11: String,
    /// Mint quote id
    pub quote_id: String,
    /// Mint that issued the invoice
    pub mint_url: MintUrl,
}

/// Gets or creates the invoice of a payment
///
/// Attempts for the same payment id are serialized so that they all end up
/// with the invoice stored by the first one.
#[derive(Debug)]
pub struct LightningInvoiceProvider {
    wallets: Arc<dyn WalletManager>,
    history: Arc<dyn PaymentHistory>,
    payment_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LightningInvoiceProvider {
    /// Create new [`LightningInvoiceProvider`]
    pub fn new(wallets: Arc<dyn WalletManager>, history: Arc<dyn PaymentHistory>) -> Self {
        Self {
            wallets,
            history,
            payment_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Invoice stored for the payment, or a new one for `context.amount_sats`
    #[instrument(skip(self, context), fields(payment_id = ?context.payment_id))]
    pub async fn get_or_create_invoice(
        &self,
        lightning_mint_url: &str,
        context: &PaymentContext,
    ) -> WalletResult<LightningInvoice> {
        let mint_url = MintUrl::parse_for_wallet(lightning_mint_url)?;

        let Some(payment_id) = context.payment_id.as_deref() else {
            return self.create_invoice(mint_url, context).await;
        };

        let payment_lock = self
            .payment_locks
            .lock()
            .entry(payment_id.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = payment_lock.lock().await;
            self.reuse_or_create(payment_id, mint_url, context).await
        };

        drop(payment_lock);
        self.payment_locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);

        result
    }

    async fn reuse_or_create(
        &self,
        payment_id: &str,
        mint_url: MintUrl,
        context: &PaymentContext,
    ) -> WalletResult<LightningInvoice> {
        match self.history.find_lightning_invoice(payment_id).await {
            Ok(Some(invoice)) => {
                tracing::debug!(
                    "Reusing invoice of quote {} for payment {}",
                    invoice.quote_id,
                    payment_id
                );
                return Ok(invoice);
            }
            Ok(None) => (),
            Err(err) => {
                tracing::warn!("Could not look up invoice of payment {}: {}", payment_id, err);
            }
        }

        let invoice = self.create_invoice(mint_url, context).await?;

        if let Err(err) = self
            .history
            .update_pending_with_lightning_info(payment_id, &invoice)
            .await
        {
            tracing::warn!("Could not store invoice of payment {}: {}", payment_id, err);
        }

        Ok(invoice)
    }

    async fn create_invoice(
        &self,
        mint_url: MintUrl,
        context: &PaymentContext,
    ) -> WalletResult<LightningInvoice> {
        let wallet = self
            .wallets
            .trusted_wallet()
            .ok_or(WalletError::NotInitialized)?;

        let quote = wallet
            .request_mint_quote(&mint_url, context.amount_sats)
            .await?;

        tracing::debug!(
            "Created mint quote {} for {} at {}",
            quote.quote_id,
            context.amount_sats,
            mint_url
        );

        Ok(LightningInvoice {
            bolt11: quote.bolt11,
            quote_id: quote.quote_id,
            mint_url,
        })
    }
}
