//! Payment history
//!
//! Lookup and persistence of the Lightning invoice reused across attempts
//! of one payment, and of the swap frame an operator needs to reconcile a
//! swap that got stuck.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::invoice::LightningInvoice;

/// Payment history Error
#[derive(Debug, Error)]
pub enum Error {
    /// No pending payment with this id
    #[error("Payment `{0}` not found")]
    PaymentNotFound(String),
    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),
    /// Serde Json error
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

/// Record of a swap in flight, keyed by payment id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapFrame {
    /// Mint the incoming token is from
    pub unknown_mint_url: String,
    /// Melt quote at the unknown mint
    pub melt_quote_id: String,
    /// Trusted mint receiving the Lightning payment
    pub lightning_mint_url: String,
    /// Mint quote at the trusted mint
    pub lightning_quote_id: String,
}

impl SwapFrame {
    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Payment history store
#[async_trait]
pub trait PaymentHistory: Debug + Send + Sync {
    /// Invoice stored for `payment_id`, if any
    async fn find_lightning_invoice(
        &self,
        payment_id: &str,
    ) -> Result<Option<LightningInvoice>, Error>;

    /// Store the invoice created for `payment_id`
    async fn update_pending_with_lightning_info(
        &self,
        payment_id: &str,
        invoice: &LightningInvoice,
    ) -> Result<(), Error>;

    /// Store the swap frame of `payment_id`
    async fn record_swap_frame(&self, payment_id: &str, frame: &SwapFrame) -> Result<(), Error>;
}

#[derive(Debug, Clone, Default)]
struct PaymentRecord {
    invoice: Option<LightningInvoice>,
    swap_frame: Option<String>,
}

/// In memory [`PaymentHistory`]
#[derive(Debug, Default)]
pub struct MemoryPaymentHistory {
    payments: Mutex<HashMap<String, PaymentRecord>>,
}

impl MemoryPaymentHistory {
    /// Swap frame recorded for `payment_id`
    pub fn swap_frame(&self, payment_id: &str) -> Result<Option<SwapFrame>, Error> {
        let payments = self.payments.lock();
        payments
            .get(payment_id)
            .and_then(|record| record.swap_frame.as_deref())
            .map(SwapFrame::from_json)
            .transpose()
    }
}

#[async_trait]
impl PaymentHistory for MemoryPaymentHistory {
    async fn find_lightning_invoice(
        &self,
        payment_id: &str,
    ) -> Result<Option<LightningInvoice>, Error> {
        Ok(self
            .payments
            .lock()
            .get(payment_id)
            .and_then(|record| record.invoice.clone()))
    }

    async fn update_pending_with_lightning_info(
        &self,
        payment_id: &str,
        invoice: &LightningInvoice,
    ) -> Result<(), Error> {
        self.payments
            .lock()
            .entry(payment_id.to_string())
            .or_default()
            .invoice = Some(invoice.clone());
        Ok(())
    }

    async fn record_swap_frame(&self, payment_id: &str, frame: &SwapFrame) -> Result<(), Error> {
        let json = frame.to_json()?;
        self.payments
            .lock()
            .entry(payment_id.to_string())
            .or_default()
            .swap_frame = Some(json);
        Ok(())
    }
}
