//! Swap from an unknown mint
//!
//! The incoming token is melted at the mint that issued it to pay a
//! Lightning invoice of the merchant's trusted mint. The unknown mint is
//! never taken at its word: the swap only succeeds once the preimage it
//! returns hashes to the payment hash of the invoice.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::amount::Satoshis;
use crate::bolt11;
use crate::error::WalletError;
use crate::history::{PaymentHistory, SwapFrame};
use crate::invoice::{LightningInvoice, LightningInvoiceProvider};
use crate::mint_manager::MintManager;
use crate::mint_url::MintUrl;
use crate::types::QuoteStatus;
use crate::wallet::{TemporaryWalletGuard, TrustedWallet, WalletManager};

/// Largest fee reserve the unknown mint may ask for, as a divisor of the
/// expected amount (5%)
pub const FEE_BUFFER_DIVISOR: u64 = 20;

/// Overhead kept on top of the measured fee reserve, as a divisor of the
/// expected amount (1%)
///
/// Rounded up, so the invoice never exceeds 99% of the expected amount
/// minus the fee reserve.
pub const OVERHEAD_DIVISOR: u64 = 100;

/// The POS payment a swap fulfils
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentContext {
    /// Payment id, invoices and swap frames are stored against it
    pub payment_id: Option<String>,
    /// Amount the unknown mint token is expected to carry
    pub amount_sats: Satoshis,
}

impl PaymentContext {
    /// Create new [`PaymentContext`]
    pub fn new(payment_id: Option<String>, amount_sats: Satoshis) -> Self {
        Self {
            payment_id,
            amount_sats,
        }
    }

    /// Same payment for a different amount
    pub fn with_amount(&self, amount_sats: Satoshis) -> Self {
        Self {
            payment_id: self.payment_id.clone(),
            amount_sats,
        }
    }
}

/// Swap Error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    /// Temporary wallet could not be created
    #[error("Temp wallet creation failed: {0}")]
    TemporaryWallet(WalletError),
    /// Keysets of the unknown mint could not be loaded
    #[error("Keyset refresh failed: {0}")]
    KeysetRefresh(WalletError),
    /// Nothing left to invoice once fees are reserved
    #[error("Amount too small after fee buffer: {expected} sats")]
    AmountTooSmall {
        /// Expected amount
        expected: Satoshis,
    },
    /// No trusted Lightning mint configured
    #[error("No Lightning mint configured")]
    NoLightningMint,
    /// Trusted wallet not set up
    #[error("Trusted wallet unavailable")]
    TrustedWalletUnavailable,
    /// Probe invoice could not be created
    #[error("Probe invoice failed: {0}")]
    ProbeInvoice(WalletError),
    /// Unknown mint refused a melt quote
    #[error("Melt quote failed: {0}")]
    MeltQuote(WalletError),
    /// Unknown mint asks for more than the fee budget
    #[error("Fee reserve estimate too large: {fee_reserve} > {fee_buffer}")]
    FeeReserveTooLarge {
        /// Fee reserve of the probe quote
        fee_reserve: Satoshis,
        /// Fee budget
        fee_buffer: Satoshis,
    },
    /// Invoice of the trusted mint could not be obtained
    #[error("Lightning invoice failed: {0}")]
    LightningInvoice(WalletError),
    /// Melt quote for zero sats
    #[error("Invalid melt quote amount")]
    InvalidMeltQuoteAmount,
    /// Melt would need more than the token carries
    #[error("Insufficient balance for melt: required {required}, available {available}")]
    InsufficientBalance {
        /// Quote amount plus fee reserve
        required: Satoshis,
        /// Expected token amount
        available: Satoshis,
    },
    /// Melt failed
    #[error("Melt failed: {0}")]
    Melt(WalletError),
    /// Melt returned without paying
    #[error("Melt did not complete: {0}")]
    MeltNotCompleted(QuoteStatus),
    /// Melt reported paid without a preimage
    #[error("PAID but no preimage")]
    MissingPreimage,
    /// Preimage does not prove payment of the invoice
    #[error("Preimage verification failed: {0}")]
    PreimageVerification(bolt11::Error),
    /// Panic inside the swap
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Outcome of a swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapResult {
    /// Payment proven, value is on its way to the trusted mint
    Success {
        /// The token that was swapped
        final_token: String,
        /// Trusted mint that was paid
        lightning_mint_url: MintUrl,
        /// Expected amount of the payment
        amount_sats: Satoshis,
    },
    /// Swap failed
    Failure(SwapError),
}

impl SwapResult {
    /// Swap succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error of a failed swap
    pub fn error(&self) -> Option<&SwapError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(err) => Some(err),
        }
    }
}

/// Runs swaps from unknown mints into the preferred Lightning mint
#[derive(Debug)]
pub struct SwapCoordinator {
    wallets: Arc<dyn WalletManager>,
    mints: Arc<dyn MintManager>,
    history: Arc<dyn PaymentHistory>,
    invoices: LightningInvoiceProvider,
}

impl SwapCoordinator {
    /// Create new [`SwapCoordinator`]
    pub fn new(
        wallets: Arc<dyn WalletManager>,
        mints: Arc<dyn MintManager>,
        history: Arc<dyn PaymentHistory>,
    ) -> Self {
        let invoices = LightningInvoiceProvider::new(wallets.clone(), history.clone());

        Self {
            wallets,
            mints,
            history,
            invoices,
        }
    }

    /// Swap `token` from `unknown_mint_url` into the preferred Lightning mint
    ///
    /// Never panics. The temporary wallet is closed exactly once, also when
    /// the returned future is dropped before completion.
    #[instrument(skip(self, token, context), fields(payment_id = ?context.payment_id))]
    pub async fn swap_from_unknown_mint(
        &self,
        token: &str,
        expected_amount: Satoshis,
        unknown_mint_url: &str,
        context: PaymentContext,
    ) -> SwapResult {
        let swap = AssertUnwindSafe(self.swap(token, expected_amount, unknown_mint_url, &context))
            .catch_unwind()
            .await;

        match swap {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::error!("Swap from {} failed: {}", unknown_mint_url, err);
                SwapResult::Failure(err)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!("Swap from {} panicked: {}", unknown_mint_url, message);
                SwapResult::Failure(SwapError::Unexpected(message))
            }
        }
    }

    async fn swap(
        &self,
        token: &str,
        expected_amount: Satoshis,
        unknown_mint_url: &str,
        context: &PaymentContext,
    ) -> Result<SwapResult, SwapError> {
        let wallet = self
            .wallets
            .create_temporary_wallet(unknown_mint_url)
            .await
            .map_err(SwapError::TemporaryWallet)?;

        // Closed when dropped on every early return
        let wallet = TemporaryWalletGuard::new(wallet);

        wallet
            .refresh_keysets()
            .await
            .map_err(SwapError::KeysetRefresh)?;

        let fee_buffer = Satoshis::new(expected_amount.value() / FEE_BUFFER_DIVISOR);
        let probe_amount = expected_amount.saturating_sub(fee_buffer);
        if probe_amount.is_zero() {
            return Err(SwapError::AmountTooSmall {
                expected: expected_amount,
            });
        }

        let lightning_mint = self
            .mints
            .preferred_lightning_mint()
            .ok_or(SwapError::NoLightningMint)?;
        let trusted = self
            .wallets
            .trusted_wallet()
            .ok_or(SwapError::TrustedWalletUnavailable)?;

        let probe = trusted
            .request_mint_quote(&lightning_mint, probe_amount)
            .await
            .map_err(SwapError::ProbeInvoice)?;

        let probe_melt = wallet
            .request_melt_quote(&probe.bolt11)
            .await
            .map_err(SwapError::MeltQuote)?;

        tracing::debug!(
            "Probe melt quote {}: amount {}, fee reserve {}",
            probe_melt.quote_id,
            probe_melt.amount,
            probe_melt.fee_reserve
        );

        if probe_melt.fee_reserve > fee_buffer {
            return Err(SwapError::FeeReserveTooLarge {
                fee_reserve: probe_melt.fee_reserve,
                fee_buffer,
            });
        }

        // Rounded up, 1040 sats keeps 11 not 10
        let overhead = Satoshis::new(expected_amount.value().div_ceil(OVERHEAD_DIVISOR));
        let lightning_amount = expected_amount
            .checked_sub(overhead)
            .and_then(|amount| amount.checked_sub(probe_melt.fee_reserve))
            .filter(|amount| !amount.is_zero())
            .ok_or(SwapError::AmountTooSmall {
                expected: expected_amount,
            })?;

        let invoice = self
            .invoices
            .get_or_create_invoice(
                &lightning_mint.to_string(),
                &context.with_amount(lightning_amount),
            )
            .await
            .map_err(SwapError::LightningInvoice)?;

        let melt_quote = wallet
            .request_melt_quote(&invoice.bolt11)
            .await
            .map_err(SwapError::MeltQuote)?;

        if melt_quote.amount.is_zero() {
            return Err(SwapError::InvalidMeltQuoteAmount);
        }

        let total_melt_required = melt_quote
            .total_required()
            .ok_or(SwapError::InvalidMeltQuoteAmount)?;
        if total_melt_required > context.amount_sats {
            return Err(SwapError::InsufficientBalance {
                required: total_melt_required,
                available: context.amount_sats,
            });
        }

        if let Some(payment_id) = context.payment_id.as_deref() {
            let frame = SwapFrame {
                unknown_mint_url: wallet.mint_url().to_string(),
                melt_quote_id: melt_quote.quote_id.clone(),
                lightning_mint_url: invoice.mint_url.to_string(),
                lightning_quote_id: invoice.quote_id.clone(),
            };

            if let Err(err) = self.history.record_swap_frame(payment_id, &frame).await {
                tracing::warn!("Could not record swap frame of payment {}: {}", payment_id, err);
            }
        }

        let melted = wallet.melt_with_token(&melt_quote.quote_id, token).await;
        wallet.close();
        let melted = melted.map_err(SwapError::Melt)?;

        if !melted.is_paid() {
            return Err(SwapError::MeltNotCompleted(melted.status));
        }

        let preimage = melted.preimage.ok_or(SwapError::MissingPreimage)?;
        bolt11::verify_preimage(&preimage, &invoice.bolt11)
            .map_err(SwapError::PreimageVerification)?;

        tracing::info!(
            "Melt of quote {} paid {} sats with fee {}, preimage verified",
            melt_quote.quote_id,
            melt_quote.amount,
            melted.fee_paid
        );

        self.mint_if_paid(trusted.as_ref(), &invoice).await;

        Ok(SwapResult::Success {
            final_token: token.to_string(),
            lightning_mint_url: invoice.mint_url,
            amount_sats: expected_amount,
        })
    }

    /// Mint on the trusted side if its quote is already paid, failures are
    /// left to reconciliation
    async fn mint_if_paid(&self, trusted: &dyn TrustedWallet, invoice: &LightningInvoice) {
        let quote = match trusted
            .check_mint_quote(&invoice.mint_url, &invoice.quote_id)
            .await
        {
            Ok(quote) => quote,
            Err(err) => {
                tracing::warn!("Could not check mint quote {}: {}", invoice.quote_id, err);
                return;
            }
        };

        if !quote.status.is_settled() {
            tracing::debug!("Mint quote {} is {}", invoice.quote_id, quote.status);
            return;
        }

        match trusted.mint(&invoice.mint_url, &invoice.quote_id).await {
            Ok(minted) => tracing::debug!(
                "Minted {} sats in {} proofs for quote {}",
                minted.amount,
                minted.proofs_count,
                invoice.quote_id
            ),
            Err(err) => tracing::warn!("Could not mint quote {}: {}", invoice.quote_id, err),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::history::MemoryPaymentHistory;
    use crate::mint_manager::StaticMintManager;
    use crate::test_utils::{FakeTemporaryWalletFactory, FakeTrustedWallet};
    use crate::wallet::CashuWalletManager;

    const TOKEN: &str = "cashuBtoken";
    const UNKNOWN_MINT: &str = "https://unknown.mint";
    const TRUSTED_MINT: &str = "https://trusted.mint";

    struct Harness {
        coordinator: SwapCoordinator,
        factory: Arc<FakeTemporaryWalletFactory>,
        trusted: Arc<FakeTrustedWallet>,
        history: Arc<MemoryPaymentHistory>,
    }

    impl Harness {
        fn new() -> Self {
            let factory = Arc::new(FakeTemporaryWalletFactory::default());
            let trusted = Arc::new(FakeTrustedWallet::default());
            let history = Arc::new(MemoryPaymentHistory::default());

            let wallets = Arc::new(CashuWalletManager::new(
                Some(trusted.clone() as Arc<dyn TrustedWallet>),
                factory.clone(),
            ));
            let mints = Arc::new(StaticMintManager::new(Some(
                MintUrl::parse_for_wallet(TRUSTED_MINT).unwrap(),
            )));

            Self {
                coordinator: SwapCoordinator::new(wallets, mints, history.clone()),
                factory,
                trusted,
                history,
            }
        }

        async fn swap(&self, expected: u64) -> SwapResult {
            self.coordinator
                .swap_from_unknown_mint(
                    TOKEN,
                    Satoshis::new(expected),
                    UNKNOWN_MINT,
                    PaymentContext::new(Some("pos-1".to_string()), Satoshis::new(expected)),
                )
                .await
        }

        fn closes(&self) -> usize {
            self.factory.closes.get()
        }
    }

    #[tokio::test]
    async fn test_swap_success() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        script.set_melt_paid(Some(harness.trusted.preimage));

        let result = harness.swap(1000).await;

        assert_eq!(
            result,
            SwapResult::Success {
                final_token: TOKEN.to_string(),
                lightning_mint_url: MintUrl::parse_for_wallet(TRUSTED_MINT).unwrap(),
                amount_sats: Satoshis::new(1000),
            }
        );

        // probe for 950, invoice for 1000 - 10 - 20
        assert_eq!(
            *harness.trusted.requested_amounts.lock().unwrap(),
            vec![Satoshis::new(950), Satoshis::new(970)]
        );
        assert_eq!(script.melt_calls.get(), 1);
        assert_eq!(harness.trusted.mint_calls.get(), 1);
        assert_eq!(harness.closes(), 1);

        let frame = harness.history.swap_frame("pos-1").unwrap().unwrap();
        assert_eq!(frame.unknown_mint_url, UNKNOWN_MINT);
        assert_eq!(frame.melt_quote_id, "melt-1");
        assert_eq!(frame.lightning_mint_url, TRUSTED_MINT);
        assert_eq!(frame.lightning_quote_id, "mint-quote-2");
    }

    #[tokio::test]
    async fn test_fee_reserve_over_budget() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 60);
        script.push_melt_quote("melt-1", 950, 20);
        script.set_melt_paid(Some(harness.trusted.preimage));

        let result = harness.swap(1000).await;

        assert_eq!(
            result.error(),
            Some(&SwapError::FeeReserveTooLarge {
                fee_reserve: Satoshis::new(60),
                fee_buffer: Satoshis::new(50),
            })
        );
        assert_eq!(script.melt_quote_calls.get(), 1);
        assert_eq!(script.melt_calls.get(), 0);
        assert_eq!(harness.trusted.quotes_created(), 1);
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_fee_reserve_at_budget() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 50);
        script.push_melt_quote("melt-1", 940, 50);
        script.set_melt_paid(Some(harness.trusted.preimage));

        assert!(harness.swap(1000).await.is_success());
        assert_eq!(
            harness.trusted.requested_amounts.lock().unwrap()[1],
            Satoshis::new(940)
        );
    }

    #[tokio::test]
    async fn test_amount_too_small() {
        let harness = Harness::new();

        let result = harness.swap(0).await;

        assert_eq!(
            result.error(),
            Some(&SwapError::AmountTooSmall {
                expected: Satoshis::ZERO
            })
        );
        assert_eq!(harness.trusted.quotes_created(), 0);
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_invoice_amount_within_fee_budget() {
        // (expected, fee reserve, invoice amount), `None` when nothing is left
        let cases: [(u64, u64, Option<u64>); 7] = [
            (1, 0, None),
            (2, 0, Some(1)),
            (19, 0, Some(18)),
            (20, 1, Some(18)),
            (1040, 20, Some(1009)),
            (1050, 52, Some(987)),
            (99_999, 4999, Some(94_000)),
        ];

        for (expected, fee, invoice_amount) in cases {
            let harness = Harness::new();
            let script = &harness.factory.script;
            let fee_buffer = expected / FEE_BUFFER_DIVISOR;
            script.push_melt_quote("probe", expected - fee_buffer, fee);
            if let Some(amount) = invoice_amount {
                script.push_melt_quote("melt-1", amount, fee);
            }
            script.set_melt_paid(Some(harness.trusted.preimage));

            let result = harness.swap(expected).await;
            let requested = harness.trusted.requested_amounts.lock().unwrap().clone();
            assert_eq!(requested[0], Satoshis::new(expected - fee_buffer), "{expected}");

            match invoice_amount {
                Some(amount) => {
                    assert!(result.is_success(), "{expected}: {result:?}");
                    assert_eq!(requested[1], Satoshis::new(amount), "{expected}");
                    assert!(
                        requested[1].value() * 100 <= expected * 99 - fee * 100,
                        "{expected}"
                    );
                }
                None => {
                    assert_eq!(
                        result.error(),
                        Some(&SwapError::AmountTooSmall {
                            expected: Satoshis::new(expected)
                        })
                    );
                    assert_eq!(requested.len(), 1);
                    assert_eq!(script.melt_calls.get(), 0);
                }
            }
            assert_eq!(harness.closes(), 1, "{expected}");
        }
    }

    #[tokio::test]
    async fn test_final_quote_exceeds_balance() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 970, 40);
        script.set_melt_paid(Some(harness.trusted.preimage));

        let result = harness.swap(1000).await;

        assert_eq!(
            result.error(),
            Some(&SwapError::InsufficientBalance {
                required: Satoshis::new(1010),
                available: Satoshis::new(1000),
            })
        );
        assert_eq!(script.melt_calls.get(), 0);
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_zero_melt_quote() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 0, 20);

        let result = harness.swap(1000).await;

        assert_eq!(result.error(), Some(&SwapError::InvalidMeltQuoteAmount));
        assert_eq!(script.melt_calls.get(), 0);
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_preimage_mismatch() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        script.set_melt_paid(Some([1u8; 32]));

        let result = harness.swap(1000).await;

        assert_eq!(
            result.error(),
            Some(&SwapError::PreimageVerification(
                bolt11::Error::PreimageMismatch
            ))
        );
        assert_eq!(harness.trusted.mint_calls.get(), 0);
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_paid_without_preimage() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        script.set_melt_paid(None);

        let result = harness.swap(1000).await;

        assert_eq!(result.error(), Some(&SwapError::MissingPreimage));
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_melt_not_completed() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        *script.melt.lock().unwrap() = Some(Ok(crate::types::MeltResult {
            status: QuoteStatus::Pending,
            fee_paid: Satoshis::ZERO,
            preimage: None,
            change_proofs_count: 0,
        }));

        let result = harness.swap(1000).await;

        assert_eq!(
            result.error(),
            Some(&SwapError::MeltNotCompleted(QuoteStatus::Pending))
        );
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_melt_error() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        *script.melt.lock().unwrap() = Some(Err(WalletError::TokenAlreadySpent));

        let result = harness.swap(1000).await;

        assert_eq!(
            result.error(),
            Some(&SwapError::Melt(WalletError::TokenAlreadySpent))
        );
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_wallet_creation_failure() {
        let harness = Harness::new();
        *harness.factory.create_error.lock().unwrap() = Some(WalletError::MintUnreachable {
            mint_url: UNKNOWN_MINT.to_string(),
            reason: "timeout".to_string(),
        });

        let result = harness.swap(1000).await;

        assert!(matches!(
            result.error(),
            Some(SwapError::TemporaryWallet(WalletError::MintUnreachable { .. }))
        ));
        assert_eq!(harness.closes(), 0);
    }

    #[tokio::test]
    async fn test_keyset_refresh_failure() {
        let harness = Harness::new();
        *harness.factory.script.refresh_error.lock().unwrap() = Some(WalletError::NetworkError {
            reason: "reset".to_string(),
        });

        let result = harness.swap(1000).await;

        assert!(matches!(result.error(), Some(SwapError::KeysetRefresh(_))));
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_mint_failure_is_not_fatal() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        script.set_melt_paid(Some(harness.trusted.preimage));
        harness.trusted.fail_mint.store(true, Ordering::SeqCst);

        assert!(harness.swap(1000).await.is_success());
        assert_eq!(harness.trusted.mint_calls.get(), 1);
    }

    #[tokio::test]
    async fn test_unpaid_trusted_quote_is_not_minted() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        script.set_melt_paid(Some(harness.trusted.preimage));
        *harness.trusted.quote_status.lock().unwrap() = QuoteStatus::Unpaid;

        assert!(harness.swap(1000).await.is_success());
        assert_eq!(harness.trusted.mint_calls.get(), 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        script.panic_on_melt.store(true, Ordering::SeqCst);

        let result = harness.swap(1000).await;

        assert_eq!(
            result.error(),
            Some(&SwapError::Unexpected("melt exploded".to_string()))
        );
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_swap_closes_wallet() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        *script.melt_delay.lock().unwrap() = Some(Duration::from_secs(60));

        let swap = tokio::time::timeout(Duration::from_millis(500), harness.swap(1000)).await;

        assert!(swap.is_err());
        assert_eq!(script.melt_calls.get(), 1);
        assert_eq!(harness.closes(), 1);
    }

    #[tokio::test]
    async fn test_retry_reuses_invoice() {
        let harness = Harness::new();
        let script = &harness.factory.script;
        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-1", 950, 20);
        *script.melt.lock().unwrap() = Some(Err(WalletError::NetworkError {
            reason: "reset".to_string(),
        }));

        assert!(!harness.swap(1000).await.is_success());

        script.push_melt_quote("probe", 950, 20);
        script.push_melt_quote("melt-2", 950, 20);
        script.set_melt_paid(Some(harness.trusted.preimage));

        assert!(harness.swap(1000).await.is_success());

        // two probes, one real invoice
        assert_eq!(harness.trusted.quotes_created(), 3);
        let invoices = script.quoted_invoices.lock().unwrap().clone();
        assert_eq!(invoices[1], invoices[3]);
        assert_eq!(harness.closes(), 2);
    }

    #[tokio::test]
    async fn test_no_lightning_mint() {
        let factory = Arc::new(FakeTemporaryWalletFactory::default());
        let wallets = Arc::new(CashuWalletManager::new(
            Some(Arc::new(FakeTrustedWallet::default()) as Arc<dyn TrustedWallet>),
            factory.clone(),
        ));
        let coordinator = SwapCoordinator::new(
            wallets,
            Arc::new(StaticMintManager::default()),
            Arc::new(MemoryPaymentHistory::default()),
        );

        let result = coordinator
            .swap_from_unknown_mint(
                TOKEN,
                Satoshis::new(1000),
                UNKNOWN_MINT,
                PaymentContext::new(None, Satoshis::new(1000)),
            )
            .await;

        assert_eq!(result.error(), Some(&SwapError::NoLightningMint));
        assert_eq!(factory.closes.get(), 1);
    }
}
