//! In-memory wallet for a single unknown mint

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bip39::Mnemonic;
use parking_lot::Mutex;
use tracing::instrument;
use zeroize::Zeroize;

use super::mint_connector::{HttpClient, MintConnector};
use super::{TemporaryMintWallet, TemporaryMintWalletFactory};
use crate::amount::Satoshis;
use crate::config::Settings;
use crate::dhke::construct_proofs;
use crate::error::{WalletError, WalletResult};
use crate::mint_url::MintUrl;
use crate::nuts::nut00::proofs_total;
use crate::nuts::nut08::PreMintSecrets;
use crate::nuts::{
    Id, KeySetInfo, MeltQuoteBolt11Request, MeltQuoteBolt11Response, MeltQuoteState, MeltRequest,
    Proofs, Token,
};
use crate::types::{MeltQuoteResult, MeltResult};
use crate::util::unix_time;

struct WalletState {
    seed: [u8; 64],
    keysets: Vec<KeySetInfo>,
    proofs: Proofs,
    melt_quotes: HashMap<String, MeltQuoteBolt11Response>,
    counter: u32,
}

impl WalletState {
    fn new() -> WalletResult<Self> {
        let mnemonic = Mnemonic::generate(12).map_err(|e| WalletError::Unknown {
            reason: e.to_string(),
        })?;

        Ok(Self {
            seed: mnemonic.to_seed_normalized(""),
            keysets: Vec::new(),
            proofs: Vec::new(),
            melt_quotes: HashMap::new(),
            counter: 0,
        })
    }

    fn active_keyset(&self) -> Option<&KeySetInfo> {
        self.keysets.iter().find(|keyset| keyset.active)
    }

    /// `ceil(sum(input_fee_ppk) / 1000)` over the keysets of `proofs`
    fn input_fee(&self, proofs: &Proofs) -> WalletResult<Satoshis> {
        let mut sum_fee: u64 = 0;

        for proof in proofs {
            let keyset = self
                .keysets
                .iter()
                .find(|keyset| keyset.id == proof.keyset_id)
                .ok_or_else(|| WalletError::InvalidToken {
                    reason: format!("unknown keyset {}", proof.keyset_id),
                })?;

            sum_fee = sum_fee
                .checked_add(keyset.input_fee_ppk)
                .ok_or_else(amount_overflow)?;
        }

        let fee = sum_fee.checked_add(999).ok_or_else(amount_overflow)? / 1000;

        Ok(Satoshis::new(fee))
    }
}

impl Drop for WalletState {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

fn amount_overflow() -> WalletError {
    WalletError::Unknown {
        reason: "amount overflow".to_string(),
    }
}

/// Melt-only wallet bound to one mint, nothing is persisted
pub struct EphemeralWallet {
    mint_url: MintUrl,
    unit: String,
    client: Arc<dyn MintConnector>,
    state: Mutex<Option<WalletState>>,
}

impl fmt::Debug for EphemeralWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralWallet")
            .field("mint_url", &self.mint_url)
            .field("unit", &self.unit)
            .field("closed", &self.state.lock().is_none())
            .finish()
    }
}

impl EphemeralWallet {
    /// Create new [`EphemeralWallet`] with a fresh random seed
    pub fn new(mint_url: MintUrl, unit: &str, client: Arc<dyn MintConnector>) -> WalletResult<Self> {
        Ok(Self {
            mint_url,
            unit: unit.to_string(),
            client,
            state: Mutex::new(Some(WalletState::new()?)),
        })
    }

    /// Sum of proofs held
    pub fn total_balance(&self) -> WalletResult<Satoshis> {
        self.with_state(|state| proofs_total(&state.proofs).map_err(|_| amount_overflow()))
    }

    /// Wallet has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().is_none()
    }

    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut WalletState) -> WalletResult<R>,
    ) -> WalletResult<R> {
        let mut state = self.state.lock();
        let state = state.as_mut().ok_or(WalletError::NotInitialized)?;
        f(state)
    }

    async fn melt_quote(&self, quote_id: &str) -> WalletResult<MeltQuoteBolt11Response> {
        if let Some(quote) =
            self.with_state(|state| Ok(state.melt_quotes.get(quote_id).cloned()))?
        {
            return Ok(quote);
        }

        let quote = self
            .client
            .get_melt_quote_status(quote_id)
            .await
            .map_err(|e| e.into_wallet_error(&self.mint_url, Some(quote_id)))?;

        self.with_state(|state| {
            state
                .melt_quotes
                .insert(quote_id.to_string(), quote.clone());
            Ok(())
        })?;

        Ok(quote)
    }

    fn receive(&self, encoded_token: &str) -> WalletResult<Proofs> {
        let token = Token::from_str(encoded_token).map_err(|e| WalletError::InvalidToken {
            reason: e.to_string(),
        })?;

        let token_mint_url = token.mint_url().map_err(|e| WalletError::InvalidToken {
            reason: e.to_string(),
        })?;
        if token_mint_url != self.mint_url {
            return Err(WalletError::InvalidToken {
                reason: format!("token is from {token_mint_url}, wallet is for {}", self.mint_url),
            });
        }

        if token.unit() != self.unit {
            return Err(WalletError::InvalidToken {
                reason: format!("unsupported unit {}", token.unit()),
            });
        }

        // Rejects duplicate proofs
        token.value().map_err(|e| WalletError::InvalidToken {
            reason: e.to_string(),
        })?;

        self.with_state(|state| {
            if state.keysets.is_empty() {
                return Err(WalletError::NotInitialized);
            }

            let proofs = token
                .proofs(&state.keysets)
                .map_err(|e| WalletError::InvalidToken {
                    reason: e.to_string(),
                })?;

            for proof in &proofs {
                if !state.proofs.contains(proof) {
                    state.proofs.push(proof.clone());
                }
            }

            Ok(proofs)
        })
    }
}

#[async_trait]
impl TemporaryMintWallet for EphemeralWallet {
    fn mint_url(&self) -> &MintUrl {
        &self.mint_url
    }

    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn refresh_keysets(&self) -> WalletResult<Vec<KeySetInfo>> {
        self.with_state(|_| Ok(()))?;

        let response = self
            .client
            .get_mint_keysets()
            .await
            .map_err(|e| WalletError::MintUnreachable {
                mint_url: self.mint_url.to_string(),
                reason: e.to_string(),
            })?;

        let keysets: Vec<KeySetInfo> = response
            .keysets
            .into_iter()
            .filter(|keyset| keyset.unit == self.unit)
            .collect();

        if keysets.is_empty() {
            return Err(WalletError::MintUnreachable {
                mint_url: self.mint_url.to_string(),
                reason: format!("mint has no {} keysets", self.unit),
            });
        }

        tracing::debug!("Loaded {} keysets", keysets.len());

        self.with_state(|state| {
            state.keysets = keysets.clone();
            Ok(())
        })?;

        Ok(keysets)
    }

    #[instrument(skip(self, bolt11), fields(mint_url = %self.mint_url))]
    async fn request_melt_quote(&self, bolt11: &str) -> WalletResult<MeltQuoteResult> {
        self.with_state(|_| Ok(()))?;

        let request = MeltQuoteBolt11Request {
            request: bolt11.to_string(),
            unit: self.unit.clone(),
        };

        let response = self
            .client
            .post_melt_quote(request)
            .await
            .map_err(|e| e.into_wallet_error(&self.mint_url, None))?;

        let quote = MeltQuoteResult::from(&response);

        self.with_state(|state| {
            state.melt_quotes.insert(response.quote.clone(), response);
            Ok(())
        })?;

        Ok(quote)
    }

    #[instrument(skip(self, token), fields(mint_url = %self.mint_url))]
    async fn melt_with_token(&self, quote_id: &str, token: &str) -> WalletResult<MeltResult> {
        let proofs = self.receive(token)?;
        let quote = self.melt_quote(quote_id).await?;

        if let Some(expiry) = quote.expiry {
            if expiry > 0 && expiry <= unix_time() {
                return Err(WalletError::QuoteExpired {
                    quote_id: quote_id.to_string(),
                });
            }
        }

        let proofs_total = proofs_total(&proofs).map_err(|_| amount_overflow())?;

        let (active_keyset_id, premint_secrets) = self.with_state(|state| {
            let input_fee = state.input_fee(&proofs)?;

            let required = quote
                .amount
                .checked_add(quote.fee_reserve)
                .and_then(|required| required.checked_add(input_fee))
                .ok_or_else(amount_overflow)?;

            if proofs_total < required {
                return Err(WalletError::InsufficientBalance {
                    required,
                    available: proofs_total,
                });
            }

            let active_keyset_id: Id = state
                .active_keyset()
                .map(|keyset| keyset.id.clone())
                .ok_or_else(|| WalletError::MintUnreachable {
                    mint_url: self.mint_url.to_string(),
                    reason: "mint has no active keyset".to_string(),
                })?;

            // Anything above amount and input fee can come back as change
            let overpaid = proofs_total.saturating_sub(quote.amount).saturating_sub(input_fee);

            let premint_secrets = PreMintSecrets::from_seed_blank(
                &active_keyset_id,
                state.counter,
                &state.seed,
                overpaid,
            )
            .map_err(|e| WalletError::Unknown {
                reason: e.to_string(),
            })?;

            state.counter += premint_secrets.len() as u32;

            Ok((active_keyset_id, premint_secrets))
        })?;

        let outputs = if premint_secrets.is_empty() {
            None
        } else {
            Some(premint_secrets.blinded_messages())
        };

        let request = MeltRequest::new(quote_id.to_string(), proofs.clone(), outputs);

        let response = self.client.post_melt(request).await.map_err(|e| {
            match e.into_wallet_error(&self.mint_url, Some(quote_id)) {
                WalletError::Unknown { reason } | WalletError::MintUnreachable { reason, .. } => {
                    WalletError::MeltFailed {
                        quote_id: quote_id.to_string(),
                        reason,
                    }
                }
                err => err,
            }
        })?;

        let state = response.quote_state();
        tracing::debug!("Melt of quote {} returned {}", quote_id, state);

        let change = response.change.clone().unwrap_or_default();
        let change_proofs_count = change.len();
        let change_amount = response.change_amount().unwrap_or(Satoshis::ZERO);

        let change_proofs = if change.is_empty() {
            Vec::new()
        } else {
            let num_change_proof = if premint_secrets.len() < change.len() {
                tracing::error!("Mismatch in change promises to change");
                premint_secrets.len()
            } else {
                change.len()
            };

            match self.client.get_mint_keyset(&active_keyset_id).await {
                Ok(keyset) => construct_proofs(
                    change[..num_change_proof].to_vec(),
                    premint_secrets.rs()[..num_change_proof].to_vec(),
                    premint_secrets.secrets()[..num_change_proof].to_vec(),
                    &keyset.keys,
                )
                .unwrap_or_else(|err| {
                    tracing::warn!("Could not unblind melt change: {}", err);
                    Vec::new()
                }),
                Err(err) => {
                    tracing::warn!("Could not load keys to unblind melt change: {}", err);
                    Vec::new()
                }
            }
        };

        self.with_state(|wallet| {
            if state == MeltQuoteState::Paid {
                wallet.proofs.retain(|proof| !proofs.contains(proof));
            }
            wallet.proofs.extend(change_proofs);
            wallet.melt_quotes.insert(quote_id.to_string(), response.clone());
            Ok(())
        })?;

        let fee_paid = proofs_total
            .saturating_sub(quote.amount)
            .saturating_sub(change_amount);

        Ok(MeltResult {
            status: state.into(),
            fee_paid,
            preimage: response.payment_preimage,
            change_proofs_count,
        })
    }

    fn close(&self) {
        if self.state.lock().take().is_some() {
            tracing::debug!("Closed temporary wallet for {}", self.mint_url);
        }
    }
}

/// Creates an [`EphemeralWallet`] talking to its mint over [`HttpClient`]
#[derive(Debug, Clone)]
pub struct EphemeralWalletFactory {
    unit: String,
    timeout: Duration,
}

impl Default for EphemeralWalletFactory {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl EphemeralWalletFactory {
    /// Create new [`EphemeralWalletFactory`]
    pub fn new(unit: &str, timeout: Duration) -> Self {
        Self {
            unit: unit.to_string(),
            timeout,
        }
    }

    /// Unit and request timeout from [`Settings`]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.unit, settings.http.timeout())
    }
}

#[async_trait]
impl TemporaryMintWalletFactory for EphemeralWalletFactory {
    #[instrument(skip(self))]
    async fn create_temporary_wallet(
        &self,
        mint_url: &str,
    ) -> WalletResult<Box<dyn TemporaryMintWallet>> {
        let mint_url = MintUrl::parse_for_wallet(mint_url)?;

        let client = HttpClient::with_timeout(mint_url.clone(), self.timeout).map_err(|e| {
            WalletError::MintUnreachable {
                mint_url: mint_url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let wallet = EphemeralWallet::new(mint_url, &self.unit, Arc::new(client))?;

        Ok(Box::new(wallet))
    }
}
