#![cfg(test)]
#![allow(missing_docs)]

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::hex::DisplayHex;
use bitcoin::secp256k1::{Secp256k1, SecretKey as Secp256k1SecretKey};
use lightning_invoice::{Currency, InvoiceBuilder, PaymentSecret};

use crate::amount::Satoshis;
use crate::dhke::sign_message;
use crate::error::{WalletError, WalletResult};
use crate::mint_url::MintUrl;
use crate::nuts::{
    BlindSignature, BlindedMessage, Id, KeySet, KeySetInfo, Keys, KeysetResponse,
    MeltQuoteBolt11Request, MeltQuoteBolt11Response, MeltQuoteState, MeltRequest, Proof,
    SecretKey, Token,
};
use crate::types::{MeltQuoteResult, MeltResult, MintQuoteResult, MintResult, QuoteStatus};
use crate::wallet::mint_connector::Error;
use crate::wallet::{
    MintConnector, TemporaryMintWallet, TemporaryMintWalletFactory, TrustedWallet,
};

/// Signed bolt11 invoice committing to `SHA256(preimage)`, and that hash
pub fn create_invoice(preimage: [u8; 32], amount_sat: u64) -> (String, [u8; 32]) {
    let private_key = Secp256k1SecretKey::from_slice(
        &[
            0xe1, 0x26, 0xf6, 0x8f, 0x7e, 0xaf, 0xcc, 0x8b, 0x74, 0xf5, 0x4d, 0x26, 0x9f, 0xe2,
            0x06, 0xbe, 0x71, 0x50, 0x00, 0xf9, 0x4d, 0xac, 0x06, 0x7d, 0x1c, 0x04, 0xa8, 0xca,
            0x3b, 0x2d, 0xb7, 0x34,
        ][..],
    )
    .unwrap();

    let payment_hash = sha256::Hash::hash(&preimage);

    let invoice = InvoiceBuilder::new(Currency::Bitcoin)
        .description("POS payment".to_string())
        .payment_hash(payment_hash)
        .payment_secret(PaymentSecret([42u8; 32]))
        .amount_milli_satoshis(amount_sat * 1000)
        .current_timestamp()
        .min_final_cltv_expiry_delta(144)
        .build_signed(|hash| Secp256k1::new().sign_ecdsa_recoverable(hash, &private_key))
        .unwrap();

    (invoice.to_string(), payment_hash.to_byte_array())
}

pub fn test_mint_url() -> MintUrl {
    MintUrl::from_str("https://unknown.mint").unwrap()
}

pub fn test_keyset_id() -> Id {
    Id::from_str("009a1f293253e41e").unwrap()
}

pub fn test_keyset() -> KeySetInfo {
    KeySetInfo {
        id: test_keyset_id(),
        unit: "sat".to_string(),
        active: true,
        input_fee_ppk: 0,
    }
}

pub fn test_proof(amount: u64) -> Proof {
    Proof {
        amount: Satoshis::new(amount),
        keyset_id: test_keyset_id(),
        secret: SecretKey::generate().display_secret().to_string(),
        c: SecretKey::generate().public_key(),
        witness: None,
    }
}

/// Encoded token from [`test_mint_url`] with one proof per amount
pub fn test_token(amounts: &[u64]) -> String {
    let proofs = amounts.iter().map(|amount| test_proof(*amount)).collect();
    Token::new(test_mint_url(), proofs, None, "sat".to_string()).to_string()
}

pub fn test_melt_quote_response(
    quote_id: &str,
    amount: u64,
    fee_reserve: u64,
) -> MeltQuoteBolt11Response {
    MeltQuoteBolt11Response {
        quote: quote_id.to_string(),
        amount: Satoshis::new(amount),
        fee_reserve: Satoshis::new(fee_reserve),
        state: MeltQuoteState::Unpaid,
        paid: None,
        expiry: None,
        payment_preimage: None,
        change: None,
    }
}

/// Signs outputs like a mint would, one key per power of two
#[derive(Debug, Clone)]
pub struct TestMint {
    keys: BTreeMap<u64, SecretKey>,
}

impl TestMint {
    pub fn new() -> Self {
        let keys = (0..16)
            .map(|i| (1u64 << i, SecretKey::generate()))
            .collect();
        Self { keys }
    }

    pub fn keyset(&self) -> KeySet {
        KeySet {
            id: test_keyset_id(),
            unit: "sat".to_string(),
            keys: Keys::from(
                self.keys
                    .iter()
                    .map(|(amount, key)| (*amount, key.public_key()))
                    .collect::<BTreeMap<_, _>>(),
            ),
        }
    }

    pub fn sign(&self, amount: u64, output: &BlindedMessage) -> BlindSignature {
        BlindSignature {
            amount: Satoshis::new(amount),
            keyset_id: output.keyset_id.clone(),
            c: sign_message(&self.keys[&amount], &output.blinded_secret).unwrap(),
        }
    }
}

type MeltHandler =
    Box<dyn Fn(MeltRequest) -> Result<MeltQuoteBolt11Response, Error> + Send + Sync>;

/// Scripted [`MintConnector`]
///
/// `Ok` responses are repeated, an `Err` is returned once.
pub struct MockMintConnector {
    keysets: Mutex<Option<Result<KeysetResponse, Error>>>,
    keyset: Mutex<Option<Result<KeySet, Error>>>,
    melt_quote: Mutex<Option<Result<MeltQuoteBolt11Response, Error>>>,
    melt: Mutex<Option<MeltHandler>>,
    melt_quote_requests: Mutex<Vec<MeltQuoteBolt11Request>>,
    melt_calls: AtomicUsize,
}

impl fmt::Debug for MockMintConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockMintConnector")
            .field("melt_calls", &self.melt_calls)
            .finish()
    }
}

impl MockMintConnector {
    pub fn new() -> Self {
        Self {
            keysets: Mutex::new(None),
            keyset: Mutex::new(None),
            melt_quote: Mutex::new(None),
            melt: Mutex::new(None),
            melt_quote_requests: Mutex::new(Vec::new()),
            melt_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_keysets(&self, response: Result<KeysetResponse, Error>) {
        *self.keysets.lock().unwrap() = Some(response);
    }

    pub fn set_keyset(&self, response: Result<KeySet, Error>) {
        *self.keyset.lock().unwrap() = Some(response);
    }

    pub fn set_melt_quote(&self, response: Result<MeltQuoteBolt11Response, Error>) {
        *self.melt_quote.lock().unwrap() = Some(response);
    }

    pub fn set_melt_handler<F>(&self, handler: F)
    where
        F: Fn(MeltRequest) -> Result<MeltQuoteBolt11Response, Error> + Send + Sync + 'static,
    {
        *self.melt.lock().unwrap() = Some(Box::new(handler));
    }

    pub fn melt_calls(&self) -> usize {
        self.melt_calls.load(Ordering::SeqCst)
    }

    pub fn melt_quote_requests(&self) -> Vec<MeltQuoteBolt11Request> {
        self.melt_quote_requests.lock().unwrap().clone()
    }

    fn respond<T: Clone>(slot: &Mutex<Option<Result<T, Error>>>) -> Result<T, Error> {
        let mut slot = slot.lock().unwrap();
        match slot.take() {
            Some(Ok(value)) => {
                *slot = Some(Ok(value.clone()));
                Ok(value)
            }
            Some(Err(err)) => Err(err),
            None => Err(Error::HttpError(Some(500), "no mock response".to_string())),
        }
    }
}

#[async_trait]
impl MintConnector for MockMintConnector {
    async fn get_mint_keysets(&self) -> Result<KeysetResponse, Error> {
        Self::respond(&self.keysets)
    }

    async fn get_mint_keyset(&self, _keyset_id: &Id) -> Result<KeySet, Error> {
        Self::respond(&self.keyset)
    }

    async fn post_melt_quote(
        &self,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        self.melt_quote_requests.lock().unwrap().push(request);
        Self::respond(&self.melt_quote)
    }

    async fn get_melt_quote_status(
        &self,
        _quote_id: &str,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        Self::respond(&self.melt_quote)
    }

    async fn post_melt(&self, request: MeltRequest) -> Result<MeltQuoteBolt11Response, Error> {
        self.melt_calls.fetch_add(1, Ordering::SeqCst);
        let handler = self.melt.lock().unwrap();
        match handler.as_ref() {
            Some(handler) => handler(request),
            None => Err(Error::HttpError(Some(500), "no mock melt".to_string())),
        }
    }
}

/// Shared call counter
#[derive(Debug, Default)]
pub struct Counter(AtomicUsize);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Responses of a [`FakeTemporaryWallet`]
#[derive(Debug, Default)]
pub struct FakeScript {
    /// Returned by `request_melt_quote` in order
    pub melt_quotes: Mutex<VecDeque<WalletResult<MeltQuoteResult>>>,
    pub melt: Mutex<Option<WalletResult<MeltResult>>>,
    pub refresh_error: Mutex<Option<WalletError>>,
    pub melt_delay: Mutex<Option<Duration>>,
    pub panic_on_melt: AtomicBool,
    pub quoted_invoices: Mutex<Vec<String>>,
    pub melt_quote_calls: Counter,
    pub melt_calls: Counter,
}

impl FakeScript {
    pub fn push_melt_quote(&self, quote_id: &str, amount: u64, fee_reserve: u64) {
        self.melt_quotes.lock().unwrap().push_back(Ok(MeltQuoteResult {
            quote_id: quote_id.to_string(),
            amount: Satoshis::new(amount),
            fee_reserve: Satoshis::new(fee_reserve),
            status: QuoteStatus::Unpaid,
            expiry: None,
        }));
    }

    pub fn set_melt_paid(&self, preimage: Option<[u8; 32]>) {
        *self.melt.lock().unwrap() = Some(Ok(MeltResult {
            status: QuoteStatus::Paid,
            fee_paid: Satoshis::new(8),
            preimage: preimage.map(|p| p.to_lower_hex_string()),
            change_proofs_count: 0,
        }));
    }
}

#[derive(Debug)]
pub struct FakeTemporaryWallet {
    mint_url: MintUrl,
    script: Arc<FakeScript>,
    closes: Arc<Counter>,
}

impl FakeTemporaryWallet {
    pub fn new(mint_url: &str) -> Self {
        Self::with_script(mint_url, Arc::default(), Arc::default())
    }

    pub fn with_script(mint_url: &str, script: Arc<FakeScript>, closes: Arc<Counter>) -> Self {
        Self {
            mint_url: MintUrl::from_str(mint_url).unwrap(),
            script,
            closes,
        }
    }

    pub fn close_counter(&self) -> Arc<Counter> {
        self.closes.clone()
    }
}

#[async_trait]
impl TemporaryMintWallet for FakeTemporaryWallet {
    fn mint_url(&self) -> &MintUrl {
        &self.mint_url
    }

    async fn refresh_keysets(&self) -> WalletResult<Vec<KeySetInfo>> {
        match self.script.refresh_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(vec![test_keyset()]),
        }
    }

    async fn request_melt_quote(&self, bolt11: &str) -> WalletResult<MeltQuoteResult> {
        self.script.melt_quote_calls.incr();
        self.script
            .quoted_invoices
            .lock()
            .unwrap()
            .push(bolt11.to_string());
        self.script
            .melt_quotes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(WalletError::Unknown {
                    reason: "no scripted melt quote".to_string(),
                })
            })
    }

    async fn melt_with_token(&self, _quote_id: &str, _token: &str) -> WalletResult<MeltResult> {
        self.script.melt_calls.incr();

        let delay = *self.script.melt_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.script.panic_on_melt.load(Ordering::SeqCst) {
            panic!("melt exploded");
        }

        self.script.melt.lock().unwrap().clone().unwrap_or_else(|| {
            Err(WalletError::Unknown {
                reason: "no scripted melt".to_string(),
            })
        })
    }

    fn close(&self) {
        self.closes.incr();
    }
}

#[derive(Debug, Default)]
pub struct FakeTemporaryWalletFactory {
    pub script: Arc<FakeScript>,
    pub closes: Arc<Counter>,
    pub create_error: Mutex<Option<WalletError>>,
    created: Counter,
}

impl FakeTemporaryWalletFactory {
    pub fn created(&self) -> usize {
        self.created.get()
    }
}

#[async_trait]
impl TemporaryMintWalletFactory for FakeTemporaryWalletFactory {
    async fn create_temporary_wallet(
        &self,
        mint_url: &str,
    ) -> WalletResult<Box<dyn TemporaryMintWallet>> {
        if let Some(err) = self.create_error.lock().unwrap().clone() {
            return Err(err);
        }

        self.created.incr();
        Ok(Box::new(FakeTemporaryWallet::with_script(
            mint_url,
            self.script.clone(),
            self.closes.clone(),
        )))
    }
}

/// Trusted wallet whose invoices all commit to the same preimage
#[derive(Debug)]
pub struct FakeTrustedWallet {
    pub preimage: [u8; 32],
    pub quote_status: Mutex<QuoteStatus>,
    pub fail_mint: AtomicBool,
    pub requested_amounts: Mutex<Vec<Satoshis>>,
    pub mint_calls: Counter,
}

impl Default for FakeTrustedWallet {
    fn default() -> Self {
        Self {
            preimage: [7u8; 32],
            quote_status: Mutex::new(QuoteStatus::Paid),
            fail_mint: AtomicBool::new(false),
            requested_amounts: Mutex::new(Vec::new()),
            mint_calls: Counter::default(),
        }
    }
}

impl FakeTrustedWallet {
    pub fn quotes_created(&self) -> usize {
        self.requested_amounts.lock().unwrap().len()
    }
}

#[async_trait]
impl TrustedWallet for FakeTrustedWallet {
    async fn request_mint_quote(
        &self,
        _mint_url: &MintUrl,
        amount: Satoshis,
    ) -> WalletResult<MintQuoteResult> {
        let mut requested = self.requested_amounts.lock().unwrap();
        requested.push(amount);

        let (bolt11, _) = create_invoice(self.preimage, amount.value());

        Ok(MintQuoteResult {
            quote_id: format!("mint-quote-{}", requested.len()),
            bolt11,
            amount,
            status: QuoteStatus::Unpaid,
            expiry: None,
        })
    }

    async fn check_mint_quote(
        &self,
        _mint_url: &MintUrl,
        quote_id: &str,
    ) -> WalletResult<MintQuoteResult> {
        Ok(MintQuoteResult {
            quote_id: quote_id.to_string(),
            bolt11: String::new(),
            amount: Satoshis::ZERO,
            status: *self.quote_status.lock().unwrap(),
            expiry: None,
        })
    }

    async fn mint(&self, _mint_url: &MintUrl, quote_id: &str) -> WalletResult<MintResult> {
        self.mint_calls.incr();

        if self.fail_mint.load(Ordering::SeqCst) {
            return Err(WalletError::MintFailed {
                quote_id: quote_id.to_string(),
                reason: "mint offline".to_string(),
            });
        }

        Ok(MintResult {
            proofs_count: 4,
            amount: Satoshis::new(970),
        })
    }
}
