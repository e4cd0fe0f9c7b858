//! Cashu Token
//!
//! <https://github.com/cashubtc/nuts/blob/main/00.md>

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use bitcoin::base64::engine::{general_purpose, GeneralPurpose};
use bitcoin::base64::{alphabet, Engine as _};
use serde::{Deserialize, Serialize};

use super::{Proof, Proofs};
use crate::amount::Satoshis;
use crate::mint_url::MintUrl;
use crate::nuts::nut01::PublicKey;
use crate::nuts::nut02::{Id, KeySetInfo};
use crate::nuts::Error;
use crate::ensure_swap;

/// Unit assumed when a V3 token does not name one
const DEFAULT_UNIT: &str = "sat";

/// Token Enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    /// Token V3
    TokenV3(TokenV3),
    /// Token V4
    TokenV4(TokenV4),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::TokenV3(token) => token.to_string(),
            Self::TokenV4(token) => token.to_string(),
        };

        write!(f, "{token}")
    }
}

impl Token {
    /// Create new V4 [`Token`]
    pub fn new(mint_url: MintUrl, proofs: Proofs, memo: Option<String>, unit: String) -> Self {
        let mut by_keyset: BTreeMap<Id, Vec<ProofV4>> = BTreeMap::new();
        for proof in proofs {
            by_keyset
                .entry(proof.keyset_id.clone())
                .or_default()
                .push(proof.into());
        }

        Self::TokenV4(TokenV4 {
            mint_url,
            unit,
            memo,
            token: by_keyset
                .into_iter()
                .map(|(keyset_id, proofs)| TokenV4Token {
                    keyset_id: keyset_id.to_bytes(),
                    proofs,
                })
                .collect(),
        })
    }

    /// Proofs in [`Token`], full keyset ids resolved against `mint_keysets`
    pub fn proofs(&self, mint_keysets: &[KeySetInfo]) -> Result<Proofs, Error> {
        match self {
            Self::TokenV3(token) => Ok(token.proofs()),
            Self::TokenV4(token) => token.proofs(mint_keysets),
        }
    }

    /// Total value of [`Token`], errors if duplicate proofs are found
    pub fn value(&self) -> Result<Satoshis, Error> {
        match self {
            Self::TokenV3(token) => token.value(),
            Self::TokenV4(token) => token.value(),
        }
    }

    /// [`Token`] memo
    pub fn memo(&self) -> &Option<String> {
        match self {
            Self::TokenV3(token) => &token.memo,
            Self::TokenV4(token) => &token.memo,
        }
    }

    /// Unit
    pub fn unit(&self) -> &str {
        match self {
            Self::TokenV3(token) => token.unit.as_deref().unwrap_or(DEFAULT_UNIT),
            Self::TokenV4(token) => &token.unit,
        }
    }

    /// Mint url, errors if the token spans more than one mint
    pub fn mint_url(&self) -> Result<MintUrl, Error> {
        match self {
            Self::TokenV3(token) => {
                let mint_urls = token.mint_urls();
                ensure_swap!(mint_urls.len() == 1, Error::MultiMintTokenNotSupported);
                mint_urls
                    .into_iter()
                    .next()
                    .ok_or(Error::MultiMintTokenNotSupported)
            }
            Self::TokenV4(token) => Ok(token.mint_url.clone()),
        }
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (is_v3, s) = match (s.strip_prefix("cashuA"), s.strip_prefix("cashuB")) {
            (Some(s), None) => (true, s),
            (None, Some(s)) => (false, s),
            _ => return Err(Error::UnsupportedToken),
        };

        let decoded = url_safe_engine().decode(s)?;

        match is_v3 {
            true => {
                let decoded_str = String::from_utf8(decoded)?;
                let token: TokenV3 = serde_json::from_str(&decoded_str)?;
                Ok(Token::TokenV3(token))
            }
            false => {
                let token: TokenV4 = ciborium::from_reader(&decoded[..])?;
                Ok(Token::TokenV4(token))
            }
        }
    }
}

fn url_safe_engine() -> GeneralPurpose {
    let decode_config = general_purpose::GeneralPurposeConfig::new()
        .with_decode_padding_mode(bitcoin::base64::engine::DecodePaddingMode::Indifferent);
    GeneralPurpose::new(&alphabet::URL_SAFE, decode_config)
}

/// Token V3 Token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenV3Token {
    /// Url of mint
    pub mint: MintUrl,
    /// [`Proofs`]
    pub proofs: Proofs,
}

/// Token V3
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenV3 {
    /// Proofs in [`Token`] by mint
    pub token: Vec<TokenV3Token>,
    /// Memo for token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Token Unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl TokenV3 {
    /// Proofs
    pub fn proofs(&self) -> Proofs {
        self.token
            .iter()
            .flat_map(|token| token.proofs.clone())
            .collect()
    }

    /// Value - errors if duplicate proofs are found
    pub fn value(&self) -> Result<Satoshis, Error> {
        let proofs = self.proofs();
        let unique_count = proofs.iter().collect::<HashSet<_>>().len();

        ensure_swap!(unique_count == proofs.len(), Error::DuplicateProofs);

        Ok(Satoshis::try_sum(proofs.iter().map(|p| p.amount))?)
    }

    /// Distinct mint urls
    pub fn mint_urls(&self) -> Vec<MintUrl> {
        let mut mint_urls: Vec<MintUrl> = self.token.iter().map(|t| t.mint.clone()).collect();
        mint_urls.sort();
        mint_urls.dedup();
        mint_urls
    }
}

impl FromStr for TokenV3 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Token::from_str(s)? {
            Token::TokenV3(token) => Ok(token),
            Token::TokenV4(_) => Err(Error::UnsupportedToken),
        }
    }
}

impl fmt::Display for TokenV3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json_string = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        let encoded = general_purpose::URL_SAFE.encode(json_string);
        write!(f, "cashuA{encoded}")
    }
}

/// Token V4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenV4 {
    /// Mint Url
    #[serde(rename = "m")]
    pub mint_url: MintUrl,
    /// Token Unit
    #[serde(rename = "u")]
    pub unit: String,
    /// Memo for token
    #[serde(rename = "d", skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Proofs grouped by keyset_id
    #[serde(rename = "t")]
    pub token: Vec<TokenV4Token>,
}

impl TokenV4 {
    /// Proofs from token
    pub fn proofs(&self, mint_keysets: &[KeySetInfo]) -> Result<Proofs, Error> {
        let mut proofs: Proofs = vec![];
        for t in self.token.iter() {
            let long_id = Id::from_short_keyset_id(&t.keyset_id, mint_keysets)?;
            proofs.extend(t.proofs.iter().map(|p| p.into_proof(&long_id)));
        }
        Ok(proofs)
    }

    /// Value - errors if duplicate proofs are found
    pub fn value(&self) -> Result<Satoshis, Error> {
        let proofs: Vec<&ProofV4> = self.token.iter().flat_map(|t| t.proofs.iter()).collect();
        let unique_count = proofs
            .iter()
            .map(|p| &p.secret)
            .collect::<HashSet<_>>()
            .len();

        ensure_swap!(unique_count == proofs.len(), Error::DuplicateProofs);

        Ok(Satoshis::try_sum(proofs.iter().map(|p| p.amount))?)
    }
}

impl fmt::Display for TokenV4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use serde::ser::Error;
        let mut data = Vec::new();
        ciborium::into_writer(self, &mut data).map_err(|e| fmt::Error::custom(e.to_string()))?;
        let encoded = general_purpose::URL_SAFE.encode(data);
        write!(f, "cashuB{encoded}")
    }
}

impl FromStr for TokenV4 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Token::from_str(s)? {
            Token::TokenV4(token) => Ok(token),
            Token::TokenV3(_) => Err(Error::UnsupportedToken),
        }
    }
}

/// Token V4 Token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenV4Token {
    /// Short or full `Keyset id` bytes
    #[serde(
        rename = "i",
        serialize_with = "serialize_v4_bytes",
        deserialize_with = "deserialize_v4_bytes"
    )]
    pub keyset_id: Vec<u8>,
    /// Proofs
    #[serde(rename = "p")]
    pub proofs: Vec<ProofV4>,
}

/// Proof V4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofV4 {
    /// Amount in satoshi
    #[serde(rename = "a")]
    pub amount: Satoshis,
    /// Secret message
    #[serde(rename = "s")]
    pub secret: String,
    /// Unblinded signature
    #[serde(
        serialize_with = "serialize_v4_pubkey",
        deserialize_with = "deserialize_v4_pubkey"
    )]
    pub c: PublicKey,
    /// Witness
    #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<String>,
}

impl ProofV4 {
    /// [`ProofV4`] into [`Proof`]
    pub fn into_proof(&self, keyset_id: &Id) -> Proof {
        Proof {
            amount: self.amount,
            keyset_id: keyset_id.clone(),
            secret: self.secret.clone(),
            c: self.c,
            witness: self.witness.clone(),
        }
    }
}

impl From<Proof> for ProofV4 {
    fn from(proof: Proof) -> Self {
        ProofV4 {
            amount: proof.amount,
            secret: proof.secret,
            c: proof.c,
            witness: proof.witness,
        }
    }
}

fn serialize_v4_bytes<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_bytes(bytes)
}

fn deserialize_v4_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Vec::<u8>::deserialize(deserializer)
}

fn serialize_v4_pubkey<S>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_bytes(&key.to_bytes())
}

fn deserialize_v4_pubkey<'de, D>(deserializer: D) -> Result<PublicKey, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let bytes = Vec::<u8>::deserialize(deserializer)?;
    PublicKey::from_slice(&bytes).map_err(serde::de::Error::custom)
}
