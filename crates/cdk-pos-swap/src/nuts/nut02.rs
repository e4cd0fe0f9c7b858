//! NUT-02: Keysets and keyset ID
//!
//! <https://github.com/cashubtc/nuts/blob/main/02.md>

use std::fmt;
use std::str::FromStr;

use bitcoin::hex::{DisplayHex, FromHex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::nut01::Keys;
use super::Error;

/// Keyset id
///
/// Lower case hex of a version byte followed by the id bytes. V1 ids are
/// 8 bytes, V2 ids are 33 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(Vec<u8>);

impl Id {
    const V1_BYTES: usize = 8;
    const V2_BYTES: usize = 33;

    /// Id bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    /// Parse from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        match (bytes.first(), bytes.len()) {
            (Some(0x00), Self::V1_BYTES) | (Some(0x01), Self::V2_BYTES) => Ok(Self(bytes.to_vec())),
            _ => Err(Error::InvalidKeysetId),
        }
    }

    /// Resolve a V4 token short id against the mint's keysets
    ///
    /// The short id is a byte prefix of the full id.
    pub fn from_short_keyset_id(short_id: &[u8], keysets: &[KeySetInfo]) -> Result<Self, Error> {
        if short_id.is_empty() {
            return Err(Error::InvalidKeysetId);
        }

        keysets
            .iter()
            .find(|keyset| keyset.id.0.starts_with(short_id))
            .map(|keyset| keyset.id.clone())
            .ok_or_else(|| Error::KeysetUnknown(short_id.to_lower_hex_string()))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_lower_hex_string())
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = Vec::<u8>::from_hex(s).map_err(|_| Error::InvalidKeysetId)?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let id = String::deserialize(deserializer)?;
        Self::from_str(&id).map_err(serde::de::Error::custom)
    }
}

/// Keyset summary as listed by `GET /v1/keysets`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySetInfo {
    /// Keyset [`Id`]
    pub id: Id,
    /// Keyset unit
    pub unit: String,
    /// Keyset state
    pub active: bool,
    /// Input fee in parts per thousand, per proof
    #[serde(default)]
    pub input_fee_ppk: u64,
}

/// Keyset ids of a mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetResponse {
    /// Keysets
    pub keysets: Vec<KeySetInfo>,
}

/// Keyset with its public keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Keyset [`Id`]
    pub id: Id,
    /// Keyset unit
    pub unit: String,
    /// Keyset [`Keys`]
    pub keys: Keys,
}

/// Response of `GET /v1/keys/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysResponse {
    /// Keysets
    pub keysets: Vec<KeySet>,
}
