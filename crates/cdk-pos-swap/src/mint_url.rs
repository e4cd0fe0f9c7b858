//! Mint Url

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{ParseError, Url};

use crate::ensure_swap;
use crate::error::WalletError;

/// Url Error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Url error
    #[error(transparent)]
    Url(#[from] ParseError),
    /// Invalid URL structure
    #[error("Invalid URL")]
    InvalidUrl,
}

/// Normalized mint url
///
/// Scheme and host are lower case and trailing slashes are removed, so two
/// spellings of the same mint compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MintUrl(String);

impl Serialize for MintUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MintUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MintUrl::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl MintUrl {
    fn format_url(url: &str) -> Result<String, Error> {
        let url = url.trim().trim_end_matches('/');
        ensure_swap!(!url.is_empty(), Error::InvalidUrl);

        let (scheme, rest) = url.split_once("://").ok_or(Error::InvalidUrl)?;
        ensure_swap!(
            matches!(scheme.to_lowercase().as_str(), "http" | "https"),
            Error::InvalidUrl
        );

        let (host, path) = match rest.split_once('/') {
            Some((host, path)) => (host, path),
            None => (rest, ""),
        };
        ensure_swap!(!host.is_empty(), Error::InvalidUrl);

        let mut formatted_url = format!("{}://{}", scheme.to_lowercase(), host.to_lowercase());
        if !path.is_empty() {
            formatted_url.push('/');
            formatted_url.push_str(path);
        }

        // Must also be a valid url
        Url::parse(&formatted_url)?;

        Ok(formatted_url)
    }

    /// Join onto url
    pub fn join(&self, path: &str) -> Result<Url, Error> {
        let url = Url::parse(&self.0)?;

        let base_path = url.path();

        let normalized_path = if base_path.ends_with('/') {
            format!("{}{}", base_path, path)
        } else {
            format!("{}/{}", base_path, path)
        };

        let mut result = url.clone();
        result.set_path(&normalized_path);
        Ok(result)
    }

    /// Append path elements onto the URL
    pub fn join_paths(&self, path_elements: &[&str]) -> Result<Url, Error> {
        self.join(&path_elements.join("/"))
    }

    /// Parse a user supplied url, reporting failures as [`WalletError::InvalidMintUrl`]
    pub fn parse_for_wallet(url: &str) -> Result<Self, WalletError> {
        Self::from_str(url).map_err(|e| WalletError::InvalidMintUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl FromStr for MintUrl {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        match Self::format_url(url) {
            Ok(url) => Ok(Self(url)),
            Err(_) => Err(Error::InvalidUrl),
        }
    }
}

impl fmt::Display for MintUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
