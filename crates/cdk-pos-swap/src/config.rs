//! Settings

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::mint_url::MintUrl;

/// Prefix of environment overrides, `CDK_POS_SWAP__HTTP__TIMEOUT_SECS=10`
pub const ENV_PREFIX: &str = "CDK_POS_SWAP";

/// Lightning settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lightning {
    /// Trusted mint that issues the Lightning invoices paid by unknown mints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_mint: Option<MintUrl>,
}

/// Http client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Http {
    /// Per request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Http {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Http {
    /// Per request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Unit of the temporary wallets
    pub unit: String,
    /// Lightning settings
    pub lightning: Lightning,
    /// Http settings
    pub http: Http,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            unit: "sat".to_string(),
            lightning: Lightning::default(),
            http: Http::default(),
        }
    }
}

impl Settings {
    /// Load settings
    ///
    /// Defaults, overridden by the TOML file at `config_file` if given,
    /// overridden by `CDK_POS_SWAP__*` environment variables.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let default = Self::default();

        let mut builder = Config::builder().add_source(Config::try_from(&default)?);

        if let Some(config_file) = config_file {
            builder = builder.add_source(File::from(config_file));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;

        if settings.http.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(settings)
    }
}
