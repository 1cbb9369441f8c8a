//! Gateway configuration.
//!
//! Loaded from a TOML file. Credential fields may be left out of the file
//! and supplied through `VENUE_*` environment variables (or a `.env` file)
//! instead; the environment wins when both are set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use auth::VenueCredentials;
use common::LinearBackoff;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Where the two venue channels live and how sessions are opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Front address of the trading channel, e.g. `tcp://180.168.146.187:10000`
    pub trading_address: String,
    /// Front address of the market-data channel
    pub market_data_address: String,
    /// Directory for the transport's per-channel scratch files
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Send an authenticate request before login
    #[serde(default)]
    pub require_authentication: bool,
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("venue-gateway")
}

/// Login identity. Every field can be overridden from the environment.
///
/// Only lives until [`GatewayConfig::credentials`] moves the secrets into
/// [`VenueCredentials`].
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub broker_id: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth_code: Option<String>,
    #[serde(default)]
    pub product_info: Option<String>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("user_id", &self.user_id)
            .field("broker_id", &self.broker_id)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("auth_code", &self.auth_code.as_ref().map(|_| "[REDACTED]"))
            .field("product_info", &self.product_info)
            .finish()
    }
}

/// Bounded linear retry for logins and queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Wait window of the first attempt; attempt `n` waits `n` times this
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub venue: VenueConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl GatewayConfig {
    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, GatewayError> {
        let config: Self =
            toml::from_str(text).map_err(|e| GatewayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.venue.trading_address.is_empty() {
            return Err(GatewayError::Config("venue.trading_address is empty".into()));
        }
        if self.venue.market_data_address.is_empty() {
            return Err(GatewayError::Config(
                "venue.market_data_address is empty".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(GatewayError::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolve the login identity, letting `VENUE_*` variables override the file.
    pub fn credentials(&self) -> Result<VenueCredentials, GatewayError> {
        dotenvy::dotenv().ok();

        let file = &self.credentials;
        let user_id = env_or("VENUE_USER_ID", Some(file.user_id.clone()));
        let broker_id = env_or("VENUE_BROKER_ID", Some(file.broker_id.clone()));
        let password = env_or("VENUE_PASSWORD", file.password.clone()).ok_or_else(|| {
            GatewayError::Config("no password in config or VENUE_PASSWORD".into())
        })?;

        let credentials = VenueCredentials::new(
            user_id.unwrap_or_default(),
            broker_id.unwrap_or_default(),
            password,
        )?;
        Ok(credentials.with_authentication(
            env_or("VENUE_AUTH_CODE", file.auth_code.clone()),
            env_or("VENUE_PRODUCT_INFO", file.product_info.clone()),
        ))
    }

    pub fn backoff(&self) -> LinearBackoff {
        LinearBackoff::new(self.retry.base_delay(), self.retry.max_attempts)
    }

    /// Scratch directory handed to the trading transport.
    pub fn trading_scratch_dir(&self) -> PathBuf {
        self.venue.scratch_dir.join("trading")
    }

    /// Scratch directory handed to the market-data transport.
    pub fn market_data_scratch_dir(&self) -> PathBuf {
        self.venue.scratch_dir.join("market_data")
    }
}

fn env_or(name: &str, fallback: Option<String>) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .or(fallback)
}
