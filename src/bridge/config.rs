use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::telegram::DEFAULT_API_URL;

pub const DEFAULT_RELAY_URL: &str = "wss://nos.lol";
const DEFAULT_RELAY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_MEDIA_GROUP_FLUSH_MS: u64 = 2000;

/// Runtime settings for a [`Bridge`](crate::Bridge).
///
/// Key material is kept as configured and only normalized when an event is
/// signed.
#[derive(Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_api_url: String,
    pub nostr_public_key: Option<String>,
    pub nostr_private_key: Option<String>,
    pub relay_url: String,
    pub relay_timeout: Duration,
    pub media_group_flush_delay: Duration,
    pub blob_store_endpoint: Option<String>,
    pub blob_store_public_url: Option<String>,
    pub blob_store_token: Option<String>,
    pub logs_dir: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            telegram_api_url: DEFAULT_API_URL.to_string(),
            nostr_public_key: None,
            nostr_private_key: None,
            relay_url: DEFAULT_RELAY_URL.to_string(),
            relay_timeout: Duration::from_millis(DEFAULT_RELAY_TIMEOUT_MS),
            media_group_flush_delay: Duration::from_millis(DEFAULT_MEDIA_GROUP_FLUSH_MS),
            blob_store_endpoint: None,
            blob_store_public_url: None,
            blob_store_token: None,
            logs_dir: None,
        }
    }
}

impl BridgeConfig {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(BridgeError::Configuration(format!(
                    "Failed to load .env file: {}",
                    e
                )));
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN"),
            telegram_api_url: var("TELEGRAM_API_URL").unwrap_or(defaults.telegram_api_url),
            nostr_public_key: var("NOSTR_PUBLIC_KEY"),
            nostr_private_key: var("NOSTR_PRIVATE_KEY"),
            relay_url: var("NOSTR_RELAY_URL").unwrap_or(defaults.relay_url),
            relay_timeout: millis("NOSTR_RELAY_TIMEOUT_MS", var("NOSTR_RELAY_TIMEOUT_MS"))?
                .unwrap_or(defaults.relay_timeout),
            media_group_flush_delay: millis("MEDIA_GROUP_FLUSH_MS", var("MEDIA_GROUP_FLUSH_MS"))?
                .unwrap_or(defaults.media_group_flush_delay),
            blob_store_endpoint: var("BLOB_STORE_ENDPOINT"),
            blob_store_public_url: var("BLOB_STORE_PUBLIC_URL"),
            blob_store_token: var("BLOB_STORE_TOKEN"),
            logs_dir: var("TG2NOSTR_LOGS_DIR").map(PathBuf::from),
        })
    }
}

fn millis(name: &str, value: Option<String>) -> Result<Option<Duration>> {
    value
        .map(|value| {
            value.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                BridgeError::Configuration(format!(
                    "{name} must be a whole number of milliseconds, got {value:?}"
                ))
            })
        })
        .transpose()
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<REDACTED>");
        f.debug_struct("BridgeConfig")
            .field("telegram_bot_token", &redacted(&self.telegram_bot_token))
            .field("telegram_api_url", &self.telegram_api_url)
            .field("nostr_public_key", &self.nostr_public_key)
            .field("nostr_private_key", &redacted(&self.nostr_private_key))
            .field("relay_url", &self.relay_url)
            .field("relay_timeout", &self.relay_timeout)
            .field("media_group_flush_delay", &self.media_group_flush_delay)
            .field("blob_store_endpoint", &self.blob_store_endpoint)
            .field("blob_store_public_url", &self.blob_store_public_url)
            .field("blob_store_token", &redacted(&self.blob_store_token))
            .field("logs_dir", &self.logs_dir)
            .finish()
    }
}
