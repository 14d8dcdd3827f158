use std::time::Duration;

use nostr_sdk::prelude::Timestamp;
use thiserror::Error;

pub mod event;
pub mod keys;
pub mod publisher;

pub use event::SignedEvent;
pub use keys::{KeyError, KeyPair, KeyRole};
pub use publisher::{RelayPublisher, RelayReply};

#[derive(Error, Debug)]
pub enum NostrManagerError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Missing {0} key in configuration")]
    MissingKey(&'static str),
    #[error("Configured public key does not belong to the configured secret key")]
    KeyMismatch,
    #[error("Nostr key error: {0}")]
    NostrKey(#[from] nostr_sdk::key::Error),
    #[error("Signing error: {0}")]
    Signing(String),
    #[error("Event id mismatch: computed {expected}, nostr-sdk computed {actual}")]
    IdMismatch { expected: String, actual: String },
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Relay transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Relay did not answer within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, NostrManagerError>;

/// Signs composed content with the configured identity and hands it to the relay.
///
/// Key material is kept exactly as configured and normalized again on every
/// call to [`NostrManager::sign`].
#[derive(Clone)]
pub struct NostrManager {
    publisher: RelayPublisher,
    public_key: Option<String>,
    secret_key: Option<String>,
}

impl NostrManager {
    /// Default timeout for relay round trips
    pub(crate) fn default_timeout() -> Duration {
        Duration::from_secs(5)
    }

    pub fn new(
        publisher: RelayPublisher,
        public_key: Option<String>,
        secret_key: Option<String>,
    ) -> Self {
        Self {
            publisher,
            public_key,
            secret_key,
        }
    }

    pub fn publisher(&self) -> &RelayPublisher {
        &self.publisher
    }

    /// Normalizes the configured key material into a fresh [`KeyPair`].
    pub fn key_pair(&self) -> Result<KeyPair> {
        let public_key = self
            .public_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(NostrManagerError::MissingKey("public"))?;
        let secret_key = self
            .secret_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(NostrManagerError::MissingKey("secret"))?;
        Ok(KeyPair::normalize(public_key, secret_key)?)
    }

    /// Signs `content` as a text note created now.
    pub fn sign(&self, content: &str) -> Result<SignedEvent> {
        let keys = self.key_pair()?;
        event::sign_text_note(content, &keys, Timestamp::now().as_u64())
    }

    /// Delivers an already signed event; see [`RelayPublisher::publish`].
    pub async fn publish(&self, event: &SignedEvent) -> Result<RelayReply> {
        self.publisher.publish(event).await
    }

    pub async fn sign_and_publish(&self, content: &str) -> Result<(SignedEvent, RelayReply)> {
        let event = self.sign(content)?;
        let reply = self.publish(&event).await?;
        Ok((event, reply))
    }
}

impl std::fmt::Debug for NostrManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NostrManager")
            .field("publisher", &self.publisher)
            .field("public_key", &self.public_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}
