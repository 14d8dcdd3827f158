use crate::media_manager::MediaError;
use crate::nostr_manager::{KeyError, NostrManagerError};
use thiserror::Error;

pub type Result<T> = core::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Logging setup error: {0}")]
    LoggingSetup(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Nostr manager error: {0}")]
    NostrManager(#[from] NostrManagerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
