use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Media configuration error: {0}")]
    Configuration(String),
    #[error("Telegram API error: {0}")]
    Api(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upload failed with status: {status}")]
    Upload { status: u16 },
    #[error("Failed to transcode image: {0}")]
    Transcode(String),
}
