//! Telegram side of the bridge: the Bot API file client and post composition.

pub mod attribution;
pub mod composer;

use async_trait::async_trait;
use serde::Deserialize;

use crate::media_manager::{MediaError, MediaFormat, MediaSource, to_png_or_original};

pub use composer::{ComposedContent, ContentComposer};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct GetFileResponse {
    ok: bool,
    result: Option<TelegramFile>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_path: Option<String>,
}

/// Resolves and downloads files through the Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, bot_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        }
    }

    fn file_url(&self, path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_url, self.bot_token, path)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, MediaError> {
        let response = self
            .client
            .get(self.file_url(path))
            .send()
            .await
            .map_err(redact_url)?;
        if !response.status().is_success() {
            return Err(MediaError::Api(format!(
                "file download failed: {}",
                response.status()
            )));
        }
        Ok(response.bytes().await.map_err(redact_url)?.to_vec())
    }
}

/// Request URLs carry the bot token, so they never reach an error message.
fn redact_url(e: reqwest::Error) -> MediaError {
    MediaError::Http(e.without_url())
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .field("bot_token", &"<REDACTED>")
            .finish()
    }
}

#[async_trait]
impl MediaSource for TelegramClient {
    async fn resolve_path(&self, file_id: &str) -> Result<String, MediaError> {
        let response = self
            .client
            .get(format!("{}/bot{}/getFile", self.api_url, self.bot_token))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .map_err(redact_url)?;
        if !response.status().is_success() {
            return Err(MediaError::Api(format!(
                "getFile failed: {}",
                response.status()
            )));
        }

        let payload: GetFileResponse = response.json().await.map_err(redact_url)?;
        if !payload.ok {
            return Err(MediaError::Api(
                payload
                    .description
                    .unwrap_or_else(|| "getFile returned ok=false".to_string()),
            ));
        }
        payload
            .result
            .and_then(|file| file.file_path)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| MediaError::Api("getFile response missing file_path".to_string()))
    }

    async fn fetch_bytes(
        &self,
        path: &str,
        format: Option<MediaFormat>,
    ) -> Result<Vec<u8>, MediaError> {
        let bytes = self.download(path).await?;
        Ok(match format {
            Some(MediaFormat::Png) => to_png_or_original(bytes),
            None => bytes,
        })
    }
}
