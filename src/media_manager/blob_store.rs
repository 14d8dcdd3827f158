//! Upload of rehosted media to an HTTP object store.

use async_trait::async_trait;

use crate::media_manager::{BlobStore, MediaError, PutOptions};

/// Stores objects with `PUT <endpoint>/<key>` and serves them from `<public_url>/<key>`.
#[derive(Clone, Debug)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: String,
    public_url: String,
    token: Option<String>,
}

impl HttpBlobStore {
    /// Creates a new HttpBlobStore
    ///
    /// # Arguments
    /// * `endpoint` - Base URL uploads are sent to
    /// * `public_url` - Base URL readers fetch objects from; defaults to `endpoint`
    /// * `token` - Optional bearer token for uploads
    pub fn new(endpoint: &str, public_url: Option<&str>, token: Option<String>) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let public_url = public_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| endpoint.clone());
        Self {
            client: reqwest::Client::new(),
            endpoint,
            public_url,
            token,
        }
    }

    pub fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        options: &PutOptions,
    ) -> Result<String, MediaError> {
        tracing::debug!(
            target: "tg2nostr::media_manager::blob_store::put",
            "Uploading {} ({} bytes, {})",
            key,
            bytes.len(),
            options.content_type
        );

        let mut request = self
            .client
            .put(format!("{}/{}", self.endpoint, key))
            .header("Content-Type", options.content_type.as_str())
            .header("Cache-Control", options.cache_control.as_str());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.body(bytes).send().await?;
        if !response.status().is_success() {
            tracing::error!(
                target: "tg2nostr::media_manager::blob_store::put",
                "Upload of {} failed: {:?}",
                key,
                response
            );
            return Err(MediaError::Upload {
                status: response.status().as_u16(),
            });
        }

        Ok(self.public_url_for(key))
    }
}
