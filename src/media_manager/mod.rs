//! Rehosting of post attachments.
//!
//! Every attachment is fetched from a [`MediaSource`], converted if needed,
//! and uploaded to a [`BlobStore`] under a fresh time-ordered key. The URL the
//! store hands back is what ends up in the note.

mod blob_store;
mod errors;
mod object_key;
mod transcode;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use blob_store::HttpBlobStore;
pub use errors::MediaError;
pub use object_key::{ObjectKeyGenerator, content_type_for_extension, path_extension};
pub use transcode::{to_png, to_png_or_original};
pub use types::*;

pub const CACHE_CONTROL: &str = "public, max-age=86400";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_EXTENSION: &str = "bin";

/// Where attachment bytes come from.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Resolves a file id to a downloadable path.
    async fn resolve_path(&self, file_id: &str) -> Result<String, MediaError>;

    /// Downloads `path`, converted to `format` when one is requested.
    async fn fetch_bytes(
        &self,
        path: &str,
        format: Option<MediaFormat>,
    ) -> Result<Vec<u8>, MediaError>;
}

/// Where rehosted attachments are stored.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, options: &PutOptions)
    -> Result<String, MediaError>;
}

pub struct MediaRehoster {
    source: Option<Arc<dyn MediaSource>>,
    store: Option<Arc<dyn BlobStore>>,
    keys: ObjectKeyGenerator,
}

impl MediaRehoster {
    /// Either collaborator may be missing; every [`rehost`](Self::rehost)
    /// call then fails with [`MediaError::Configuration`].
    pub fn new(source: Option<Arc<dyn MediaSource>>, store: Option<Arc<dyn BlobStore>>) -> Self {
        Self {
            source,
            store,
            keys: ObjectKeyGenerator::new(),
        }
    }

    pub async fn rehost(&self, media: &MediaRef) -> Result<String, MediaError> {
        let source = self.source.as_ref().ok_or_else(|| {
            MediaError::Configuration(format!(
                "missing Telegram bot token, skipping {}",
                media.kind
            ))
        })?;
        let store = self.store.as_ref().ok_or_else(|| {
            MediaError::Configuration(format!(
                "missing blob store endpoint, skipping {}",
                media.kind
            ))
        })?;

        let path = source.resolve_path(&media.file_id).await?;
        let bytes = source.fetch_bytes(&path, media.format).await?;

        let sniffed = infer::get(&bytes);
        let path_ext = path_extension(&path);
        // A failed transcode hands back the original bytes, so the requested
        // format says nothing about what is actually uploaded.
        let content_type = match sniffed {
            Some(kind) => kind.mime_type().to_string(),
            None => path_ext
                .as_deref()
                .and_then(content_type_for_extension)
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
        };
        let extension = media
            .format
            .map(|format| format.extension().to_string())
            .or(path_ext)
            .or_else(|| sniffed.map(|kind| kind.extension().to_string()))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        let key = self.keys.next_key(&extension);
        let options = PutOptions {
            content_type,
            cache_control: CACHE_CONTROL.to_string(),
        };
        let url = store.put(&key, bytes, &options).await?;

        tracing::debug!(
            target: "tg2nostr::media_manager::rehost",
            "Rehosted {} {} as {}",
            media.kind,
            media.file_id,
            url
        );
        Ok(url)
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Serves bytes from memory; paths are `files/<file_id>.<ext>`.
    #[derive(Default)]
    pub(crate) struct InMemorySource {
        files: HashMap<String, (String, Vec<u8>)>,
        pub(crate) requested_formats: Mutex<Vec<(String, Option<MediaFormat>)>>,
    }

    impl InMemorySource {
        pub(crate) fn with_file(mut self, file_id: &str, extension: &str, bytes: &[u8]) -> Self {
            self.files.insert(
                file_id.to_string(),
                (format!("files/{file_id}.{extension}"), bytes.to_vec()),
            );
            self
        }
    }

    #[async_trait]
    impl MediaSource for InMemorySource {
        async fn resolve_path(&self, file_id: &str) -> Result<String, MediaError> {
            self.files
                .get(file_id)
                .map(|(path, _)| path.clone())
                .ok_or_else(|| MediaError::Api(format!("unknown file {file_id}")))
        }

        async fn fetch_bytes(
            &self,
            path: &str,
            format: Option<MediaFormat>,
        ) -> Result<Vec<u8>, MediaError> {
            self.requested_formats
                .lock()
                .unwrap()
                .push((path.to_string(), format));
            self.files
                .values()
                .find(|(stored, _)| stored == path)
                .map(|(_, bytes)| bytes.clone())
                .ok_or_else(|| MediaError::Api(format!("unknown path {path}")))
        }
    }

    /// Keeps uploads in memory and serves them from `https://blobs.test/<key>`.
    #[derive(Default)]
    pub(crate) struct InMemoryStore {
        pub(crate) objects: Mutex<Vec<(String, Vec<u8>, PutOptions)>>,
    }

    #[async_trait]
    impl BlobStore for InMemoryStore {
        async fn put(
            &self,
            key: &str,
            bytes: Vec<u8>,
            options: &PutOptions,
        ) -> Result<String, MediaError> {
            self.objects
                .lock()
                .unwrap()
                .push((key.to_string(), bytes, options.clone()));
            Ok(format!("https://blobs.test/{key}"))
        }
    }
}
