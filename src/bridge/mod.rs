//! The per-instance application object that wires a post to a relay.

pub mod config;
pub mod media_groups;
pub mod tasks;


use std::sync::Arc;

use crate::error::Result;
use crate::media_manager::{BlobStore, HttpBlobStore, MediaRehoster, MediaSource};
use crate::nostr_manager::{NostrManager, RelayPublisher, RelayReply, SignedEvent};
use crate::telegram::{ContentComposer, TelegramClient};
use crate::types::Update;

pub use config::BridgeConfig;
pub use media_groups::{AggregationWindow, DeliveryCallback, delivery};
pub use tasks::{BackgroundTasks, TaskHandle};

/// What [`Bridge::handle_update`] did with an update.
#[derive(Debug)]
pub enum Dispatch {
    /// The update carried no channel post.
    Ignored,
    /// The post had nothing to relay.
    Empty,
    /// The post joined a media group that will be published later.
    Queued(TaskHandle),
    /// The post was signed and its publish is running in the background.
    Published { event_id: String, handle: TaskHandle },
}

impl Dispatch {
    pub fn handle(&self) -> Option<&TaskHandle> {
        match self {
            Dispatch::Queued(handle) | Dispatch::Published { handle, .. } => Some(handle),
            Dispatch::Ignored | Dispatch::Empty => None,
        }
    }
}

pub struct Bridge {
    composer: ContentComposer,
    nostr: NostrManager,
    media_groups: AggregationWindow,
    tasks: Arc<BackgroundTasks>,
}

impl Bridge {
    /// Builds a bridge with the Bot API as media source and an HTTP blob store.
    ///
    /// Media collaborators whose configuration is missing are left out; their
    /// attachments are then skipped with a warning instead of failing the post.
    pub fn new(config: &BridgeConfig) -> Self {
        let source: Option<Arc<dyn MediaSource>> =
            config.telegram_bot_token.as_ref().map(|token| {
                Arc::new(TelegramClient::new(&config.telegram_api_url, token.clone()))
                    as Arc<dyn MediaSource>
            });
        let store: Option<Arc<dyn BlobStore>> =
            config.blob_store_endpoint.as_ref().map(|endpoint| {
                Arc::new(HttpBlobStore::new(
                    endpoint,
                    config.blob_store_public_url.as_deref(),
                    config.blob_store_token.clone(),
                )) as Arc<dyn BlobStore>
            });
        if source.is_none() {
            tracing::warn!(
                target: "tg2nostr::bridge::new",
                "TELEGRAM_BOT_TOKEN is not set, media will be skipped"
            );
        }
        if store.is_none() {
            tracing::warn!(
                target: "tg2nostr::bridge::new",
                "BLOB_STORE_ENDPOINT is not set, media will be skipped"
            );
        }

        let nostr = NostrManager::new(
            RelayPublisher::new(config.relay_url.clone(), config.relay_timeout),
            config.nostr_public_key.clone(),
            config.nostr_private_key.clone(),
        );

        Self::with_components(
            ContentComposer::new(Arc::new(MediaRehoster::new(source, store))),
            nostr,
            AggregationWindow::new(config.media_group_flush_delay),
        )
    }

    pub fn with_components(
        composer: ContentComposer,
        nostr: NostrManager,
        media_groups: AggregationWindow,
    ) -> Self {
        Self {
            composer,
            nostr,
            media_groups,
            tasks: Arc::new(BackgroundTasks::new()),
        }
    }

    /// Relays one Telegram update.
    ///
    /// Grouped posts are queued and published when their group flushes.
    /// Anything else is signed right away, so key problems surface here, and
    /// published in the background.
    pub async fn handle_update(&self, update: &Update) -> Result<Dispatch> {
        let Some(post) = update.channel_post.as_ref() else {
            tracing::debug!(
                target: "tg2nostr::bridge::handle_update",
                "Update {} has no channel_post, ignoring",
                update.update_id
            );
            return Ok(Dispatch::Ignored);
        };

        let content = self.composer.compose(post).await;

        if let Some(group_id) = post.media_group_id.as_deref().filter(|id| !id.is_empty()) {
            let handle = self
                .media_groups
                .enqueue(group_id, content, self.group_delivery());
            self.tasks.track(handle.clone());
            return Ok(Dispatch::Queued(handle));
        }

        let Some(rendered) = content.render() else {
            tracing::debug!(
                target: "tg2nostr::bridge::handle_update",
                "Post {} has no text, media or poll, nothing to relay",
                post.message_id
            );
            return Ok(Dispatch::Empty);
        };

        let event = self.nostr.sign(&rendered)?;
        let event_id = event.id.clone();
        let handle = self.background_publish(event);
        Ok(Dispatch::Published { event_id, handle })
    }

    /// Fires every pending media group and waits for all outstanding publishes.
    pub async fn shutdown(&self) {
        tracing::info!(
            target: "tg2nostr::bridge::shutdown",
            "Flushing {} pending media group(s) and {} task(s)",
            self.media_groups.pending_groups(),
            self.tasks.outstanding()
        );
        self.media_groups.flush_pending();
        self.media_groups.drain().await;
        self.tasks.drain().await;
    }

    pub fn pending_groups(&self) -> usize {
        self.media_groups.pending_groups()
    }

    fn group_delivery(&self) -> DeliveryCallback {
        let nostr = self.nostr.clone();
        delivery(move |content| {
            let nostr = nostr.clone();
            async move {
                let (event, reply) = nostr.sign_and_publish(&content).await?;
                log_reply(&event, &reply);
                Ok(())
            }
        })
    }

    fn background_publish(&self, event: SignedEvent) -> TaskHandle {
        let nostr = self.nostr.clone();
        let handle = TaskHandle::spawn(async move {
            match nostr.publish(&event).await {
                Ok(reply) => log_reply(&event, &reply),
                Err(e) => {
                    tracing::warn!(
                        target: "tg2nostr::bridge::background_publish",
                        "Failed to publish event {}: {}",
                        event.id,
                        e
                    );
                }
            }
        });
        self.tasks.track(handle.clone());
        handle
    }
}

fn log_reply(event: &SignedEvent, reply: &RelayReply) {
    match reply {
        RelayReply::Message(message) => tracing::info!(
            target: "tg2nostr::bridge::publish",
            "Relay response for {}: {}",
            event.id,
            message
        ),
        RelayReply::Closed => tracing::info!(
            target: "tg2nostr::bridge::publish",
            "Relay closed the connection after event {}",
            event.id
        ),
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("nostr", &self.nostr)
            .field("media_groups", &self.media_groups)
            .field("tasks", &self.tasks.outstanding())
            .finish()
    }
}
