//! Coalescing of media-group fragments into a single note.
//!
//! Telegram delivers an album as one update per item, all sharing a
//! `media_group_id`. The first fragment for an id opens a group and arms a
//! fixed deadline; later fragments merge into it without moving the deadline.
//! When the deadline fires the group is removed from the table and delivered
//! once. Fragments arriving after that open a new group.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, join_all};
use tokio::sync::oneshot;

use crate::bridge::tasks::TaskHandle;
use crate::error::Result;
use crate::telegram::ComposedContent;

pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(2000);

/// Receives the rendered content of a flushed group.
pub type DeliveryCallback = Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wraps an async closure as a [`DeliveryCallback`].
pub fn delivery<F, Fut>(deliver: F) -> DeliveryCallback
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |content| deliver(content).boxed())
}

struct AggregationGroup {
    content: ComposedContent,
    deliver: DeliveryCallback,
    handle: TaskHandle,
    flush_now: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
pub struct AggregationWindow {
    groups: Arc<DashMap<String, AggregationGroup>>,
    delay: Duration,
}

impl Default for AggregationWindow {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_DELAY)
    }
}

impl AggregationWindow {
    pub fn new(delay: Duration) -> Self {
        Self {
            groups: Arc::new(DashMap::new()),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Adds a fragment to the pending group `group_id`, opening it if needed.
    ///
    /// Every call for the same pending group returns a clone of the same
    /// handle, which resolves once the group has been delivered (or skipped
    /// for being empty). The most recent `deliver` is the one invoked.
    pub fn enqueue(
        &self,
        group_id: &str,
        fragment: ComposedContent,
        deliver: DeliveryCallback,
    ) -> TaskHandle {
        match self.groups.entry(group_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let group = entry.get_mut();
                group.content.merge(fragment);
                group.deliver = deliver;
                tracing::debug!(
                    target: "tg2nostr::bridge::media_groups::enqueue",
                    "Merged fragment into media group {} ({} media)",
                    group_id,
                    group.content.media_urls.len()
                );
                group.handle.clone()
            }
            Entry::Vacant(entry) => {
                let mut content = ComposedContent::default();
                content.merge(fragment);

                let (flush_now, flush_signal) = oneshot::channel();
                let handle = TaskHandle::spawn(Self::flush_after(
                    self.groups.clone(),
                    group_id.to_string(),
                    self.delay,
                    flush_signal,
                ));
                entry.insert(AggregationGroup {
                    content,
                    deliver,
                    handle: handle.clone(),
                    flush_now: Some(flush_now),
                });
                tracing::debug!(
                    target: "tg2nostr::bridge::media_groups::enqueue",
                    "Opened media group {}, flushing in {:?}",
                    group_id,
                    self.delay
                );
                handle
            }
        }
    }

    async fn flush_after(
        groups: Arc<DashMap<String, AggregationGroup>>,
        group_id: String,
        delay: Duration,
        flush_signal: oneshot::Receiver<()>,
    ) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = flush_signal => {}
        }

        let Some((_, group)) = groups.remove(&group_id) else {
            return;
        };
        let Some(content) = group.content.render() else {
            tracing::debug!(
                target: "tg2nostr::bridge::media_groups::flush",
                "Media group {} has no content, skipping",
                group_id
            );
            return;
        };

        if let Err(e) = (group.deliver)(content).await {
            tracing::error!(
                target: "tg2nostr::bridge::media_groups::flush",
                "Failed to deliver media group {}: {}",
                group_id,
                e
            );
        }
    }

    /// Fires every armed deadline now.
    pub fn flush_pending(&self) {
        for mut group in self.groups.iter_mut() {
            if let Some(flush_now) = group.flush_now.take() {
                let _ = flush_now.send(());
            }
        }
    }

    /// Waits for every group that is pending right now to be delivered.
    pub async fn drain(&self) {
        let handles: Vec<TaskHandle> = self
            .groups
            .iter()
            .map(|group| group.handle.clone())
            .collect();
        join_all(handles).await;
    }

    pub fn pending_groups(&self) -> usize {
        self.groups.len()
    }
}

impl std::fmt::Debug for AggregationWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationWindow")
            .field("pending_groups", &self.pending_groups())
            .field("delay", &self.delay)
            .finish()
    }
}
