//! Turns one channel post into the pieces of a note.

use std::sync::Arc;

use futures::future::join_all;

use crate::media_manager::{MediaFormat, MediaKind, MediaRef, MediaRehoster};
use crate::telegram::attribution::{forwarded_label, poll_content};
use crate::types::{FileRef, Post};

const SEGMENT_SEPARATOR: &str = "\n\n";

/// The fragments of one post, or of a whole media group once merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedContent {
    pub forwarded_label: Option<String>,
    pub text: String,
    pub emoji: Option<String>,
    pub media_urls: Vec<String>,
    pub poll: Option<String>,
}

impl ComposedContent {
    /// Joins `[label, text or emoji, urls…, poll]` with blank lines.
    ///
    /// Returns `None` when every segment is empty.
    pub fn render(&self) -> Option<String> {
        let mut segments: Vec<&str> = Vec::new();
        if let Some(label) = self.forwarded_label.as_deref() {
            segments.push(label);
        }
        if !self.text.is_empty() {
            segments.push(&self.text);
        } else if let Some(emoji) = self.emoji.as_deref() {
            segments.push(emoji);
        }
        segments.extend(self.media_urls.iter().map(String::as_str));
        if let Some(poll) = self.poll.as_deref() {
            segments.push(poll);
        }
        segments.retain(|segment| !segment.is_empty());

        (!segments.is_empty()).then(|| segments.join(SEGMENT_SEPARATOR))
    }

    /// Folds a later fragment into this one.
    ///
    /// Scalar fields keep the first non-empty value; media URLs are appended
    /// unless already present.
    pub fn merge(&mut self, other: ComposedContent) {
        if self.text.is_empty() {
            self.text = other.text;
        }
        keep_first(&mut self.forwarded_label, other.forwarded_label);
        keep_first(&mut self.emoji, other.emoji);
        keep_first(&mut self.poll, other.poll);
        for url in other.media_urls {
            if !url.is_empty() && !self.media_urls.contains(&url) {
                self.media_urls.push(url);
            }
        }
    }
}

fn keep_first(current: &mut Option<String>, candidate: Option<String>) {
    let is_empty = current.as_deref().is_none_or(str::is_empty);
    if is_empty && candidate.as_deref().is_some_and(|value| !value.is_empty()) {
        *current = candidate;
    }
}

/// `text`, else `caption`, else empty.
pub fn post_text(post: &Post) -> String {
    post.text
        .clone()
        .or_else(|| post.caption.clone())
        .unwrap_or_default()
}

/// The attachments of `post` in rendering order.
pub fn media_refs(post: &Post) -> Vec<MediaRef> {
    MediaKind::ALL
        .iter()
        .filter_map(|kind| media_ref(post, *kind))
        .collect()
}

fn media_ref(post: &Post, kind: MediaKind) -> Option<MediaRef> {
    let file = |slot: &Option<FileRef>| {
        slot.as_ref()
            .map(|f| f.file_id.as_str())
            .filter(|id| !id.is_empty())
            .map(|id| MediaRef::new(kind, id))
    };
    match kind {
        MediaKind::Photo => post
            .photo
            .last()
            .filter(|photo| !photo.file_id.is_empty())
            .map(|photo| MediaRef::new(kind, photo.file_id.as_str())),
        MediaKind::Sticker => {
            let sticker = post.sticker.as_ref().filter(|s| !s.file_id.is_empty())?;
            let thumbnail = sticker
                .thumbnail
                .as_ref()
                .or(sticker.thumb.as_ref())
                .map(|thumb| thumb.file_id.as_str())
                .filter(|id| !id.is_empty());
            match thumbnail {
                Some(thumb_id) if sticker.is_animated || sticker.is_video => {
                    Some(MediaRef::new(kind, thumb_id).with_format(MediaFormat::Png))
                }
                _ => Some(MediaRef::new(kind, sticker.file_id.as_str())),
            }
        }
        MediaKind::Video => file(&post.video),
        MediaKind::Animation => file(&post.animation),
        MediaKind::Document => file(&post.document),
        MediaKind::Audio => file(&post.audio),
        MediaKind::Voice => file(&post.voice),
        MediaKind::VideoNote => file(&post.video_note),
    }
}

pub struct ContentComposer {
    rehoster: Arc<MediaRehoster>,
}

impl ContentComposer {
    pub fn new(rehoster: Arc<MediaRehoster>) -> Self {
        Self { rehoster }
    }

    /// Extracts every fragment of `post`, rehosting its attachments concurrently.
    ///
    /// An attachment that cannot be rehosted is logged and left out.
    pub async fn compose(&self, post: &Post) -> ComposedContent {
        let refs = media_refs(post);
        let results = join_all(refs.iter().map(|media| self.rehoster.rehost(media))).await;

        let media_urls = refs
            .iter()
            .zip(results)
            .filter_map(|(media, result)| match result {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(
                        target: "tg2nostr::telegram::composer::compose",
                        "Skipping {} in post {}: {}",
                        media.kind,
                        post.message_id,
                        e
                    );
                    None
                }
            })
            .collect();

        ComposedContent {
            forwarded_label: forwarded_label(post),
            text: post_text(post),
            emoji: post
                .sticker
                .as_ref()
                .and_then(|sticker| sticker.emoji.clone())
                .filter(|emoji| !emoji.is_empty()),
            media_urls,
            poll: poll_content(post),
        }
    }
}
