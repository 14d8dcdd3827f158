//! Construction and signing of NIP-01 text notes.

use nostr_sdk::prelude::{
    Event, JsonUtil, Keys, Kind, PublicKey, SecretKey, Tag, Timestamp, UnsignedEvent,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::nostr_manager::keys::KeyPair;
use crate::nostr_manager::{NostrManagerError, Result};

/// Kind of every event this crate produces.
pub const TEXT_NOTE_KIND: u16 = 1;

/// A signed NIP-01 event, in the exact shape relays expect on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl SignedEvent {
    /// Checks the id and the Schnorr signature with `nostr-sdk`.
    pub fn verify(&self) -> Result<()> {
        let event = Event::from_json(serde_json::to_string(self)?)
            .map_err(|e| NostrManagerError::Signing(e.to_string()))?;
        event
            .verify()
            .map_err(|e| NostrManagerError::Signing(e.to_string()))
    }

    /// The `["EVENT", <event>]` client message carrying this event.
    pub fn to_relay_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(&("EVENT", self))?)
    }
}

/// Collects `["t", token]` tags for every `#token ` run in `content`.
///
/// This is a lexical scan: the token is the shortest run after `#` that is
/// followed by a space and contains no line break. Duplicates are kept.
pub fn extract_hashtags(content: &str) -> Vec<Vec<String>> {
    let mut tags = Vec::new();
    let mut rest = content;
    while let Some(hash) = rest.find('#') {
        let after = &rest[hash + 1..];
        match after.find(|c: char| c == ' ' || is_line_terminator(c)) {
            Some(end) if after[end..].starts_with(' ') => {
                tags.push(vec!["t".to_string(), after[..end].to_string()]);
                rest = &after[end + 1..];
            }
            _ => rest = after,
        }
    }
    tags
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// The canonical `[0, pubkey, created_at, kind, tags, content]` array, compact.
pub fn canonical_serialization(
    pubkey: &str,
    created_at: u64,
    tags: &[Vec<String>],
    content: &str,
) -> Result<String> {
    Ok(serde_json::to_string(&(
        0u8,
        pubkey,
        created_at,
        TEXT_NOTE_KIND,
        tags,
        content,
    ))?)
}

/// Lower-case hex SHA-256 of a canonical serialization.
pub fn event_id(serialized: &str) -> String {
    ::hex::encode(Sha256::digest(serialized.as_bytes()))
}

/// Builds and signs a kind-1 note for `content` at `created_at`.
pub fn sign_text_note(content: &str, keys: &KeyPair, created_at: u64) -> Result<SignedEvent> {
    let tags = extract_hashtags(content);
    let serialized = canonical_serialization(keys.public_hex(), created_at, &tags, content)?;
    let id = event_id(&serialized);

    let signer = Keys::new(SecretKey::from_hex(keys.secret_hex())?);
    let public_key = PublicKey::from_hex(keys.public_hex())?;
    if signer.public_key() != public_key {
        return Err(NostrManagerError::KeyMismatch);
    }

    let nostr_tags = tags
        .iter()
        .map(|tag| Tag::parse(tag.clone()))
        .collect::<std::result::Result<Vec<Tag>, _>>()
        .map_err(|e| NostrManagerError::Signing(e.to_string()))?;

    let event = UnsignedEvent::new(
        public_key,
        Timestamp::from(created_at),
        Kind::TextNote,
        nostr_tags,
        content,
    )
    .sign_with_keys(&signer)
    .map_err(|e| NostrManagerError::Signing(e.to_string()))?;

    if event.id.to_hex() != id {
        return Err(NostrManagerError::IdMismatch {
            expected: id,
            actual: event.id.to_hex(),
        });
    }

    tracing::debug!(
        target: "tg2nostr::nostr_manager::sign_text_note",
        "Signed event {} with {} tag(s)",
        id,
        tags.len()
    );

    Ok(SignedEvent {
        id,
        pubkey: keys.public_hex().to_string(),
        created_at,
        kind: TEXT_NOTE_KIND,
        tags,
        content: content.to_string(),
        sig: event.sig.to_string(),
    })
}
