//! Room event construction and parsing
//!
//! Room messages are NIP-28 channel messages (kind 42) carrying exactly one
//! `d` tag whose value is the room id.

use anyhow::Result;
use nostr_sdk::prelude::*;

use crate::types::Message;

/// Kind used for room messages
pub const CHANNEL_MESSAGE_KIND: u16 = 42;

/// The single-letter tag that carries the room id
fn room_tag_kind() -> SingleLetterTag {
    SingleLetterTag::lowercase(Alphabet::D)
}

/// Filter selecting every message posted to `room_id`
pub fn room_filter(room_id: &str) -> Filter {
    Filter::new()
        .kind(Kind::from(CHANNEL_MESSAGE_KIND))
        .custom_tag(room_tag_kind(), vec![room_id.to_string()])
}

/// `["d", room_id]`
pub fn room_tag(room_id: &str) -> Tag {
    Tag::custom(
        TagKind::SingleLetter(room_tag_kind()),
        vec![room_id.to_string()],
    )
}

/// Build and sign a room message created at `created_at`
pub fn sign_room_message(
    room_id: &str,
    content: &str,
    created_at: Timestamp,
    keys: &Keys,
) -> Result<Event> {
    let event = EventBuilder::new(Kind::from(CHANNEL_MESSAGE_KIND), content)
        .tags(vec![room_tag(room_id)])
        .custom_created_at(created_at)
        .sign_with_keys(keys)?;
    Ok(event)
}

/// The fields of a relay event the chat cares about.
///
/// Kept independent of `nostr_sdk::Event` so relays other than the network
/// one can hand events to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub id: String,
    pub content: String,
    pub pubkey: String,
    pub created_at: u64,
}

impl From<&Event> for IncomingEvent {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.to_hex(),
            content: event.content.clone(),
            pubkey: event.pubkey.to_hex(),
            created_at: event.created_at.as_u64(),
        }
    }
}

impl From<IncomingEvent> for Message {
    fn from(event: IncomingEvent) -> Self {
        Message {
            id: Some(event.id),
            message: event.content,
            pubkey: event.pubkey,
            timestamp: Some(event.created_at),
        }
    }
}
