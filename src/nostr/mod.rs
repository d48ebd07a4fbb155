//! Nostr relay plumbing for chat rooms
//!
//! Provides:
//! - Room filter / tag / event construction
//! - The relay connection traits and the network client
//! - An in-process relay for offline use

pub mod client;
pub mod events;
pub mod memory;

pub use client::{
    EventHandler, NostrConnector, NostrRelay, RelayConnector, RelayHandle, DEFAULT_CONNECT_WAIT,
    DEFAULT_RELAY,
};
pub use events::{
    room_filter, room_tag, sign_room_message, IncomingEvent, CHANNEL_MESSAGE_KIND,
};
pub use memory::{MemoryConnector, MemoryRelay};
