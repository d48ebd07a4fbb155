//! Session configuration

use serde::{Deserialize, Serialize};

use crate::nostr::DEFAULT_RELAY;

/// Environment variable overriding the relay URL
pub const RELAY_ENV: &str = "NOSTR_CHAT_RELAY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Websocket URL of the relay to join
    pub relay_url: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY.to_string(),
        }
    }
}

impl ChatConfig {
    pub fn with_relay(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
        }
    }

    /// Defaults, with the relay taken from `NOSTR_CHAT_RELAY` when set
    pub fn from_env() -> Self {
        match std::env::var(RELAY_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::with_relay(url.trim()),
            _ => Self::default(),
        }
    }
}
