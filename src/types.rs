//! Chat data types shared by the session, the relay layer and the CLI

use serde::{Deserialize, Serialize};

/// A chat message as shown to the user.
///
/// Messages keep the order in which they arrived from the relay; they are
/// never re-sorted by `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Event id assigned by the signer (hex)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Text content
    pub message: String,
    /// Author public key (hex)
    pub pubkey: String,
    /// Creation time in unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// The key pair a session publishes with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Public key (hex)
    pub pubkey: String,
    /// Secret key in bech32 `nsec1...` form
    pub nsec: String,
    /// Opaque identifier from the embedding application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl User {
    pub fn new(pubkey: impl Into<String>, nsec: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            nsec: nsec.into(),
            external_id: None,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// Output of key generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedKeys {
    pub nsec: String,
    pub pubkey: String,
}

impl From<GeneratedKeys> for User {
    fn from(keys: GeneratedKeys) -> Self {
        User::new(keys.pubkey, keys.nsec)
    }
}
