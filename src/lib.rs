//! Join public Nostr chat rooms.
//!
//! A [`NostrChatProvider`] owns a [`ChatSession`]: one lazily opened relay
//! connection, the room message list, the active room and the active user.
//! Inside the provider's scope, [`use_nostr_chat`] returns that session.
//!
//! ```no_run
//! use nostr_chat::{use_nostr_chat, ChatConfig, NostrChatProvider, User};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let provider = NostrChatProvider::new(ChatConfig::default());
//! provider
//!     .scope(async {
//!         let chat = use_nostr_chat()?;
//!         chat.set_user(Some(User::from(chat.generate_nsec()?)));
//!         chat.subscribe_room("lobby").await;
//!         chat.publish_message("hello").await
//!     })
//!     .await
//! # }
//! ```

pub mod config;
pub mod keys;
pub mod nostr;
pub mod provider;
pub mod session;
pub mod types;

pub use config::ChatConfig;
pub use keys::{generate_nsec, pubkey_from_nsec, resolve_sk};
pub use provider::{use_nostr_chat, MissingProviderError, NostrChatProvider};
pub use session::ChatSession;
pub use types::{GeneratedKeys, Message, User};
