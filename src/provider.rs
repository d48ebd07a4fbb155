//! Session provider and accessor
//!
//! `NostrChatProvider` owns a [`ChatSession`] and installs it as the current
//! session while a future (or closure) runs inside [`NostrChatProvider::scope`].
//! Code in that scope reaches the session through [`use_nostr_chat`].
//!
//! The scope is task-local: tasks spawned from inside it do not inherit it.
//! Pass [`NostrChatProvider::session`] to them explicitly.

use anyhow::Result;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::ChatConfig;
use crate::nostr::RelayConnector;
use crate::session::ChatSession;

tokio::task_local! {
    static CURRENT_SESSION: Arc<ChatSession>;
}

/// `use_nostr_chat` was called with no provider scope active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingProviderError;

impl fmt::Display for MissingProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("use_nostr_chat must be used within a NostrChatProvider")
    }
}

impl std::error::Error for MissingProviderError {}

pub struct NostrChatProvider {
    session: Arc<ChatSession>,
}

impl NostrChatProvider {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            session: Arc::new(ChatSession::new(config)),
        }
    }

    pub fn with_connector(config: ChatConfig, connector: Arc<dyn RelayConnector>) -> Self {
        Self {
            session: Arc::new(ChatSession::with_connector(config, connector)),
        }
    }

    pub fn session(&self) -> Arc<ChatSession> {
        self.session.clone()
    }

    /// Run `fut` with this provider's session as the current one
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT_SESSION.scope(self.session.clone(), fut).await
    }

    /// Run `f` with this provider's session as the current one
    pub fn sync_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT_SESSION.sync_scope(self.session.clone(), f)
    }
}

impl Default for NostrChatProvider {
    fn default() -> Self {
        Self::new(ChatConfig::default())
    }
}

/// The session of the enclosing provider scope.
///
/// Fails with [`MissingProviderError`] when called outside a scope.
pub fn use_nostr_chat() -> Result<Arc<ChatSession>> {
    CURRENT_SESSION
        .try_with(|session| session.clone())
        .map_err(|_| anyhow::Error::new(MissingProviderError))
}
