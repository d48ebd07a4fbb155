//! Relay connection layer
//!
//! `RelayConnector` opens a connection, `RelayHandle` is what the session
//! talks to afterwards. `NostrConnector` is the network implementation on top
//! of `nostr_sdk::Client`.

use anyhow::{bail, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use nostr_sdk::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::events::IncomingEvent;

/// Default public relay
pub const DEFAULT_RELAY: &str = "wss://relay.damus.io";

/// How long `NostrConnector` waits for the websocket to open
pub const DEFAULT_CONNECT_WAIT: Duration = Duration::from_secs(5);

/// Callback invoked for every event a subscription receives
pub type EventHandler = Arc<dyn Fn(IncomingEvent) + Send + Sync>;

/// Opens relay connections
pub trait RelayConnector: Send + Sync {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<dyn RelayHandle>>>;
}

/// A live relay connection
pub trait RelayHandle: Send + Sync {
    /// Start a subscription; `on_event` runs for each matching event
    fn subscribe(&self, filter: Filter, on_event: EventHandler)
        -> BoxFuture<'_, Result<SubscriptionId>>;

    /// Close a subscription
    fn unsubscribe(&self, id: SubscriptionId) -> BoxFuture<'_, ()>;

    /// Send a signed event
    fn publish(&self, event: Event) -> BoxFuture<'_, Result<EventId>>;

    /// Close every subscription and the connection itself
    fn disconnect(&self) -> BoxFuture<'_, ()>;
}

/// Connector for real websocket relays
#[derive(Debug, Clone, Copy)]
pub struct NostrConnector {
    connect_wait: Duration,
}

impl NostrConnector {
    pub fn with_connect_wait(connect_wait: Duration) -> Self {
        Self { connect_wait }
    }
}

impl Default for NostrConnector {
    fn default() -> Self {
        Self::with_connect_wait(DEFAULT_CONNECT_WAIT)
    }
}

impl RelayConnector for NostrConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<dyn RelayHandle>>> {
        async move {
            let relay = NostrRelay::connect(url, self.connect_wait).await?;
            Ok(Arc::new(relay) as Arc<dyn RelayHandle>)
        }
        .boxed()
    }
}

/// Relay connection backed by `nostr_sdk::Client`
pub struct NostrRelay {
    client: Client,
    listeners: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl NostrRelay {
    /// Add the relay and wait up to `wait` for its websocket to open.
    ///
    /// The client keeps retrying in the background, so a relay that is still
    /// not connected when the wait ends counts as a failed connect.
    pub async fn connect(url: &str, wait: Duration) -> Result<Self> {
        // Events are signed by the session, the client needs no signer
        let client = Client::default();

        client.add_relay(url).await?;
        client.connect_with_timeout(wait).await;

        let status = client.relay(url).await?.status();
        if status != RelayStatus::Connected {
            if let Err(error) = client.disconnect().await {
                tracing::debug!("closing unconnected client failed: {error}");
            }
            bail!("relay {url} is {status:?} after waiting {wait:?}");
        }
        tracing::info!("connected to relay {url}");

        Ok(Self {
            client,
            listeners: Mutex::new(HashMap::new()),
        })
    }
}

impl RelayHandle for NostrRelay {
    fn subscribe(
        &self,
        filter: Filter,
        on_event: EventHandler,
    ) -> BoxFuture<'_, Result<SubscriptionId>> {
        async move {
            // Take the receiver before subscribing so no early event is missed
            let mut notifications = self.client.notifications();
            let output = self.client.subscribe(vec![filter], None).await?;
            let id = output.val;

            let wanted = id.clone();
            let listener = tokio::spawn(async move {
                loop {
                    match notifications.recv().await {
                        Ok(RelayPoolNotification::Event {
                            subscription_id,
                            event,
                            ..
                        }) if subscription_id == wanted => {
                            on_event(IncomingEvent::from(event.as_ref()));
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("subscription {wanted} lagged, {skipped} notifications dropped");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            self.listeners.lock().await.insert(id.clone(), listener);
            tracing::debug!("subscribed {id}");
            Ok(id)
        }
        .boxed()
    }

    fn unsubscribe(&self, id: SubscriptionId) -> BoxFuture<'_, ()> {
        async move {
            if let Some(listener) = self.listeners.lock().await.remove(&id) {
                listener.abort();
            }
            self.client.unsubscribe(id.clone()).await;
            tracing::debug!("unsubscribed {id}");
        }
        .boxed()
    }

    fn publish(&self, event: Event) -> BoxFuture<'_, Result<EventId>> {
        async move {
            let output = self.client.send_event(event).await?;
            Ok(output.val)
        }
        .boxed()
    }

    fn disconnect(&self) -> BoxFuture<'_, ()> {
        async move {
            for (_, listener) in self.listeners.lock().await.drain() {
                listener.abort();
            }
            if let Err(error) = self.client.disconnect().await {
                tracing::warn!("failed to disconnect cleanly: {error}");
            }
        }
        .boxed()
    }
}
