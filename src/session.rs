//! Chat session
//!
//! Owns the relay connection and the chat state: the message list, the
//! active room and the active user.
//!
//! The connection is opened lazily on first use. Every caller that needs it
//! before it resolves waits on the same pending attempt, so a session never
//! opens more than one. A failed attempt is remembered and turns every later
//! subscribe or publish into a no-op; there is no reconnect.

use anyhow::Result;
use nostr_sdk::prelude::*;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OnceCell};

use crate::config::ChatConfig;
use crate::keys;
use crate::nostr::{
    room_filter, sign_room_message, EventHandler, IncomingEvent, NostrConnector, RelayConnector,
    RelayHandle,
};
use crate::types::{GeneratedKeys, Message, User};

pub struct ChatSession {
    config: ChatConfig,
    connector: Arc<dyn RelayConnector>,
    relay: OnceCell<Option<Arc<dyn RelayHandle>>>,
    messages: Arc<watch::Sender<Option<Vec<Message>>>>,
    room_id: watch::Sender<Option<String>>,
    user: watch::Sender<Option<User>>,
    /// Room and subscription opened by the last `subscribe_room`
    room_subscription: Mutex<Option<(String, SubscriptionId)>>,
}

impl ChatSession {
    /// Session talking to the configured websocket relay
    pub fn new(config: ChatConfig) -> Self {
        Self::with_connector(config, Arc::new(NostrConnector::default()))
    }

    pub fn with_connector(config: ChatConfig, connector: Arc<dyn RelayConnector>) -> Self {
        Self {
            config,
            connector,
            relay: OnceCell::new(),
            messages: Arc::new(watch::channel(None).0),
            room_id: watch::channel(None).0,
            user: watch::channel(None).0,
            room_subscription: Mutex::new(None),
        }
    }

    pub fn relay_url(&self) -> &str {
        &self.config.relay_url
    }

    /// The shared connection, opened on first call
    async fn relay(&self) -> Option<Arc<dyn RelayHandle>> {
        self.relay
            .get_or_init(|| async {
                let url = &self.config.relay_url;
                match self.connector.connect(url).await {
                    Ok(relay) => Some(relay),
                    Err(error) => {
                        tracing::warn!("failed to connect to relay {url}: {error:#}");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// True once a connection attempt has succeeded
    pub fn is_connected(&self) -> bool {
        matches!(self.relay.get(), Some(Some(_)))
    }

    /// Subscribe with an arbitrary filter.
    ///
    /// Each received event becomes a [`Message`] appended to the list. Returns
    /// `None` when there is no usable connection or the relay rejected the
    /// subscription.
    pub async fn subscribe(&self, filter: Filter) -> Option<SubscriptionId> {
        let relay = self.relay().await?;

        let messages = self.messages.clone();
        let on_event: EventHandler = Arc::new(move |event: IncomingEvent| {
            let message = Message::from(event);
            messages.send_modify(|list| list.get_or_insert_with(Vec::new).push(message));
        });

        match relay.subscribe(filter, on_event).await {
            Ok(id) => Some(id),
            Err(error) => {
                tracing::warn!("subscription failed: {error:#}");
                None
            }
        }
    }

    /// Join a room and start receiving its messages.
    ///
    /// Moving away from the room that is currently subscribed closes that
    /// subscription and clears the message list. Joining the room that is
    /// already subscribed opens nothing new.
    pub async fn subscribe_room(&self, room_id: &str) {
        let mut current = self.room_subscription.lock().await;

        if matches!(current.as_ref(), Some((subscribed, _)) if subscribed == room_id) {
            self.room_id.send_replace(Some(room_id.to_string()));
            return;
        }

        if let Some((previous_room, previous)) = current.take() {
            if let Some(relay) = self.relay().await {
                relay.unsubscribe(previous).await;
            }
            self.messages.send_replace(None);
            tracing::info!("left room {previous_room}");
        }

        *current = self
            .subscribe(room_filter(room_id))
            .await
            .map(|id| (room_id.to_string(), id));
        self.room_id.send_replace(Some(room_id.to_string()));
        tracing::info!("joined room {room_id}");
    }

    /// Sign `content` as the active user and send it to the active room.
    ///
    /// Does nothing when no room (or an empty one) or no user is set, or when
    /// the relay is unusable. Send failures are logged, not returned. A user
    /// whose `nsec` does not decode is an error.
    pub async fn publish_message(&self, content: &str) -> Result<()> {
        let room_id = self.room_id().filter(|room| !room.is_empty());
        let (Some(room_id), Some(user)) = (room_id, self.user()) else {
            tracing::debug!("publish skipped: no active room or user");
            return Ok(());
        };
        let Some(relay) = self.relay().await else {
            return Ok(());
        };

        let keys = keys::signing_keys(&user.nsec)?;
        let event = sign_room_message(&room_id, content, Timestamp::now(), &keys)?;

        match relay.publish(event).await {
            Ok(id) => tracing::debug!("published {id} to room {room_id}"),
            Err(error) => tracing::warn!("failed to publish to room {room_id}: {error:#}"),
        }
        Ok(())
    }

    /// Close the relay connection and the room subscription.
    ///
    /// Does not open a connection that was never made. The session stays
    /// unusable for relay operations afterwards.
    pub async fn disconnect(&self) {
        self.room_subscription.lock().await.take();
        if let Some(Some(relay)) = self.relay.get() {
            relay.disconnect().await;
            tracing::info!("disconnected from relay {}", self.relay_url());
        }
    }

    pub fn generate_nsec(&self) -> Result<GeneratedKeys> {
        keys::generate_nsec()
    }

    pub fn messages(&self) -> Option<Vec<Message>> {
        self.messages.borrow().clone()
    }

    /// Receiver notified on every change of the message list
    pub fn watch_messages(&self) -> watch::Receiver<Option<Vec<Message>>> {
        self.messages.subscribe()
    }

    pub fn set_messages(&self, messages: Option<Vec<Message>>) {
        self.messages.send_replace(messages);
    }

    pub fn room_id(&self) -> Option<String> {
        self.room_id.borrow().clone()
    }

    pub fn set_room_id(&self, room_id: Option<String>) {
        self.room_id.send_replace(room_id);
    }

    pub fn user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    pub fn set_user(&self, user: Option<User>) {
        self.user.send_replace(user);
    }
}
