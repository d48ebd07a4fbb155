//! In-process relay
//!
//! Keeps subscriptions and published events in memory. Published events are
//! echoed to every subscription whose filter matches, the way a public relay
//! returns your own notes. Used for offline chat and by the test suite.

use anyhow::{bail, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use nostr_sdk::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::client::{EventHandler, RelayConnector, RelayHandle};
use super::events::IncomingEvent;

struct Subscription {
    id: SubscriptionId,
    filter: Filter,
    on_event: EventHandler,
}

#[derive(Default)]
struct Inner {
    subscriptions: Vec<Subscription>,
    published: Vec<Event>,
    next_id: u64,
    closed: bool,
}

/// Relay that lives entirely in this process
#[derive(Default)]
pub struct MemoryRelay {
    inner: Mutex<Inner>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Handlers run outside the lock, a poisoned guard still holds valid data
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand `event` to every open subscription, as if the relay had matched it
    pub fn inject(&self, event: IncomingEvent) {
        let handlers: Vec<EventHandler> = self
            .lock()
            .subscriptions
            .iter()
            .map(|sub| sub.on_event.clone())
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    /// Every event published so far, oldest first
    pub fn published(&self) -> Vec<Event> {
        self.lock().published.clone()
    }

    /// Number of open subscriptions
    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// True after `disconnect`
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Filters of the open subscriptions
    pub fn filters(&self) -> Vec<Filter> {
        self.lock()
            .subscriptions
            .iter()
            .map(|sub| sub.filter.clone())
            .collect()
    }
}

impl RelayHandle for MemoryRelay {
    fn subscribe(
        &self,
        filter: Filter,
        on_event: EventHandler,
    ) -> BoxFuture<'_, Result<SubscriptionId>> {
        async move {
            let mut inner = self.lock();
            if inner.closed {
                bail!("relay is closed");
            }
            inner.next_id += 1;
            let id = SubscriptionId::new(format!("memory-{}", inner.next_id));
            inner.subscriptions.push(Subscription {
                id: id.clone(),
                filter,
                on_event,
            });
            Ok(id)
        }
        .boxed()
    }

    fn unsubscribe(&self, id: SubscriptionId) -> BoxFuture<'_, ()> {
        async move {
            self.lock().subscriptions.retain(|sub| sub.id != id);
        }
        .boxed()
    }

    fn publish(&self, event: Event) -> BoxFuture<'_, Result<EventId>> {
        async move {
            let handlers: Vec<EventHandler> = {
                let mut inner = self.lock();
                if inner.closed {
                    bail!("relay is closed");
                }
                inner.published.push(event.clone());
                inner
                    .subscriptions
                    .iter()
                    .filter(|sub| sub.filter.match_event(&event))
                    .map(|sub| sub.on_event.clone())
                    .collect()
            };

            let incoming = IncomingEvent::from(&event);
            for handler in handlers {
                handler(incoming.clone());
            }
            Ok(event.id)
        }
        .boxed()
    }

    fn disconnect(&self) -> BoxFuture<'_, ()> {
        async move {
            let mut inner = self.lock();
            inner.subscriptions.clear();
            inner.closed = true;
        }
        .boxed()
    }
}

/// Connector handing out one shared `MemoryRelay`
pub struct MemoryConnector {
    relay: Arc<MemoryRelay>,
    attempts: AtomicUsize,
    refuse: bool,
}

impl MemoryConnector {
    pub fn new(relay: Arc<MemoryRelay>) -> Self {
        Self {
            relay,
            attempts: AtomicUsize::new(0),
            refuse: false,
        }
    }

    /// A connector whose every connect attempt fails
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(Arc::new(MemoryRelay::new()))
        }
    }

    pub fn relay(&self) -> Arc<MemoryRelay> {
        self.relay.clone()
    }

    /// How many times `connect` has been called
    pub fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl RelayConnector for MemoryConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<dyn RelayHandle>>> {
        async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            // Give concurrent callers a chance to pile up on the pending attempt
            tokio::task::yield_now().await;
            if self.refuse {
                bail!("connection to {url} refused");
            }
            Ok(self.relay.clone() as Arc<dyn RelayHandle>)
        }
        .boxed()
    }
}
