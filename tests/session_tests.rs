//! Session behaviour against the in-process relay

use std::sync::Arc;

use nostr_chat::nostr::{
    IncomingEvent, MemoryConnector, MemoryRelay, NostrConnector, CHANNEL_MESSAGE_KIND,
};
use nostr_chat::{
    generate_nsec, use_nostr_chat, ChatConfig, ChatSession, Message, MissingProviderError,
    NostrChatProvider, User,
};
use nostr_sdk::prelude::*;

fn memory_session() -> (Arc<ChatSession>, Arc<MemoryConnector>) {
    let connector = Arc::new(MemoryConnector::new(Arc::new(MemoryRelay::new())));
    let session = Arc::new(ChatSession::with_connector(
        ChatConfig::default(),
        connector.clone(),
    ));
    (session, connector)
}

fn event(id: &str, content: &str, pubkey: &str, created_at: u64) -> IncomingEvent {
    IncomingEvent {
        id: id.to_string(),
        content: content.to_string(),
        pubkey: pubkey.to_string(),
        created_at,
    }
}

fn test_user() -> User {
    User::from(generate_nsec().unwrap())
}

#[tokio::test]
async fn test_join_room_and_receive() {
    let (session, connector) = memory_session();

    session.subscribe_room("room-42").await;
    connector.relay().inject(event("e1", "hi", "abc", 1000));

    assert_eq!(
        session.messages(),
        Some(vec![Message {
            id: Some("e1".to_string()),
            message: "hi".to_string(),
            pubkey: "abc".to_string(),
            timestamp: Some(1000),
        }])
    );
    assert_eq!(session.room_id().as_deref(), Some("room-42"));
}

#[tokio::test]
async fn test_messages_append_in_arrival_order() {
    let (session, connector) = memory_session();
    session.subscribe_room("lobby").await;
    let relay = connector.relay();

    // Out-of-order timestamps stay in arrival order
    let timestamps = [30u64, 10, 20, 10, 50];
    let mut expected: Vec<Message> = Vec::new();
    for (n, ts) in timestamps.iter().enumerate() {
        let incoming = event(&format!("e{n}"), &format!("msg {n}"), "abc", *ts);
        relay.inject(incoming.clone());
        expected.push(Message::from(incoming));

        assert_eq!(session.messages().unwrap(), expected);
    }
}

#[tokio::test]
async fn test_room_filter_sent_to_relay() {
    let (session, connector) = memory_session();
    session.subscribe_room("room-42").await;

    let filters = connector.relay().filters();
    assert_eq!(filters.len(), 1);
    let json = serde_json::to_value(&filters[0]).unwrap();
    assert_eq!(json["kinds"], serde_json::json!([CHANNEL_MESSAGE_KIND]));
    assert_eq!(json["#d"], serde_json::json!(["room-42"]));
}

#[tokio::test]
async fn test_publish_without_room_or_user_is_noop() {
    let (session, connector) = memory_session();

    // Neither set
    session.publish_message("nobody hears this").await.unwrap();

    // User only
    session.set_user(Some(test_user()));
    session.publish_message("still nothing").await.unwrap();

    // Room only
    session.set_user(None);
    session.subscribe_room("lobby").await;
    session.publish_message("and nothing").await.unwrap();

    assert!(connector.relay().published().is_empty());
    assert!(session.messages().is_none());
}

#[tokio::test]
async fn test_publish_without_room_or_user_does_not_connect() {
    let (session, connector) = memory_session();
    session.publish_message("hello?").await.unwrap();
    assert_eq!(connector.connect_attempts(), 0);
}

#[tokio::test]
async fn test_publish_sends_one_signed_room_event() {
    let (session, connector) = memory_session();
    let user = test_user();
    session.set_user(Some(user.clone()));
    session.subscribe_room("room-42").await;

    let before = Timestamp::now().as_u64();
    session.publish_message("hello room").await.unwrap();
    let after = Timestamp::now().as_u64();

    let published = connector.relay().published();
    assert_eq!(published.len(), 1);
    let sent = &published[0];
    assert!(sent.verify().is_ok());

    let json = serde_json::to_value(sent).unwrap();
    assert_eq!(json["kind"], 42);
    assert_eq!(json["tags"], serde_json::json!([["d", "room-42"]]));
    assert_eq!(json["content"], "hello room");
    assert_eq!(json["pubkey"], user.pubkey);

    let created_at = sent.created_at.as_u64();
    assert!(created_at >= before && created_at <= after);
}

#[tokio::test]
async fn test_published_message_echoes_into_list() {
    let (session, _connector) = memory_session();
    let user = test_user();
    session.set_user(Some(user.clone()));
    session.subscribe_room("lobby").await;

    session.publish_message("echo").await.unwrap();

    let messages = session.messages().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message, "echo");
    assert_eq!(messages[0].pubkey, user.pubkey);
}

#[tokio::test]
async fn test_publish_with_bad_nsec_is_error() {
    let (session, connector) = memory_session();
    session.set_user(Some(User::new("abc", "nsec1notreallyakey")));
    session.subscribe_room("lobby").await;

    assert!(session.publish_message("hi").await.is_err());
    assert!(connector.relay().published().is_empty());
}

#[tokio::test]
async fn test_concurrent_first_use_connects_once() {
    let (session, connector) = memory_session();

    let (a, b) = tokio::join!(
        session.subscribe(nostr_chat::nostr::room_filter("a")),
        session.subscribe(nostr_chat::nostr::room_filter("b")),
    );
    assert!(a.is_some());
    assert!(b.is_some());
    assert_eq!(connector.connect_attempts(), 1);
    assert_eq!(connector.relay().subscription_count(), 2);
}

#[tokio::test]
async fn test_concurrent_first_use_across_tasks_connects_once() {
    let (session, connector) = memory_session();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .subscribe(nostr_chat::nostr::room_filter(&format!("room-{n}")))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_some());
    }
    assert_eq!(connector.connect_attempts(), 1);
}

#[tokio::test]
async fn test_failed_connect_degrades_to_noop() {
    let connector = Arc::new(MemoryConnector::refusing());
    let session = ChatSession::with_connector(ChatConfig::default(), connector.clone());
    session.set_user(Some(test_user()));

    session.subscribe_room("lobby").await;
    assert!(session.subscribe(nostr_chat::nostr::room_filter("x")).await.is_none());
    session.publish_message("into the void").await.unwrap();

    assert!(!session.is_connected());
    assert_eq!(session.room_id().as_deref(), Some("lobby"));
    assert!(connector.relay().published().is_empty());
    // The failure is remembered, not retried
    assert_eq!(connector.connect_attempts(), 1);
}

#[tokio::test]
async fn test_switching_rooms_resets_and_stops_old_room() {
    let (session, connector) = memory_session();
    let relay = connector.relay();

    session.subscribe_room("old").await;
    relay.inject(event("e1", "old news", "abc", 1));
    assert_eq!(session.messages().unwrap().len(), 1);

    session.subscribe_room("new").await;
    assert!(session.messages().is_none());
    assert_eq!(relay.subscription_count(), 1);

    relay.inject(event("e2", "fresh", "abc", 2));
    let messages = session.messages().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message, "fresh");
}

#[tokio::test]
async fn test_subscribe_room_after_set_room_id_moves_subscription() {
    let (session, connector) = memory_session();
    let relay = connector.relay();

    session.subscribe_room("a").await;
    relay.inject(event("e1", "from a", "abc", 1));
    session.set_room_id(Some("b".to_string()));

    session.subscribe_room("b").await;

    let filters = relay.filters();
    assert_eq!(filters.len(), 1);
    let json = serde_json::to_value(&filters[0]).unwrap();
    assert_eq!(json["#d"], serde_json::json!(["b"]));
    assert!(session.messages().is_none());

    relay.inject(event("e2", "from b", "abc", 2));
    assert_eq!(session.messages().unwrap()[0].message, "from b");
}

#[tokio::test]
async fn test_subscribe_room_restores_room_id_of_live_subscription() {
    let (session, connector) = memory_session();

    session.subscribe_room("a").await;
    session.set_room_id(Some("b".to_string()));
    session.subscribe_room("a").await;

    assert_eq!(session.room_id().as_deref(), Some("a"));
    assert_eq!(connector.relay().subscription_count(), 1);
}

#[tokio::test]
async fn test_empty_room_counts_as_no_room() {
    let (session, connector) = memory_session();
    session.set_user(Some(test_user()));

    session.subscribe_room("").await;
    session.publish_message("nowhere").await.unwrap();

    assert!(connector.relay().published().is_empty());
}

#[tokio::test]
async fn test_disconnect_closes_relay_and_stops_delivery() {
    let (session, connector) = memory_session();
    let relay = connector.relay();
    session.set_user(Some(test_user()));
    session.subscribe_room("lobby").await;

    session.disconnect().await;

    assert!(relay.is_closed());
    assert_eq!(relay.subscription_count(), 0);
    relay.inject(event("e1", "after close", "abc", 1));
    assert!(session.messages().is_none());

    // Send failures after close are logged, not returned
    session.publish_message("too late").await.unwrap();
    assert!(relay.published().is_empty());
}

#[tokio::test]
async fn test_disconnect_without_connection_does_not_connect() {
    let (session, connector) = memory_session();
    session.disconnect().await;
    assert_eq!(connector.connect_attempts(), 0);
    assert!(!connector.relay().is_closed());
}

#[tokio::test]
async fn test_unreachable_relay_leaves_session_unconnected() {
    let connector = NostrConnector::with_connect_wait(std::time::Duration::from_millis(500));
    let session = ChatSession::with_connector(
        ChatConfig::with_relay("ws://127.0.0.1:1"),
        Arc::new(connector),
    );
    session.set_user(Some(test_user()));

    session.subscribe_room("lobby").await;
    session.publish_message("hello?").await.unwrap();

    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_seeded_messages_survive_first_join() {
    let (session, connector) = memory_session();
    let seeded = Message {
        id: Some("old".to_string()),
        message: "cached".to_string(),
        pubkey: "abc".to_string(),
        timestamp: Some(1),
    };
    session.set_messages(Some(vec![seeded.clone()]));

    session.subscribe_room("lobby").await;
    connector.relay().inject(event("e1", "new", "abc", 2));

    let messages = session.messages().unwrap();
    assert_eq!(messages[0], seeded);
    assert_eq!(messages[1].message, "new");
}

#[test]
fn test_hook_outside_provider_fails() {
    let err = use_nostr_chat().err().unwrap();
    assert_eq!(
        err.downcast_ref::<MissingProviderError>(),
        Some(&MissingProviderError)
    );
}

#[tokio::test]
async fn test_hook_inside_provider_scope() {
    let connector = Arc::new(MemoryConnector::new(Arc::new(MemoryRelay::new())));
    let provider = NostrChatProvider::with_connector(ChatConfig::default(), connector.clone());

    provider
        .scope(async {
            let chat = use_nostr_chat().unwrap();
            chat.set_user(Some(User::from(chat.generate_nsec().unwrap())));
            chat.subscribe_room("lobby").await;
            chat.publish_message("from the hook").await.unwrap();
        })
        .await;

    assert_eq!(connector.relay().published().len(), 1);
    assert_eq!(
        provider.session().messages().unwrap()[0].message,
        "from the hook"
    );
}

#[tokio::test]
async fn test_spawned_task_does_not_inherit_scope() {
    let provider = NostrChatProvider::default();

    let inherited = provider
        .scope(async { tokio::spawn(async { use_nostr_chat().is_ok() }).await.unwrap() })
        .await;
    assert!(!inherited);
}
