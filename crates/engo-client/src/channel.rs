//! Live view of one viewer's copy of a conversation.

use std::sync::Arc;

use tracing::{debug, warn};

use engo_shared::{Message, MessageRecord, ParticipantId};
use engo_store::{MessageStore, Snapshot};

use crate::error::SubscriptionError;
use crate::paths;
use crate::subscription::{spawn_view, Subscription};

pub struct ConversationChannel {
    store: Arc<dyn MessageStore>,
}

impl ConversationChannel {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Watch the messages `viewer` keeps with `peer`.
    ///
    /// `on_update` gets the whole conversation, oldest first, on every change.
    /// `on_error` is called at most once, after which the view is over.
    pub async fn subscribe<U, E>(
        &self,
        viewer: &ParticipantId,
        peer: &ParticipantId,
        on_update: U,
        on_error: E,
    ) -> Result<Subscription, SubscriptionError>
    where
        U: FnMut(Vec<Message>) + Send + 'static,
        E: FnOnce(SubscriptionError) + Send + 'static,
    {
        let path = paths::conversation(viewer, peer).map_err(SubscriptionError::InvalidPath)?;
        let sub = self
            .store
            .subscribe_children(&path)
            .await
            .map_err(|source| SubscriptionError::Store {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path, sub = %sub.id, "conversation subscribed");

        let (viewer, peer) = (viewer.clone(), peer.clone());
        Ok(spawn_view(
            self.store.clone(),
            sub,
            move |snapshot| decode_conversation(snapshot, &viewer, &peer),
            on_update,
            on_error,
        ))
    }

    pub async fn unsubscribe(&self, subscription: &Subscription) {
        subscription.unsubscribe().await;
    }
}

/// Decode every readable record in `snapshot`, ordered by timestamp.
///
/// Equal timestamps keep store-key order. Records that do not decode are
/// logged and left out.
pub fn decode_conversation(
    snapshot: &Snapshot,
    viewer: &ParticipantId,
    peer: &ParticipantId,
) -> Vec<Message> {
    let mut messages: Vec<Message> = snapshot
        .iter()
        .filter_map(|(key, value)| match MessageRecord::decode(key, value, viewer, peer) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(path = %snapshot.path, key, error = %e, "dropping unreadable message");
                None
            }
        })
        .collect();
    // Stable: ties stay in key order.
    messages.sort_by_key(|m| m.timestamp);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use engo_store::{MemoryStore, StorePath};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn path(s: &str) -> StorePath {
        StorePath::parse(s).unwrap()
    }

    fn record(sender: &str, text: &str, time: i64) -> serde_json::Value {
        json!({ "senderId": sender, "message": text, "time": time })
    }

    fn ids() -> (ParticipantId, ParticipantId) {
        (ParticipantId::from("alice"), ParticipantId::from("bob"))
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Vec<Message>>) -> Vec<Message> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("update in time")
            .expect("channel open")
    }

    #[test]
    fn test_sorted_by_timestamp_regardless_of_key_order() {
        let (alice, bob) = ids();
        let mut snapshot = Snapshot::empty(path("messages/alice/bob"));
        snapshot.children.insert("a".into(), record("bob", "third", 30));
        snapshot.children.insert("b".into(), record("alice", "first", 10));
        snapshot.children.insert("c".into(), record("bob", "second-a", 20));
        snapshot.children.insert("d".into(), record("alice", "second-b", 20));

        let texts: Vec<_> = decode_conversation(&snapshot, &alice, &bob)
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, ["first", "second-a", "second-b", "third"]);
    }

    #[test]
    fn test_bad_record_does_not_hide_others() {
        let (alice, bob) = ids();
        let mut snapshot = Snapshot::empty(path("messages/alice/bob"));
        snapshot.children.insert("k1".into(), record("alice", "hello", 1));
        snapshot.children.insert("k2".into(), json!("not an object"));
        snapshot.children.insert("k3".into(), record("mallory", "sneaky", 2));
        snapshot.children.insert("k4".into(), json!({ "senderId": "bob", "time": 3 }));
        snapshot.children.insert("k5".into(), record("bob", "hey", 4));

        let messages = decode_conversation(&snapshot, &alice, &bob);
        let keys: Vec<_> = messages.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(keys, ["k1", "k5"]);
        assert_eq!(messages[1].conversation_peer_id, alice);
    }

    #[tokio::test]
    async fn test_updates_replace_whole_view() {
        let store = Arc::new(MemoryStore::new());
        let channel = ConversationChannel::new(store.clone());
        let (alice, bob) = ids();
        let conv = path("messages/alice/bob");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = channel
            .subscribe(
                &alice,
                &bob,
                move |msgs| {
                    let _ = tx.send(msgs);
                },
                |_| {},
            )
            .await
            .unwrap();

        assert!(next(&mut rx).await.is_empty());

        store
            .write(&conv.child("k2").unwrap(), record("bob", "later", 200))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await.len(), 1);

        store
            .write(&conv.child("k1").unwrap(), record("alice", "earlier", 100))
            .await
            .unwrap();
        let texts: Vec<_> = next(&mut rx).await.into_iter().map(|m| m.text).collect();
        assert_eq!(texts, ["earlier", "later"]);

        channel.unsubscribe(&sub).await;
    }

    #[tokio::test]
    async fn test_no_updates_after_unsubscribe() {
        let store = Arc::new(MemoryStore::new());
        let channel = ConversationChannel::new(store.clone());
        let (alice, bob) = ids();
        let conv = path("messages/alice/bob");

        let seen = Arc::new(Mutex::new(0usize));
        let counter = seen.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = channel
            .subscribe(
                &alice,
                &bob,
                move |_| {
                    *counter.lock().unwrap() += 1;
                    let _ = tx.send(());
                },
                |_| {},
            )
            .await
            .unwrap();
        rx.recv().await.unwrap();

        sub.unsubscribe().await;
        sub.unsubscribe().await;
        let before = *seen.lock().unwrap();

        store
            .write(&conv.child("k1").unwrap(), record("bob", "late", 1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*seen.lock().unwrap(), before);
        assert!(!sub.is_active());
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_store_error_reported_once() {
        let store = Arc::new(MemoryStore::new());
        let channel = ConversationChannel::new(store.clone());
        let (alice, bob) = ids();

        let (err_tx, mut err_rx) = mpsc::unbounded_channel();
        let _sub = channel
            .subscribe(
                &alice,
                &bob,
                |_| {},
                move |e| {
                    let _ = err_tx.send(e);
                },
            )
            .await
            .unwrap();

        // Let the initial snapshot through before breaking the connection.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.break_subscriptions(&path("messages")), 1);

        let err = tokio::time::timeout(Duration::from_secs(1), err_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(err, SubscriptionError::Store { .. }));
        // on_error was consumed, so the sender is gone.
        assert!(err_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_permission_denied_surfaces_as_error() {
        let store = Arc::new(MemoryStore::new());
        store.deny_reads_under(path("messages/alice"));
        let channel = ConversationChannel::new(store.clone());
        let (alice, bob) = ids();

        let (err_tx, mut err_rx) = mpsc::unbounded_channel();
        let _sub = channel
            .subscribe(
                &alice,
                &bob,
                |_| panic!("no data expected"),
                move |e| {
                    let _ = err_tx.send(e);
                },
            )
            .await
            .unwrap();

        let err = err_rx.recv().await.unwrap();
        assert!(err.to_string().contains("messages/alice/bob"));
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let channel = ConversationChannel::new(Arc::new(MemoryStore::new()));
        let result = channel
            .subscribe(
                &ParticipantId::from("a#b"),
                &ParticipantId::from("bob"),
                |_| {},
                |_| {},
            )
            .await;
        assert!(matches!(result, Err(SubscriptionError::InvalidPath(_))));
    }
}
