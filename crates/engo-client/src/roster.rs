//! Everyone the viewer can start a conversation with.

use std::sync::Arc;

use tracing::{debug, warn};

use engo_shared::{Participant, ParticipantId, ProfileRecord};
use engo_store::{MessageStore, Snapshot};

use crate::error::SubscriptionError;
use crate::paths;
use crate::subscription::{spawn_view, Subscription};

pub struct PresenceRoster {
    store: Arc<dyn MessageStore>,
    fallback_name: String,
}

impl PresenceRoster {
    pub fn new(store: Arc<dyn MessageStore>, fallback_name: impl Into<String>) -> Self {
        Self {
            store,
            fallback_name: fallback_name.into(),
        }
    }

    /// Watch all participants except `exclude`, sorted for display.
    pub async fn subscribe_all<U, E>(
        &self,
        exclude: &ParticipantId,
        on_update: U,
        on_error: E,
    ) -> Result<Subscription, SubscriptionError>
    where
        U: FnMut(Vec<Participant>) + Send + 'static,
        E: FnOnce(SubscriptionError) + Send + 'static,
    {
        let path = paths::users().map_err(SubscriptionError::InvalidPath)?;
        let sub = self
            .store
            .subscribe_children(&path)
            .await
            .map_err(|source| SubscriptionError::Store {
                path: path.clone(),
                source,
            })?;
        debug!(sub = %sub.id, "roster subscribed");

        let exclude = exclude.clone();
        let fallback = self.fallback_name.clone();
        Ok(spawn_view(
            self.store.clone(),
            sub,
            move |snapshot| arrange_roster(snapshot, &exclude, &fallback),
            on_update,
            on_error,
        ))
    }
}

/// Decode, drop `exclude`, and sort.
///
/// Named participants come first by lowercased name. Participants without a
/// name follow, ordered by lowercased `fallback`, which leaves them in key
/// order.
pub fn arrange_roster(
    snapshot: &Snapshot,
    exclude: &ParticipantId,
    fallback: &str,
) -> Vec<Participant> {
    let mut roster: Vec<Participant> = snapshot
        .iter()
        .filter_map(|(key, value)| match ProfileRecord::decode(key, value) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(key, error = %e, "dropping unreadable profile");
                None
            }
        })
        .filter(|p| &p.id != exclude)
        .collect();

    roster.sort_by_cached_key(|p| (p.name().is_none(), p.label(fallback).to_lowercase()));
    roster
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use engo_store::{MemoryStore, StorePath};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn users(entries: &[(&str, serde_json::Value)]) -> Snapshot {
        let mut snapshot = Snapshot::empty(StorePath::parse("users").unwrap());
        for (key, value) in entries {
            snapshot.children.insert(key.to_string(), value.clone());
        }
        snapshot
    }

    fn ids(roster: &[Participant]) -> Vec<&str> {
        roster.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_sorted_case_insensitively_without_viewer() {
        let snapshot = users(&[
            ("u1", json!({ "uid": "u1", "displayName": "bob" })),
            ("u2", json!({ "uid": "u2", "displayName": "Alice" })),
            ("u3", json!({ "uid": "u3", "displayName": "Carol" })),
            ("me", json!({ "uid": "me", "displayName": "Aaron" })),
        ]);
        let roster = arrange_roster(&snapshot, &"me".into(), "User");
        assert_eq!(ids(&roster), ["u2", "u1", "u3"]);
    }

    #[test]
    fn test_unnamed_after_named_in_key_order() {
        let snapshot = users(&[
            ("a", json!({ "uid": "a" })),
            ("b", json!({ "uid": "b", "displayName": "zed" })),
            ("c", json!({ "uid": "c", "displayName": "  " })),
            ("d", json!({ "uid": "d", "displayName": "Ann" })),
        ]);
        let roster = arrange_roster(&snapshot, &"me".into(), "User");
        assert_eq!(ids(&roster), ["d", "b", "a", "c"]);
        assert_eq!(roster[2].label("User"), "User");
    }

    #[test]
    fn test_bad_profiles_dropped_and_key_used_as_id() {
        let snapshot = users(&[
            ("u1", json!("garbage")),
            ("u2", json!({ "displayName": "Kim" })),
        ]);
        let roster = arrange_roster(&snapshot, &"me".into(), "User");
        assert_eq!(ids(&roster), ["u2"]);
    }

    #[tokio::test]
    async fn test_roster_follows_profile_writes() {
        let store = Arc::new(MemoryStore::new());
        let roster = PresenceRoster::new(store.clone(), "User");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = roster
            .subscribe_all(
                &"me".into(),
                move |list| {
                    let _ = tx.send(list);
                },
                |_| {},
            )
            .await
            .unwrap();
        assert!(rx.recv().await.unwrap().is_empty());

        let users = StorePath::parse("users").unwrap();
        store
            .write(&users.child("me").unwrap(), json!({ "uid": "me", "displayName": "Me" }))
            .await
            .unwrap();
        assert!(rx.recv().await.unwrap().is_empty());

        store
            .write(&users.child("u9").unwrap(), json!({ "uid": "u9", "displayName": "Zoe" }))
            .await
            .unwrap();
        let list = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids(&list), ["u9"]);

        sub.unsubscribe().await;
    }
}
