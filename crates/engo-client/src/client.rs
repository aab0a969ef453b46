//! Process-wide handles shared by every screen.
//!
//! A [`ChatClient`] holds the store, the validator and the configuration. It
//! hands out the per-concern components, all of which share those handles.

use std::sync::Arc;

use tracing::info;

use engo_store::{MemoryStore, MessageStore, SqliteStore};

use crate::channel::ConversationChannel;
use crate::config::ClientConfig;
use crate::error::ConfigError;
use crate::pipeline::{SendPipeline, SendPolicy};
use crate::profiles::ProfileDirectory;
use crate::roster::PresenceRoster;
use crate::subscription::SurfaceScope;
use crate::validator::{GeminiValidator, TextValidator};

#[derive(Clone)]
pub struct ChatClient {
    store: Arc<dyn MessageStore>,
    validator: Arc<dyn TextValidator>,
    config: Arc<ClientConfig>,
}

impl ChatClient {
    pub fn new(
        store: Arc<dyn MessageStore>,
        validator: Arc<dyn TextValidator>,
        config: ClientConfig,
    ) -> Self {
        Self {
            store,
            validator,
            config: Arc::new(config),
        }
    }

    /// Build a client from configuration: the Gemini validator, and a SQLite
    /// store at `db_path` or an in-memory store when none is set.
    pub fn from_config(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let validator = Arc::new(GeminiValidator::new(&config)?);

        let store: Arc<dyn MessageStore> = match &config.db_path {
            Some(path) => {
                info!(path = %path.display(), "using SQLite store");
                Arc::new(SqliteStore::open_at(path)?)
            }
            None => {
                info!("using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::new(store, validator, config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn MessageStore> {
        self.store.clone()
    }

    pub fn pipeline(&self) -> SendPipeline {
        SendPipeline::new(
            self.store.clone(),
            self.validator.clone(),
            SendPolicy::from(self.config.as_ref()),
        )
    }

    pub fn conversations(&self) -> ConversationChannel {
        ConversationChannel::new(self.store.clone())
    }

    pub fn roster(&self) -> PresenceRoster {
        PresenceRoster::new(self.store.clone(), self.config.fallback_display_name.clone())
    }

    pub fn profiles(&self) -> ProfileDirectory {
        ProfileDirectory::new(self.store.clone())
    }

    /// A fresh scope for the views of one screen.
    pub fn scope(&self) -> SurfaceScope {
        SurfaceScope::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use engo_shared::{Message, Participant, ParticipantId};
    use tokio::sync::mpsc;

    use crate::compose::ComposeState;
    use crate::pipeline::SendOutcome;

    fn sqlite_config(dir: &tempfile::TempDir) -> ClientConfig {
        ClientConfig {
            db_path: Some(dir.path().join("engo.db")),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_from_config_rejects_zero_timeout() {
        let config = ClientConfig {
            store_timeout: Duration::ZERO,
            ..ClientConfig::default()
        };
        assert!(matches!(
            ChatClient::from_config(config),
            Err(ConfigError::ZeroTimeout("STORE_TIMEOUT_MS"))
        ));
    }

    #[tokio::test]
    async fn test_chat_between_two_viewers() {
        let dir = tempfile::tempdir().unwrap();
        let client = ChatClient::from_config(sqlite_config(&dir)).unwrap();
        let (alice, bob) = (ParticipantId::from("alice"), ParticipantId::from("bob"));

        let mut profile = Participant::new("bob");
        profile.display_name = Some("Bob".into());
        client.profiles().upsert(&profile).await.unwrap();

        let scope = client.scope();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Message>>();
        let sub = client
            .conversations()
            .subscribe(
                &bob,
                &alice,
                move |msgs| {
                    let _ = tx.send(msgs);
                },
                |_| {},
            )
            .await
            .unwrap();
        scope.track(sub);
        assert!(rx.recv().await.unwrap().is_empty());

        let mut compose = ComposeState::new();
        compose.set_text("hi");
        let outcome = client.pipeline().send(&alice, &bob, compose.text()).await;
        assert!(matches!(outcome, SendOutcome::Sent(_)));
        compose.apply(&outcome);
        assert_eq!(compose.text(), "");

        let seen = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].sender_id, alice);
        assert_eq!(seen[0].conversation_peer_id, bob);

        let header = client.profiles().fetch(&bob).await.unwrap().unwrap();
        assert_eq!(header.label(&client.config().fallback_display_name), "Bob");

        assert_eq!(scope.close().await, 1);
        assert!(scope.is_empty());
    }

    #[tokio::test]
    async fn test_long_text_without_api_key_needs_retry() {
        let client = ChatClient::from_config(ClientConfig::default()).unwrap();
        let outcome = client
            .pipeline()
            .send(&"alice".into(), &"bob".into(), "this sentence has five words")
            .await;
        assert_eq!(
            outcome.suggestion(),
            Some(engo_shared::constants::VERIFY_FAILED_SUGGESTION)
        );
    }
}
