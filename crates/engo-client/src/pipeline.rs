//! Outgoing messages.
//!
//! A send runs in three steps: an optional grammar check, a key reservation on
//! the sender's copy of the conversation, and two writes (sender copy first,
//! receiver copy second) that share that key and timestamp. The two writes are
//! not atomic. If only the first lands the caller gets
//! [`SendOutcome::PartialWrite`] and nothing is rolled back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use engo_shared::constants::{
    DEFAULT_AUTO_APPROVE_MAX_TOKENS, DEFAULT_STORE_TIMEOUT_MS, DEFAULT_VALIDATOR_TIMEOUT_MS,
    VERIFY_FAILED_SUGGESTION,
};
use engo_shared::{Message, MessageRecord, ParticipantId};
use engo_store::{MessageStore, StoreError, StorePath};

use crate::config::ClientConfig;
use crate::error::{ValidationError, WriteError};
use crate::paths;
use crate::validator::TextValidator;

/// Why a send was refused before anything was checked or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Nothing left after trimming.
    EmptyText,
    /// Sender and peer are the same participant.
    SelfConversation,
    /// An id that cannot be used as a path segment.
    InvalidParticipant(String),
}

#[derive(Debug)]
pub enum SendOutcome {
    /// Both copies were written.
    Sent(Message),
    /// The text should be changed first. Nothing was written.
    NeedsRevision(String),
    Rejected(RejectReason),
    /// The sender copy could not be written. Nothing was written.
    Failed(WriteError),
    /// The sender copy exists but the receiver copy does not.
    PartialWrite { message: Message, error: WriteError },
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent(_))
    }

    /// The suggested text, for a [`SendOutcome::NeedsRevision`].
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            SendOutcome::NeedsRevision(s) => Some(s),
            _ => None,
        }
    }

    /// The message that reached at least the sender's copy.
    pub fn message(&self) -> Option<&Message> {
        match self {
            SendOutcome::Sent(m) | SendOutcome::PartialWrite { message: m, .. } => Some(m),
            _ => None,
        }
    }
}

/// Tunables for [`SendPipeline`].
#[derive(Debug, Clone, Copy)]
pub struct SendPolicy {
    pub validator_timeout: Duration,
    pub store_timeout: Duration,
    /// Texts with at most this many words skip the grammar check.
    pub auto_approve_max_tokens: usize,
}

impl Default for SendPolicy {
    fn default() -> Self {
        Self {
            validator_timeout: Duration::from_millis(DEFAULT_VALIDATOR_TIMEOUT_MS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            auto_approve_max_tokens: DEFAULT_AUTO_APPROVE_MAX_TOKENS,
        }
    }
}

impl From<&ClientConfig> for SendPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            validator_timeout: config.validator_timeout,
            store_timeout: config.store_timeout,
            auto_approve_max_tokens: config.auto_approve_max_tokens,
        }
    }
}

/// Number of whitespace-delimited words in `text`.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Clone)]
pub struct SendPipeline {
    store: Arc<dyn MessageStore>,
    validator: Arc<dyn TextValidator>,
    policy: SendPolicy,
}

impl SendPipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        validator: Arc<dyn TextValidator>,
        policy: SendPolicy,
    ) -> Self {
        Self {
            store,
            validator,
            policy,
        }
    }

    pub fn policy(&self) -> &SendPolicy {
        &self.policy
    }

    /// Check `raw_text` and, if it passes, write it to both participants.
    pub async fn send(
        &self,
        self_id: &ParticipantId,
        peer_id: &ParticipantId,
        raw_text: &str,
    ) -> SendOutcome {
        let (sender_path, receiver_path, text) = match self.prepare(self_id, peer_id, raw_text) {
            Ok(prepared) => prepared,
            Err(reason) => return SendOutcome::Rejected(reason),
        };

        if token_count(text) > self.policy.auto_approve_max_tokens {
            if let Err(suggestion) = self.check(raw_text).await {
                return SendOutcome::NeedsRevision(suggestion);
            }
        } else {
            debug!(to = %peer_id.short(), "short message, skipping grammar check");
        }

        self.deliver(self_id, peer_id, sender_path, receiver_path, text)
            .await
    }

    /// Write `raw_text` without a grammar check. This is the path for a user
    /// who chose to send their text as typed.
    pub async fn send_unchecked(
        &self,
        self_id: &ParticipantId,
        peer_id: &ParticipantId,
        raw_text: &str,
    ) -> SendOutcome {
        match self.prepare(self_id, peer_id, raw_text) {
            Ok((sender_path, receiver_path, text)) => {
                self.deliver(self_id, peer_id, sender_path, receiver_path, text)
                    .await
            }
            Err(reason) => SendOutcome::Rejected(reason),
        }
    }

    /// Run [`send`](Self::send) on its own task. The send finishes even if the
    /// caller drops the handle.
    pub fn spawn_send(
        &self,
        self_id: ParticipantId,
        peer_id: ParticipantId,
        raw_text: String,
    ) -> JoinHandle<SendOutcome> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let outcome = pipeline.send(&self_id, &peer_id, &raw_text).await;
            if let SendOutcome::Failed(e) | SendOutcome::PartialWrite { error: e, .. } = &outcome {
                warn!(error = %e, "background send did not complete");
            }
            outcome
        })
    }

    fn prepare<'t>(
        &self,
        self_id: &ParticipantId,
        peer_id: &ParticipantId,
        raw_text: &'t str,
    ) -> Result<(StorePath, StorePath, &'t str), RejectReason> {
        let text = raw_text.trim();
        if text.is_empty() {
            return Err(RejectReason::EmptyText);
        }
        if self_id == peer_id {
            return Err(RejectReason::SelfConversation);
        }

        let sender_path = paths::conversation(self_id, peer_id)
            .map_err(|e| RejectReason::InvalidParticipant(e.to_string()))?;
        let receiver_path = paths::conversation(peer_id, self_id)
            .map_err(|e| RejectReason::InvalidParticipant(e.to_string()))?;
        Ok((sender_path, receiver_path, text))
    }

    /// `Ok` when the text may be sent, `Err(suggestion)` otherwise.
    async fn check(&self, raw_text: &str) -> Result<(), String> {
        let limit = self.policy.validator_timeout;
        let result = tokio::time::timeout(limit, self.validator.check(raw_text))
            .await
            .unwrap_or(Err(ValidationError::Timeout(limit)));

        match result {
            Ok(verdict) if verdict.approved => Ok(()),
            Ok(verdict) => match verdict.suggestion.filter(|s| !s.trim().is_empty()) {
                Some(suggestion) => {
                    debug!("validator suggested a revision");
                    Err(suggestion)
                }
                None => {
                    warn!("validator rejected text without a suggestion");
                    Err(VERIFY_FAILED_SUGGESTION.to_string())
                }
            },
            Err(e) => {
                warn!(error = %e, "grammar check failed");
                Err(VERIFY_FAILED_SUGGESTION.to_string())
            }
        }
    }

    async fn deliver(
        &self,
        self_id: &ParticipantId,
        peer_id: &ParticipantId,
        sender_path: StorePath,
        receiver_path: StorePath,
        text: &str,
    ) -> SendOutcome {
        let key = match self.bounded(self.store.reserve_key(&sender_path)).await {
            Ok(key) => key,
            Err(source) => {
                return SendOutcome::Failed(WriteError {
                    path: sender_path,
                    source,
                })
            }
        };

        let message = Message {
            sender_id: self_id.clone(),
            conversation_peer_id: peer_id.clone(),
            message_id: key,
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };
        let record = MessageRecord::from_message(&message).to_value();

        if let Err(error) = self.put(&sender_path, &message.message_id, record.clone()).await {
            warn!(error = %error, "sender copy not written");
            return SendOutcome::Failed(error);
        }
        if let Err(error) = self.put(&receiver_path, &message.message_id, record).await {
            warn!(error = %error, id = %message.message_id, "receiver copy not written");
            return SendOutcome::PartialWrite { message, error };
        }

        info!(
            from = %self_id.short(),
            to = %peer_id.short(),
            id = %message.message_id,
            "message sent"
        );
        SendOutcome::Sent(message)
    }

    async fn put(
        &self,
        conversation: &StorePath,
        key: &str,
        record: serde_json::Value,
    ) -> Result<(), WriteError> {
        let path = conversation.child(key).map_err(|source| WriteError {
            path: conversation.clone(),
            source,
        })?;
        match self.bounded(self.store.write(&path, record)).await {
            Ok(()) => Ok(()),
            Err(source) => Err(WriteError { path, source }),
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = engo_store::Result<T>>,
    ) -> engo_store::Result<T> {
        let limit = self.policy.store_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!("timed out after {limit:?}"))),
        }
    }
}
