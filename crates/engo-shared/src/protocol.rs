//! JSON records as they sit in the message store.
//!
//! Field names follow the camelCase layout already used by deployed clients,
//! so records written by either side decode here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;
use crate::types::{Message, Participant, ParticipantId};

/// One copy of a chat message under `messages/{viewer}/{peer}/{key}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub sender_id: String,
    /// Older records predate this field; the path tells us the receiver then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    #[serde(default)]
    pub chat_id: String,
    pub message: String,
    pub time: i64,
}

impl MessageRecord {
    pub fn from_message(message: &Message) -> Self {
        Self {
            sender_id: message.sender_id.to_string(),
            receiver_id: Some(message.conversation_peer_id.to_string()),
            chat_id: message.message_id.clone(),
            message: message.text.clone(),
            time: message.timestamp,
        }
    }

    pub fn to_value(&self) -> Value {
        // A struct of strings and integers always serializes.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decode the child `key` of the conversation `viewer` keeps with `peer`.
    pub fn decode(
        key: &str,
        value: &Value,
        viewer: &ParticipantId,
        peer: &ParticipantId,
    ) -> Result<Message, DecodeError> {
        let record = MessageRecord::deserialize(value)?;

        if record.sender_id.is_empty() {
            return Err(DecodeError::MissingField("senderId"));
        }
        let sender = ParticipantId::new(record.sender_id);
        if &sender != viewer && &sender != peer {
            return Err(DecodeError::InvalidField {
                field: "senderId",
                reason: format!("{sender} is not part of this conversation"),
            });
        }
        if record.message.trim().is_empty() {
            return Err(DecodeError::InvalidField {
                field: "message",
                reason: "empty text".into(),
            });
        }

        let conversation_peer_id = match record.receiver_id.filter(|r| !r.is_empty()) {
            Some(receiver) => ParticipantId::new(receiver),
            None if &sender == viewer => peer.clone(),
            None => viewer.clone(),
        };

        let message_id = if record.chat_id.is_empty() {
            key.to_string()
        } else {
            record.chat_id
        };

        Ok(Message {
            sender_id: sender,
            conversation_peer_id,
            message_id,
            text: record.message,
            timestamp: record.time,
        })
    }
}

/// A participant profile under `users/{uid}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl ProfileRecord {
    pub fn from_participant(p: &Participant) -> Self {
        Self {
            uid: p.id.to_string(),
            display_name: p.display_name.clone(),
            email: p.email.clone(),
            photo_url: p.photo_url.clone(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decode the profile stored under `key`. A record without a uid takes
    /// its key as id.
    pub fn decode(key: &str, value: &Value) -> Result<Participant, DecodeError> {
        let record = ProfileRecord::deserialize(value)?;

        let id = if record.uid.is_empty() {
            key.to_string()
        } else {
            record.uid
        };
        if id.is_empty() {
            return Err(DecodeError::MissingField("uid"));
        }

        Ok(Participant {
            id: ParticipantId::new(id),
            display_name: record.display_name,
            email: record.email,
            photo_url: record.photo_url,
        })
    }
}
