use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// Participant identity = opaque id assigned by the auth provider
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single chat message as seen by one viewer.
///
/// Messages are write-once. The sender's and the receiver's copy of the same
/// event carry the same `message_id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Who wrote the message.
    pub sender_id: ParticipantId,
    /// The other participant of the conversation (the recipient).
    pub conversation_peer_id: ParticipantId,
    /// Store-assigned key, unique within one conversation path.
    pub message_id: String,
    /// Message body.
    pub text: String,
    /// Wall-clock epoch milliseconds at send time. Display ordering only.
    pub timestamp: i64,
}

impl Message {
    /// `timestamp` as a UTC date-time, if it is in chrono's range.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Whether `viewer` wrote this message.
    pub fn is_from(&self, viewer: &ParticipantId) -> bool {
        &self.sender_id == viewer
    }
}

/// A registered chat user and their display profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

impl Participant {
    pub fn new(id: impl Into<ParticipantId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Display name if present and non-blank.
    pub fn name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Display name, or `fallback` when the participant has none.
    pub fn label<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name().unwrap_or(fallback)
    }

    /// Upper-cased first character of [`label`](Self::label), used for avatar
    /// placeholders. Empty only when both name and `fallback` are blank.
    pub fn initial(&self, fallback: &str) -> String {
        self.label(fallback.trim())
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        let id = ParticipantId::from("abcdefghijkl");
        assert_eq!(id.short(), "abcdefgh");
        assert_eq!(ParticipantId::from("abc").short(), "abc");
    }

    #[test]
    fn test_label_falls_back_for_blank_names() {
        let mut p = Participant::new("u1");
        assert_eq!(p.label("User"), "User");

        p.display_name = Some("   ".into());
        assert_eq!(p.label("User"), "User");

        p.display_name = Some(" Ada ".into());
        assert_eq!(p.label("User"), "Ada");
        assert_eq!(p.initial("User"), "A");
    }

    #[test]
    fn test_initial_follows_fallback() {
        let mut p = Participant::new("u1");
        assert_eq!(p.initial("User"), "U");
        assert_eq!(p.initial("guest"), "G");
        assert_eq!(p.initial(""), "");

        p.display_name = Some("ömer".into());
        assert_eq!(p.initial("guest"), "Ö");
    }

    #[test]
    fn test_sent_at() {
        let msg = Message {
            sender_id: "a".into(),
            conversation_peer_id: "b".into(),
            message_id: "k".into(),
            text: "hi".into(),
            timestamp: 1_700_000_000_000,
        };
        assert_eq!(msg.sent_at().map(|t| t.timestamp()), Some(1_700_000_000));
        assert!(msg.is_from(&"a".into()));
    }
}
