/// Shared types for the chat synchronization core
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user taking part in conversations.
///
/// The display name is denormalized into conversation records at creation time
/// and is not kept in sync with later profile edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Message payload: exactly one of text or an already-uploaded image URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageBody {
    Text(String),
    Image(String),
}

impl MessageBody {
    /// One-line preview used by list views.
    pub fn preview(&self) -> &str {
        match self {
            MessageBody::Text(text) => text,
            MessageBody::Image(_) => "Photo",
        }
    }
}

/// A single chat message.
///
/// `created_at` and `seq` are assigned by the store at insert; client clocks
/// are never trusted for ordering. `read_by` only grows — the author counts as
/// having read their own message from the start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Store-generated document id, immutable once created.
    pub id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// Sender's user id.
    pub author_id: String,
    pub body: MessageBody,
    /// Server-assigned timestamp, authoritative for ordering.
    pub created_at: DateTime<Utc>,
    /// Server-assigned insertion sequence; stable tie-break when the clock
    /// resolution makes two timestamps equal.
    pub seq: u64,
    /// User ids that have observed this message.
    pub read_by: Vec<String>,
}

impl Message {
    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.iter().any(|r| r == user_id)
    }
}

/// A two-party conversation record.
///
/// `participants[i]` and `display_names[i]` are parallel, ordered so that
/// `participants[0] < participants[1]` (the same order the canonical id is
/// derived from).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Canonical id: `min(a, b) + "_" + max(a, b)`.
    pub id: String,
    pub participants: [String; 2],
    /// Display names captured at creation time.
    pub display_names: [String; 2],
    pub created_at: DateTime<Utc>,
    /// Denormalized copy of the most recent message, for list rendering.
    pub last_message: Option<Message>,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// The other participant's id, if `user_id` takes part at all.
    pub fn peer_of(&self, user_id: &str) -> Option<&str> {
        if self.participants[0] == user_id {
            Some(&self.participants[1])
        } else if self.participants[1] == user_id {
            Some(&self.participants[0])
        } else {
            None
        }
    }

    pub fn display_name_of(&self, user_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .position(|p| p == user_id)
            .map(|i| self.display_names[i].as_str())
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }
}

/// Summary of one conversation thread for list views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation_id: String,
    /// The other party's user id.
    pub peer_id: String,
    /// The other party's denormalized display name ("Unknown" if absent).
    pub peer_name: String,
    /// Preview text of the last message.
    pub last_preview: String,
    /// Timestamp of the last message; `None` sorts after everything else.
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Coarse unread flag: latest message authored by the peer and not yet
    /// observed by the viewer.
    pub unread: bool,
}

/// Where a delivered snapshot came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Rehydrated from the on-device cache; advisory, superseded by the first
    /// live snapshot.
    Cache,
    /// Delivered by the live subscription; authoritative.
    Live,
}

/// A complete ordered materialization of a conversation's messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageSnapshot {
    pub conversation_id: String,
    /// All messages, ordered by `(created_at, seq)` ascending.
    pub messages: Vec<Message>,
    pub origin: SnapshotOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv() -> Conversation {
        Conversation {
            id: "a_b".to_string(),
            participants: ["a".to_string(), "b".to_string()],
            display_names: ["Alice".to_string(), "Bob".to_string()],
            created_at: Utc::now(),
            last_message: None,
            last_activity_at: None,
        }
    }

    #[test]
    fn peer_lookup() {
        let c = conv();
        assert_eq!(c.peer_of("a"), Some("b"));
        assert_eq!(c.peer_of("b"), Some("a"));
        assert_eq!(c.peer_of("c"), None);
        assert_eq!(c.display_name_of("b"), Some("Bob"));
    }

    #[test]
    fn image_preview_is_placeholder() {
        let body = MessageBody::Image("https://img.example/1.jpg".to_string());
        assert_eq!(body.preview(), "Photo");
        assert_eq!(MessageBody::Text("hi".to_string()).preview(), "hi");
    }
}
