/// On-device cache mirror — last-known snapshots stored in sled
///
/// Keyed by conversation id (message snapshots) and viewer id (conversation
/// list snapshots), serialized as JSON. The cache is advisory: it is read once
/// at feed start to mask cold-start latency and is unconditionally superseded
/// by the first live snapshot. Corrupt or missing entries behave as absent.
use std::path::Path;

use tracing::warn;

use crate::error::{ChatError, Result};
use crate::types::{ConversationSummary, Message};

const CHAT_KEY_PREFIX: &str = "last_chat_";
const LIST_KEY_PREFIX: &str = "chat_list_";

pub struct CacheMirror {
    db: sled::Db,
}

impl CacheMirror {
    /// Open (or create) the cache database under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let db = sled::open(data_dir.join("cache.db"))
            .map_err(|e| ChatError::Storage(format!("cache DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Overwrite the cached message snapshot for a conversation.
    pub fn store_messages(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        let key = format!("{}{}", CHAT_KEY_PREFIX, conversation_id);
        let value = serde_json::to_vec(messages)?;
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| ChatError::Storage(format!("store_messages: {}", e)))?;
        Ok(())
    }

    /// The last cached message snapshot, if present and readable.
    pub fn load_messages(&self, conversation_id: &str) -> Option<Vec<Message>> {
        let key = format!("{}{}", CHAT_KEY_PREFIX, conversation_id);
        self.load_json(&key)
    }

    /// Overwrite the cached conversation list for a viewer.
    pub fn store_list(&self, viewer_id: &str, summaries: &[ConversationSummary]) -> Result<()> {
        let key = format!("{}{}", LIST_KEY_PREFIX, viewer_id);
        let value = serde_json::to_vec(summaries)?;
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| ChatError::Storage(format!("store_list: {}", e)))?;
        Ok(())
    }

    /// The last cached conversation list, if present and readable.
    pub fn load_list(&self, viewer_id: &str) -> Option<Vec<ConversationSummary>> {
        let key = format!("{}{}", LIST_KEY_PREFIX, viewer_id);
        self.load_json(&key)
    }

    /// Drop the cached snapshot for a conversation.
    pub fn clear_messages(&self, conversation_id: &str) -> Result<bool> {
        let key = format!("{}{}", CHAT_KEY_PREFIX, conversation_id);
        let removed = self
            .db
            .remove(key.as_bytes())
            .map_err(|e| ChatError::Storage(format!("clear_messages: {}", e)))?;
        Ok(removed.is_some())
    }

    fn load_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.db.get(key.as_bytes()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, continuing without it");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "corrupt cache entry ignored");
                None
            }
        }
    }
}

impl Clone for CacheMirror {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageBody;
    use chrono::Utc;

    fn sample_message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "u1_u2".to_string(),
            author_id: "u1".to_string(),
            body: MessageBody::Text("hello".to_string()),
            created_at: Utc::now(),
            seq: 0,
            read_by: vec!["u1".to_string()],
        }
    }

    #[test]
    fn snapshot_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheMirror::open(dir.path()).unwrap();

        assert!(cache.load_messages("u1_u2").is_none());

        cache
            .store_messages("u1_u2", &[sample_message("m1")])
            .unwrap();
        assert_eq!(cache.load_messages("u1_u2").unwrap().len(), 1);

        // Every live update overwrites in full.
        cache
            .store_messages("u1_u2", &[sample_message("m1"), sample_message("m2")])
            .unwrap();
        assert_eq!(cache.load_messages("u1_u2").unwrap().len(), 2);

        assert!(cache.clear_messages("u1_u2").unwrap());
        assert!(cache.load_messages("u1_u2").is_none());
    }

    #[test]
    fn corrupt_entry_behaves_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheMirror::open(dir.path()).unwrap();

        cache
            .db
            .insert(format!("{}{}", CHAT_KEY_PREFIX, "u1_u2").as_bytes(), b"not json".to_vec())
            .unwrap();
        assert!(cache.load_messages("u1_u2").is_none());
    }
}
