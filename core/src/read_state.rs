/// Read-state tracking — per-message `read_by` sets and unread flags
///
/// Runs as a side effect of snapshot delivery: every message authored by
/// someone other than the viewer and not yet observed by them gets the viewer
/// appended to its `read_by` set via a targeted update. The contains-guard
/// makes re-application a no-op, and a failed update needs no explicit retry
/// loop — the guard still holds on the next delivered snapshot.
use crate::error::Result;
use crate::store::ChatStore;
use crate::types::{Message, MessageSnapshot};

/// Ids of messages in `messages` the viewer has not observed yet.
pub fn unread_message_ids(messages: &[Message], viewer_id: &str) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.author_id != viewer_id && !m.is_read_by(viewer_id))
        .map(|m| m.id.clone())
        .collect()
}

/// Mark everything in a delivered snapshot as read by the viewer.
/// Returns how many messages actually changed.
pub async fn mark_snapshot_read(
    store: &ChatStore,
    snapshot: &MessageSnapshot,
    viewer_id: &str,
) -> Result<usize> {
    let ids = unread_message_ids(&snapshot.messages, viewer_id);
    if ids.is_empty() {
        return Ok(0);
    }
    store
        .mark_read_many(&snapshot.conversation_id, &ids, viewer_id)
        .await
}

/// Coarse unread flag for list views: the conversation counts as unread for
/// the viewer iff its latest message was authored by the peer and the viewer
/// is not in its `read_by` set. A flag, not a count — a precise count would
/// need a scan of all unread messages, which the design trades off against
/// query cost.
pub fn is_unread(latest: Option<&Message>, viewer_id: &str) -> bool {
    match latest {
        Some(m) => m.author_id != viewer_id && !m.is_read_by(viewer_id),
        None => false,
    }
}
