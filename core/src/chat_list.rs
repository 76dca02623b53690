/// Conversation list aggregation — latest message, unread flag, recency sort
///
/// For each of the viewer's conversations the aggregator fetches the single
/// most recent message (a per-conversation fan-out query — an accepted
/// O(conversations) cost at marketplace scale, a scaling boundary rather than
/// a bug) and computes the coarse unread flag from it.
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::cache::CacheMirror;
use crate::error::Result;
use crate::read_state;
use crate::store::ChatStore;
use crate::types::{ConversationSummary, SnapshotOrigin};

/// Placeholder shown when the peer's denormalized name is missing.
const UNKNOWN_PEER: &str = "Unknown";
const EMPTY_PREVIEW: &str = "No messages yet";

/// All conversations the viewer participates in, annotated and sorted by
/// last-message recency descending. Conversations without any message yet
/// sort last (missing timestamp counts as epoch/zero).
pub async fn list_conversations(store: &ChatStore, viewer_id: &str) -> Vec<ConversationSummary> {
    let conversations = store.conversations_for(viewer_id).await;
    let mut summaries = Vec::with_capacity(conversations.len());

    for conv in conversations {
        let latest = store.latest_message(&conv.id).await;
        let unread = read_state::is_unread(latest.as_ref(), viewer_id);

        let peer_id = conv.peer_of(viewer_id).unwrap_or_default().to_string();
        let peer_name = conv
            .display_name_of(&peer_id)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_PEER)
            .to_string();

        summaries.push(ConversationSummary {
            conversation_id: conv.id,
            peer_id,
            peer_name,
            last_preview: latest
                .as_ref()
                .map(|m| m.body.preview().to_string())
                .unwrap_or_else(|| EMPTY_PREVIEW.to_string()),
            last_timestamp: latest.as_ref().map(|m| m.created_at),
            unread,
        });
    }

    summaries.sort_by(|a, b| {
        let ta = a.last_timestamp.unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        let tb = b.last_timestamp.unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        tb.cmp(&ta)
            .then_with(|| a.conversation_id.cmp(&b.conversation_id))
    });
    summaries
}

/// Client-side filter: case-insensitive substring match on the peer's
/// display name. An empty query keeps everything.
pub fn filter_by_name(summaries: &[ConversationSummary], query: &str) -> Vec<ConversationSummary> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return summaries.to_vec();
    }
    summaries
        .iter()
        .filter(|s| s.peer_name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Live conversation-list feed: cached list first, then a recomputed list on
/// every relevant store change. Same cancellation contract as
/// [`crate::feed::MessageFeed`].
pub struct ChatListFeed {
    rx: mpsc::Receiver<ListSnapshot>,
    cancel: Option<oneshot::Sender<()>>,
}

/// One delivered conversation-list state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    pub summaries: Vec<ConversationSummary>,
    pub origin: SnapshotOrigin,
}

impl ChatListFeed {
    pub async fn open(
        store: ChatStore,
        cache: Option<CacheMirror>,
        viewer_id: String,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let changes = store.watch_changes();
        tokio::spawn(run_list_feed(store, cache, viewer_id, changes, cancel_rx, tx));

        Self {
            rx,
            cancel: Some(cancel_tx),
        }
    }

    pub async fn recv(&mut self) -> Option<ListSnapshot> {
        self.rx.recv().await
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ChatListFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_list_feed(
    store: ChatStore,
    cache: Option<CacheMirror>,
    viewer_id: String,
    mut changes: tokio::sync::broadcast::Receiver<String>,
    mut cancel_rx: oneshot::Receiver<()>,
    tx: mpsc::Sender<ListSnapshot>,
) {
    if let Some(summaries) = cache.as_ref().and_then(|c| c.load_list(&viewer_id)) {
        // Shown instantly, then replaced wholesale by the first live list.
        let snapshot = ListSnapshot {
            summaries,
            origin: SnapshotOrigin::Cache,
        };
        if tx.send(snapshot).await.is_err() {
            return;
        }
    }

    let mut refresh = true;
    loop {
        if refresh {
            refresh = false;
            let summaries = list_conversations(&store, &viewer_id).await;
            if let Some(ref cache) = cache {
                if let Err(e) = cache.store_list(&viewer_id, &summaries) {
                    warn!(viewer = %viewer_id, error = %e, "list cache write failed");
                }
            }
            let snapshot = ListSnapshot {
                summaries,
                origin: SnapshotOrigin::Live,
            };
            if tx.send(snapshot).await.is_err() {
                break;
            }
        }

        tokio::select! {
            _ = &mut cancel_rx => break,
            next = changes.recv() => match next {
                Ok(conversation_id) => {
                    // Only changes to the viewer's own conversations warrant a
                    // re-query.
                    let involved = store
                        .get_conversation(&conversation_id)
                        .await
                        .map(|c| c.has_participant(&viewer_id))
                        .unwrap_or(false);
                    if involved {
                        refresh = true;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(viewer = %viewer_id, skipped, "list feed lagged, re-querying");
                    refresh = true;
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!(viewer = %viewer_id, "list feed stopped");
}

/// One-shot convenience: aggregate, then filter by display name.
pub async fn search_conversations(
    store: &ChatStore,
    viewer_id: &str,
    query: &str,
) -> Result<Vec<ConversationSummary>> {
    let all = list_conversations(store, viewer_id).await;
    Ok(filter_by_name(&all, query))
}
