/// Live message feed for one conversation
///
/// Delivery contract: the cached snapshot (if any) comes first to mask
/// cold-start latency, then every live snapshot in store order, each a
/// complete ordered list — never a diff, never a merge of cache and live
/// data. On every live snapshot the feed writes the cache mirror and marks
/// the peer's messages read on the viewer's behalf.
///
/// Cancellation is explicit and exactly-once: call [`MessageFeed::cancel`] on
/// teardown, or let the handle drop (RAII). A leaked handle would leave a
/// standing listener per screen visit.
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::cache::CacheMirror;
use crate::read_state;
use crate::store::ChatStore;
use crate::types::{MessageSnapshot, Participant, SnapshotOrigin};

#[derive(Debug)]
pub struct MessageFeed {
    conversation_id: String,
    rx: mpsc::Receiver<MessageSnapshot>,
    cancel: Option<oneshot::Sender<()>>,
}

impl MessageFeed {
    /// Open the feed: subscribe to the store, rehydrate the cache, spawn the
    /// delivery task.
    pub async fn open(
        store: ChatStore,
        cache: Option<CacheMirror>,
        viewer: Participant,
        conversation_id: String,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (cancel_tx, cancel_rx) = oneshot::channel();

        // Read-before-subscribe ordering: the cached snapshot is captured
        // before the live subscription hands out its first result.
        let cached = cache
            .as_ref()
            .and_then(|c| c.load_messages(&conversation_id))
            .map(|mut messages| {
                // Cache contents are untrusted; restore canonical order.
                crate::store::sort_snapshot(&mut messages);
                MessageSnapshot {
                    conversation_id: conversation_id.clone(),
                    messages,
                    origin: SnapshotOrigin::Cache,
                }
            });
        let (initial, live_rx) = store.subscribe(&conversation_id).await;

        let conv_id = conversation_id.clone();
        tokio::spawn(run_feed(
            store, cache, viewer, conv_id, cached, initial, live_rx, cancel_rx, tx,
        ));

        Self {
            conversation_id,
            rx,
            cancel: Some(cancel_tx),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Next delivered snapshot; `None` once the feed has been cancelled and
    /// drained.
    pub async fn recv(&mut self) -> Option<MessageSnapshot> {
        self.rx.recv().await
    }

    /// Tear the subscription down. Consumes the handle, so it cannot fire
    /// twice; dropping the handle without calling this has the same effect.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
            debug!(conversation = %self.conversation_id, "feed cancelled");
        }
    }
}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_feed(
    store: ChatStore,
    cache: Option<CacheMirror>,
    viewer: Participant,
    conversation_id: String,
    cached: Option<MessageSnapshot>,
    initial: MessageSnapshot,
    mut live_rx: tokio::sync::broadcast::Receiver<MessageSnapshot>,
    mut cancel_rx: oneshot::Receiver<()>,
    tx: mpsc::Sender<MessageSnapshot>,
) {
    if let Some(snapshot) = cached {
        // Advisory only; the first live snapshot below replaces it in full.
        if tx.send(snapshot).await.is_err() {
            return;
        }
    }

    let mut pending = Some(initial);
    loop {
        if let Some(snapshot) = pending.take() {
            if tx.send(snapshot.clone()).await.is_err() {
                break;
            }
            if let Some(ref cache) = cache {
                if let Err(e) = cache.store_messages(&conversation_id, &snapshot.messages) {
                    warn!(conversation = %conversation_id, error = %e, "cache write failed");
                }
            }
            // Side effect of delivery: everything the peer wrote is now
            // observed by the viewer. A failure here self-heals — the next
            // snapshot re-evaluates the same guard.
            if let Err(e) = read_state::mark_snapshot_read(&store, &snapshot, &viewer.id).await {
                warn!(conversation = %conversation_id, error = %e, "read-state update failed");
            }
        }

        tokio::select! {
            _ = &mut cancel_rx => break,
            next = live_rx.recv() => match next {
                Ok(snapshot) => pending = Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    // Missed intermediate snapshots are harmless: re-fetch the
                    // current full list and continue from there.
                    warn!(conversation = %conversation_id, skipped, "feed lagged, re-fetching");
                    pending = Some(MessageSnapshot {
                        conversation_id: conversation_id.clone(),
                        messages: store.messages_for(&conversation_id).await,
                        origin: SnapshotOrigin::Live,
                    });
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!(conversation = %conversation_id, "feed task stopped");
}
