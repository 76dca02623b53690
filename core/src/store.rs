/// Document store for conversations and messages with live snapshot feeds
///
/// This replaces the managed backend's live-query primitive with an explicit
/// in-process equivalent exposing the same contract: insert-with-id (upsert),
/// insert-with-generated-id, targeted field update, participant filters,
/// ordering by server-assigned timestamp, and per-conversation subscriptions
/// that re-deliver a full ordered snapshot on every mutation.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::types::{Conversation, Message, MessageBody, MessageSnapshot, SnapshotOrigin};

#[derive(Debug)]
struct StoreInner {
    conversations: HashMap<String, Conversation>,
    /// Per-conversation message lists, kept ordered by `(created_at, seq)`.
    messages: HashMap<String, Vec<Message>>,
    /// Lazily created per-conversation snapshot channels.
    feeds: HashMap<String, broadcast::Sender<MessageSnapshot>>,
    /// Last timestamp handed out; stamps never regress even if the wall clock
    /// does.
    last_stamp: DateTime<Utc>,
    next_seq: u64,
}

/// Shared store handle. Cloning is cheap; all clones see the same documents.
#[derive(Debug)]
pub struct ChatStore {
    inner: Arc<RwLock<StoreInner>>,
    /// Conversation ids whose state changed in any way; the list aggregator
    /// re-queries on this signal.
    changes: broadcast::Sender<String>,
    subscription_capacity: usize,
    #[cfg(test)]
    append_faults: Arc<std::sync::atomic::AtomicU32>,
}

impl ChatStore {
    pub fn new(subscription_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(subscription_capacity.max(1));
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                conversations: HashMap::new(),
                messages: HashMap::new(),
                feeds: HashMap::new(),
                last_stamp: DateTime::<Utc>::MIN_UTC,
                next_seq: 0,
            })),
            changes,
            subscription_capacity: subscription_capacity.max(1),
            #[cfg(test)]
            append_faults: Arc::new(std::sync::atomic::AtomicU32::new(0)),
        }
    }

    /// Store sized from a [`Config`]; pair with the [`crate::client::ChatClient`]
    /// instances sharing that config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.subscription_capacity)
    }

    pub fn subscription_capacity(&self) -> usize {
        self.subscription_capacity
    }

    /// Server-assigned ordering key: monotonic timestamp plus insertion
    /// sequence. Client clocks never participate.
    fn stamp(inner: &mut StoreInner) -> (DateTime<Utc>, u64) {
        let mut now = Utc::now();
        if now < inner.last_stamp {
            now = inner.last_stamp;
        }
        inner.last_stamp = now;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        (now, seq)
    }

    /// Insert-with-id with merge semantics. If a conversation with this id
    /// already exists the call is a no-op returning the existing record, so
    /// concurrent first-contacts from both sides converge on one document.
    pub async fn upsert_conversation(
        &self,
        id: &str,
        participants: [String; 2],
        display_names: [String; 2],
    ) -> Result<Conversation> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.conversations.get(id) {
            return Ok(existing.clone());
        }
        let (created_at, _) = Self::stamp(&mut inner);
        let conv = Conversation {
            id: id.to_string(),
            participants,
            display_names,
            created_at,
            last_message: None,
            last_activity_at: None,
        };
        inner.conversations.insert(id.to_string(), conv.clone());
        info!(conversation = id, "conversation created");
        drop(inner);
        self.notify_change(id);
        Ok(conv)
    }

    pub async fn get_conversation(&self, id: &str) -> Option<Conversation> {
        self.inner.read().await.conversations.get(id).cloned()
    }

    /// All conversations whose participant set contains `user_id`
    /// (array-contains filter).
    pub async fn conversations_for(&self, user_id: &str) -> Vec<Conversation> {
        self.inner
            .read()
            .await
            .conversations
            .values()
            .filter(|c| c.has_participant(user_id))
            .cloned()
            .collect()
    }

    /// Insert-with-generated-id: append a message, stamping server-assigned
    /// `created_at`/`seq` and initializing `read_by` to the author alone.
    ///
    /// This is the sole write path for new messages. Subscribers observe the
    /// insert through their next snapshot; there is no direct coupling between
    /// sender and subscriber.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        author_id: &str,
        body: MessageBody,
    ) -> Result<Message> {
        let mut inner = self.inner.write().await;
        let Some(conv) = inner.conversations.get(conversation_id) else {
            return Err(ChatError::NotFound(format!(
                "conversation {}",
                conversation_id
            )));
        };
        // Only the two participants may write into a conversation.
        if !conv.has_participant(author_id) {
            return Err(ChatError::InvalidArgument(format!(
                "{} is not a participant of {}",
                author_id, conversation_id
            )));
        }
        #[cfg(test)]
        self.take_append_fault()?;
        let (created_at, seq) = Self::stamp(&mut inner);
        let msg = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            author_id: author_id.to_string(),
            body,
            created_at,
            seq,
            read_by: vec![author_id.to_string()],
        };

        let list = inner
            .messages
            .entry(conversation_id.to_string())
            .or_default();
        let pos = list.partition_point(|m| (m.created_at, m.seq) <= (msg.created_at, msg.seq));
        list.insert(pos, msg.clone());

        if let Some(conv) = inner.conversations.get_mut(conversation_id) {
            conv.last_message = Some(msg.clone());
            conv.last_activity_at = Some(created_at);
        }

        debug!(
            conversation = conversation_id,
            msg_id = %msg.id,
            seq,
            "message appended"
        );
        Self::publish_snapshot(&inner, conversation_id);
        drop(inner);
        self.notify_change(conversation_id);
        Ok(msg)
    }

    /// Full ordered message list for a conversation. An unknown conversation
    /// id yields an empty list, not an error.
    pub async fn messages_for(&self, conversation_id: &str) -> Vec<Message> {
        self.inner
            .read()
            .await
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The single most recent message of a conversation, if any.
    pub async fn latest_message(&self, conversation_id: &str) -> Option<Message> {
        self.inner
            .read()
            .await
            .messages
            .get(conversation_id)
            .and_then(|list| list.last().cloned())
    }

    /// Targeted field update: append `user_id` to a message's `read_by` set.
    ///
    /// Idempotent — returns `false` (and publishes nothing) when the user is
    /// already present, so re-applying under repeated snapshot delivery costs
    /// no write.
    pub async fn mark_read(
        &self,
        conversation_id: &str,
        message_id: &str,
        user_id: &str,
    ) -> Result<bool> {
        let ids = [message_id.to_string()];
        let changed = self.mark_read_many(conversation_id, &ids, user_id).await?;
        Ok(changed > 0)
    }

    /// Batch form of [`mark_read`](Self::mark_read): one snapshot is published
    /// for the whole batch, and only if at least one message actually changed.
    pub async fn mark_read_many(
        &self,
        conversation_id: &str,
        message_ids: &[String],
        user_id: &str,
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        if !inner.conversations.contains_key(conversation_id) {
            return Err(ChatError::NotFound(format!(
                "conversation {}",
                conversation_id
            )));
        }
        let Some(list) = inner.messages.get_mut(conversation_id) else {
            return Ok(0);
        };

        let mut changed = 0;
        for msg in list.iter_mut() {
            if message_ids.iter().any(|id| id == &msg.id) && !msg.is_read_by(user_id) {
                msg.read_by.push(user_id.to_string());
                changed += 1;
            }
        }

        // Keep the denormalized copy in sync so unread flags computed from it
        // converge too.
        if changed > 0 {
            if let Some(latest) = inner
                .messages
                .get(conversation_id)
                .and_then(|l| l.last().cloned())
            {
                if let Some(conv) = inner.conversations.get_mut(conversation_id) {
                    conv.last_message = Some(latest);
                }
            }
            debug!(
                conversation = conversation_id,
                reader = user_id,
                changed,
                "read state updated"
            );
            Self::publish_snapshot(&inner, conversation_id);
            drop(inner);
            self.notify_change(conversation_id);
        }
        Ok(changed)
    }

    /// Open a live subscription to one conversation.
    ///
    /// Returns the current snapshot (empty for a not-yet-existing
    /// conversation — that is valid) plus a receiver that gets a full ordered
    /// snapshot on every subsequent mutation. Dropping the receiver releases
    /// the subscription.
    pub async fn subscribe(
        &self,
        conversation_id: &str,
    ) -> (MessageSnapshot, broadcast::Receiver<MessageSnapshot>) {
        let mut inner = self.inner.write().await;
        let capacity = self.subscription_capacity;
        let rx = inner
            .feeds
            .entry(conversation_id.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();
        let snapshot = MessageSnapshot {
            conversation_id: conversation_id.to_string(),
            messages: inner
                .messages
                .get(conversation_id)
                .cloned()
                .unwrap_or_default(),
            origin: SnapshotOrigin::Live,
        };
        (snapshot, rx)
    }

    /// Subscribe to the coarse "something changed" signal carrying the
    /// affected conversation id. List views re-query on it.
    pub fn watch_changes(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }

    fn publish_snapshot(inner: &StoreInner, conversation_id: &str) {
        if let Some(tx) = inner.feeds.get(conversation_id) {
            let snapshot = MessageSnapshot {
                conversation_id: conversation_id.to_string(),
                messages: inner
                    .messages
                    .get(conversation_id)
                    .cloned()
                    .unwrap_or_default(),
                origin: SnapshotOrigin::Live,
            };
            // No receivers is fine; the channel just drops it.
            let _ = tx.send(snapshot);
        }
    }

    fn notify_change(&self, conversation_id: &str) {
        let _ = self.changes.send(conversation_id.to_string());
    }

    /// Arm `n` one-shot transient failures on the message write path, letting
    /// tests exercise retry handling against this in-process store.
    #[cfg(test)]
    pub(crate) fn inject_transient_append_failures(&self, n: u32) {
        self.append_faults.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn take_append_fault(&self) -> Result<()> {
        use std::sync::atomic::Ordering;
        if self.append_faults.load(Ordering::SeqCst) > 0 {
            self.append_faults.fetch_sub(1, Ordering::SeqCst);
            return Err(ChatError::Transient(
                "injected store failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl Clone for ChatStore {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            changes: self.changes.clone(),
            subscription_capacity: self.subscription_capacity,
            #[cfg(test)]
            append_faults: self.append_faults.clone(),
        }
    }
}

/// Restore the canonical ordering on a snapshot from an untrusted source
/// (e.g. a cache rehydrate): `created_at` ascending, ties broken by `seq`,
/// then by document id.
pub fn sort_snapshot(messages: &mut [Message]) {
    messages.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.seq.cmp(&b.seq))
            .then_with(|| a.id.cmp(&b.id))
    });
}
