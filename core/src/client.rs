/// Client facade — wires resolver, feeds, cache, read state and composer
///
/// `ChatClient` is the embedding application's entry point; `ChatSession` is
/// the screen-level handle for one open conversation. The viewer comes from
/// the injected [`AuthProvider`] — there is no process-global current user.
use std::sync::Arc;

use tracing::warn;

use crate::auth::AuthProvider;
use crate::cache::CacheMirror;
use crate::chat_list::{self, ChatListFeed};
use crate::composer;
use crate::config::Config;
use crate::conversation;
use crate::error::{ChatError, Result};
use crate::feed::MessageFeed;
use crate::store::ChatStore;
use crate::types::{ConversationSummary, Message, MessageBody, MessageSnapshot, Participant};

pub struct ChatClient {
    store: ChatStore,
    cache: Option<CacheMirror>,
    auth: Arc<dyn AuthProvider>,
    config: Config,
}

impl ChatClient {
    /// Build a client over a shared store and auth provider.
    ///
    /// A cache directory that fails to open is logged and dropped; the
    /// client then runs live-only. The cache is advisory, never required.
    pub fn new(store: ChatStore, auth: Arc<dyn AuthProvider>, config: Config) -> Self {
        let cache = match config.cache_dir.as_deref() {
            Some(dir) => match CacheMirror::open(dir) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!(error = %e, "cache unavailable, running live-only");
                    None
                }
            },
            None => None,
        };
        Self {
            store,
            cache,
            auth,
            config,
        }
    }

    fn viewer(&self) -> Result<Participant> {
        self.auth.current_user().ok_or(ChatError::Unauthenticated)
    }

    /// Resolve (creating lazily on first contact) the conversation with
    /// `peer` and open a live session on it.
    pub async fn open_conversation(&self, peer: &Participant) -> Result<ChatSession> {
        let viewer = self.viewer()?;
        let conv = conversation::ensure_conversation(&self.store, &viewer, peer).await?;
        let feed = MessageFeed::open(
            self.store.clone(),
            self.cache.clone(),
            viewer.clone(),
            conv.id.clone(),
            self.config.feed_capacity,
        )
        .await;
        Ok(ChatSession {
            conversation_id: conv.id,
            viewer,
            store: self.store.clone(),
            feed,
            write_retries: self.config.write_retries,
        })
    }

    /// One-shot conversation list for the current viewer.
    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        let viewer = self.viewer()?;
        Ok(chat_list::list_conversations(&self.store, &viewer.id).await)
    }

    /// Conversation list filtered by peer display name (case-insensitive
    /// substring).
    pub async fn search_conversations(&self, query: &str) -> Result<Vec<ConversationSummary>> {
        let viewer = self.viewer()?;
        chat_list::search_conversations(&self.store, &viewer.id, query).await
    }

    /// Live conversation-list feed (cached list first, then recomputed on
    /// every relevant change).
    pub async fn watch_conversations(&self) -> Result<ChatListFeed> {
        let viewer = self.viewer()?;
        Ok(ChatListFeed::open(
            self.store.clone(),
            self.cache.clone(),
            viewer.id,
            self.config.feed_capacity,
        )
        .await)
    }

    /// Send into an already-resolved conversation without holding a session.
    /// Re-reads the auth provider, so a signed-out user gets
    /// [`ChatError::Unauthenticated`].
    pub async fn send_message(
        &self,
        conversation_id: &str,
        body: MessageBody,
    ) -> Result<Message> {
        let viewer = self.auth.current_user();
        composer::send_message(
            &self.store,
            viewer.as_ref(),
            conversation_id,
            body,
            self.config.write_retries,
        )
        .await
    }
}

/// An open conversation: send plus an exclusive receive end of the live feed.
///
/// Dropping the session (or calling [`close`](Self::close)) tears the
/// subscription down exactly once.
#[derive(Debug)]
pub struct ChatSession {
    conversation_id: String,
    viewer: Participant,
    store: ChatStore,
    feed: MessageFeed,
    write_retries: u32,
}

impl ChatSession {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn viewer(&self) -> &Participant {
        &self.viewer
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<Message> {
        composer::send_message(
            &self.store,
            Some(&self.viewer),
            &self.conversation_id,
            MessageBody::Text(text.into()),
            self.write_retries,
        )
        .await
    }

    /// Send an image message. `url` is the publicly fetchable location the
    /// external upload service returned; it is stored opaquely.
    pub async fn send_image(&self, url: impl Into<String>) -> Result<Message> {
        composer::send_message(
            &self.store,
            Some(&self.viewer),
            &self.conversation_id,
            MessageBody::Image(url.into()),
            self.write_retries,
        )
        .await
    }

    /// Next snapshot from the feed (cache first, then live).
    pub async fn recv(&mut self) -> Option<MessageSnapshot> {
        self.feed.recv().await
    }

    pub fn close(self) {
        self.feed.cancel();
    }
}
