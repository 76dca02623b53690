//! Marketchat Core — chat synchronization for a service marketplace
//!
//! One-to-one chat between customers and service providers: canonical
//! conversation identity, live ordered message feeds, an on-device cache
//! mirror for cold starts, per-message read state, and conversation-list
//! aggregation. The backing document store and auth provider are explicit
//! collaborators; everything else in the marketplace app (booking, profiles,
//! uploads) sits outside this crate.

pub mod auth;
pub mod cache;
pub mod chat_list;
pub mod client;
pub mod composer;
pub mod config;
pub mod conversation;
pub mod error;
pub mod feed;
pub mod logging;
pub mod read_state;
pub mod store;
pub mod types;

pub use auth::{AuthProvider, StaticAuth};
pub use cache::CacheMirror;
pub use chat_list::{ChatListFeed, ListSnapshot};
pub use client::{ChatClient, ChatSession};
pub use config::Config;
pub use conversation::conversation_id;
pub use error::{ChatError, Result};
pub use feed::MessageFeed;
pub use store::ChatStore;
pub use types::{
    Conversation, ConversationSummary, Message, MessageBody, MessageSnapshot, Participant,
    SnapshotOrigin,
};
