/// Message composition — validation plus the single write path for new
/// messages
///
/// The append is decoupled from every subscriber through the shared store:
/// the feed observes the new message on its next snapshot. On a transient
/// store failure the write is retried at most once automatically; anything
/// else surfaces to the caller, who keeps the user's input so they can retry
/// by hand.
use tracing::{info, warn};

use crate::error::{ChatError, Result};
use crate::store::ChatStore;
use crate::types::{Message, MessageBody, Participant};

/// Reject bodies the store must never see: empty text, blank image URL.
pub fn validate_body(body: &MessageBody) -> Result<()> {
    match body {
        MessageBody::Text(text) if text.trim().is_empty() => Err(ChatError::Validation(
            "message text must not be empty".to_string(),
        )),
        MessageBody::Image(url) if url.trim().is_empty() => Err(ChatError::Validation(
            "image URL must not be empty".to_string(),
        )),
        _ => Ok(()),
    }
}

fn should_retry(err: &ChatError, attempt: u32, retries: u32) -> bool {
    matches!(err, ChatError::Transient(_)) && attempt < retries
}

/// Append a new message authored by the current viewer.
///
/// Fails with [`ChatError::Unauthenticated`] when there is no viewer and with
/// [`ChatError::Validation`] for an empty body; in both cases nothing is
/// written.
pub async fn send_message(
    store: &ChatStore,
    viewer: Option<&Participant>,
    conversation_id: &str,
    body: MessageBody,
    retries: u32,
) -> Result<Message> {
    let viewer = viewer.ok_or(ChatError::Unauthenticated)?;
    validate_body(&body)?;

    let mut attempt = 0;
    loop {
        match store
            .append_message(conversation_id, &viewer.id, body.clone())
            .await
        {
            Ok(msg) => {
                info!(
                    conversation = conversation_id,
                    msg_id = %msg.id,
                    author = %viewer.id,
                    "message sent"
                );
                return Ok(msg);
            }
            Err(err) if should_retry(&err, attempt, retries) => {
                attempt += 1;
                warn!(
                    conversation = conversation_id,
                    attempt,
                    error = %err,
                    "transient send failure, retrying"
                );
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bodies_rejected() {
        assert!(matches!(
            validate_body(&MessageBody::Text("   ".to_string())),
            Err(ChatError::Validation(_))
        ));
        assert!(matches!(
            validate_body(&MessageBody::Image(String::new())),
            Err(ChatError::Validation(_))
        ));
        assert!(validate_body(&MessageBody::Text("hi".to_string())).is_ok());
        assert!(validate_body(&MessageBody::Image("https://img.example/a.jpg".to_string())).is_ok());
    }

    #[test]
    fn retry_only_on_transient_within_budget() {
        let transient = ChatError::Transient("net".to_string());
        let validation = ChatError::Validation("bad".to_string());
        assert!(should_retry(&transient, 0, 1));
        assert!(!should_retry(&transient, 1, 1));
        assert!(!should_retry(&validation, 0, 1));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_and_the_message_lands() {
        let store = ChatStore::new(4);
        store
            .upsert_conversation(
                "u1_u2",
                ["u1".to_string(), "u2".to_string()],
                ["A".to_string(), "B".to_string()],
            )
            .await
            .unwrap();
        let alice = Participant::new("u1", "A");

        store.inject_transient_append_failures(1);
        let msg = send_message(
            &store,
            Some(&alice),
            "u1_u2",
            MessageBody::Text("hi".to_string()),
            1,
        )
        .await
        .unwrap();
        assert_eq!(msg.author_id, "u1");
        assert_eq!(store.messages_for("u1_u2").await.len(), 1);
    }

    #[tokio::test]
    async fn transient_failure_past_the_budget_surfaces() {
        let store = ChatStore::new(4);
        store
            .upsert_conversation(
                "u1_u2",
                ["u1".to_string(), "u2".to_string()],
                ["A".to_string(), "B".to_string()],
            )
            .await
            .unwrap();
        let alice = Participant::new("u1", "A");

        // First attempt plus the single retry both fail.
        store.inject_transient_append_failures(2);
        let err = send_message(
            &store,
            Some(&alice),
            "u1_u2",
            MessageBody::Text("hi".to_string()),
            1,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::Transient(_)));
        assert!(store.messages_for("u1_u2").await.is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_send_writes_nothing() {
        let store = ChatStore::new(4);
        store
            .upsert_conversation(
                "u1_u2",
                ["u1".to_string(), "u2".to_string()],
                ["A".to_string(), "B".to_string()],
            )
            .await
            .unwrap();

        let err = send_message(
            &store,
            None,
            "u1_u2",
            MessageBody::Text("hi".to_string()),
            1,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::Unauthenticated));
        assert!(store.messages_for("u1_u2").await.is_empty());
    }
}
