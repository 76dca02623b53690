/// Conversation identity — canonical id derivation and lazy creation
///
/// A given unordered pair of participants must resolve to exactly one
/// conversation id for the lifetime of the pair. The id is derived, not looked
/// up: `min(a, b) + "_" + max(a, b)`. Because both sides compute the same id
/// and creation is an upsert, concurrent first-contacts converge on a single
/// record with no read-then-write race.
use crate::error::{ChatError, Result};
use crate::store::ChatStore;
use crate::types::{Conversation, Participant};

pub const ID_SEPARATOR: char = '_';

/// Derive the canonical conversation id for an unordered participant pair.
pub fn conversation_id(a: &str, b: &str) -> Result<String> {
    if a.is_empty() || b.is_empty() {
        return Err(ChatError::InvalidArgument(
            "participant id must not be empty".to_string(),
        ));
    }
    if a == b {
        return Err(ChatError::InvalidArgument(
            "participants must be distinct".to_string(),
        ));
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    Ok(format!("{}{}{}", lo, ID_SEPARATOR, hi))
}

/// Return the conversation for the pair, creating it if none exists.
///
/// Idempotent: re-resolving the same pair (in either order) is a no-op merge
/// that leaves `created_at` and the captured display names untouched.
pub async fn ensure_conversation(
    store: &ChatStore,
    a: &Participant,
    b: &Participant,
) -> Result<Conversation> {
    let id = conversation_id(&a.id, &b.id)?;

    // Participants are stored in the same order the id was derived from.
    let (first, second) = if a.id < b.id { (a, b) } else { (b, a) };
    store
        .upsert_conversation(
            &id,
            [first.id.clone(), second.id.clone()],
            [first.display_name.clone(), second.display_name.clone()],
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_order_independent() {
        assert_eq!(conversation_id("u1", "u2").unwrap(), "u1_u2");
        assert_eq!(conversation_id("u2", "u1").unwrap(), "u1_u2");
    }

    #[test]
    fn id_rejects_empty_or_equal() {
        assert!(matches!(
            conversation_id("", "u2"),
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(
            conversation_id("u1", ""),
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(
            conversation_id("u1", "u1"),
            Err(ChatError::InvalidArgument(_))
        ));
    }
}
