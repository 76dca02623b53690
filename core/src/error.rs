/// Error types for the chat synchronization core
use thiserror::Error;

/// All failures surfaced by this crate.
///
/// Store errors are converted into one of these kinds at the call site nearest
/// the I/O; no backend-native error type crosses into callers.
#[derive(Error, Debug)]
pub enum ChatError {
    /// A caller-supplied identifier was empty or otherwise unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// User input rejected before any write (e.g. empty message body).
    #[error("Validation error: {0}")]
    Validation(String),

    /// No current viewer at the time of a write.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Retryable store failure (connectivity, timeout). One-shot writes retry
    /// this at most once automatically before surfacing it.
    #[error("Transient store error: {0}")]
    Transient(String),

    /// Local cache storage error. Non-fatal for feeds: the cache is advisory.
    #[error("Cache storage error: {0}")]
    Storage(String),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced conversation or profile does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;
