//! Error types for election-runtime.
//!
//! Operations report rejections through `ActionResult`; these errors only
//! cover the persistence boundary.

use thiserror::Error;

/// Errors raised while loading or saving election state.
#[derive(Debug, Error)]
pub enum StateError {
    /// Reading or writing the state document failed.
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The state document is not valid JSON or could not be encoded.
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The document parsed but its shape is unusable.
    #[error("malformed state document: {0}")]
    Malformed(String),

    /// In-memory store lock was poisoned.
    #[error("state store lock poisoned")]
    LockPoisoned,
}

/// Result type for state operations.
pub type StateResult<T> = std::result::Result<T, StateError>;
