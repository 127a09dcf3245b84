//! Error types for election domain values.

use thiserror::Error;

/// Errors raised while decoding election domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElectionTypesError {
    #[error("Malformed actor identity: {0}")]
    MalformedActorId(String),

    #[error("Unknown election type: {0}")]
    UnknownElectionType(String),

    #[error("Unknown election status: {0}")]
    UnknownElectionStatus(String),
}

pub type ElectionTypesResult<T> = Result<T, ElectionTypesError>;
