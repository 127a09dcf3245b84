//! Actor identities and callers

use crate::{ElectionTypesError, ElectionTypesResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stable identity of a community member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub uuid::Uuid);

impl ActorId {
    /// Generate a new random ActorId
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn new(id: uuid::Uuid) -> Self {
        Self(id)
    }

    /// Short display form (first 8 chars), used when no display name is known
    pub fn short(&self) -> String {
        self.0.to_string().chars().take(8).collect()
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActorId {
    type Err = ElectionTypesError;

    fn from_str(s: &str) -> ElectionTypesResult<Self> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ElectionTypesError::MalformedActorId(s.to_string()))
    }
}

/// Who is invoking an operation.
///
/// The command layer has already authenticated the caller and resolved its
/// permissions; the engine only distinguishes members from the console and
/// privileged members from ordinary ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    /// Server console or automation; always privileged, has no identity
    Console,
    /// A community member
    Member { id: ActorId, privileged: bool },
}

impl Actor {
    pub fn member(id: ActorId) -> Self {
        Self::Member {
            id,
            privileged: false,
        }
    }

    pub fn admin(id: ActorId) -> Self {
        Self::Member {
            id,
            privileged: true,
        }
    }

    pub fn id(&self) -> Option<ActorId> {
        match self {
            Actor::Console => None,
            Actor::Member { id, .. } => Some(*id),
        }
    }

    pub fn is_privileged(&self) -> bool {
        match self {
            Actor::Console => true,
            Actor::Member { privileged, .. } => *privileged,
        }
    }

    /// Whether this caller is the given actor
    pub fn is(&self, other: &ActorId) -> bool {
        self.id().as_ref() == Some(other)
    }
}
