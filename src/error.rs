//! The error taxonomy returned across the façade (spec §7).

use crate::id::Id;
use thiserror::Error;

/// Successful outcomes that still need to distinguish "done now" from
/// "done, but only after pinned entities release" (spec §4.D deferred
/// delete, §8 scenario S6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbSuccess {
    /// The operation fully completed.
    Done,
    /// The operation is queued; it will complete once outstanding
    /// [`crate::entity::EntityRef`] pins on the affected entities drop.
    Delayed,
}

/// Recoverable error conditions surfaced across the Database Access
/// façade, the Site Cache, and the Storage Backend contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("id {0} is malformed or out of range")]
    BadId(Id),

    #[error("entity id {0} does not exist")]
    BadEntityId(Id),

    #[error("site id {0} does not exist")]
    BadSiteId(u16),

    #[error("owner {0} does not resolve to an existing player or guest")]
    BadOwner(Id),

    #[error("name is empty after trim, exceeds the configured limit, or is not valid UTF-8")]
    BadName,

    #[error("entity type is not valid for this operation")]
    BadEntityType,

    #[error("entity {0} is still referenced and cannot be purged yet")]
    EntityInUse(Id),

    #[error("security violation: requester is not authorized for this operation")]
    SecurityViolation,

    #[error("operation is impossible given the current state (e.g. moving an entity into itself)")]
    Impossible,

    #[error("storage or serialization error: {0}")]
    Storage(String),
}

pub type DbResult<T> = Result<T, DbError>;
