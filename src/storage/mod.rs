//! The Storage Backend contract (spec §4.B, §6): the only layer allowed to
//! touch persistent storage. Everything above this module works in terms
//! of in-memory [`crate::entity::Entity`] values and ids.

mod sqlite;

pub use sqlite::SqliteBackend;

use crate::{
    entity::{Entity, EntityType},
    error::DbResult,
    id::{EntityId, Id, SiteId},
    time::TimeStamp,
};

/// Metadata about a stored entity that doesn't require deserializing the
/// full blob: its type, owner, and dirty-adjacent bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    pub entity_type: EntityType,
    pub owner: Id,
    pub version: u32,
    pub instance: u32,
}

/// A single storage-level search predicate (spec §4.B `find`). The façade
/// above translates a richer query into a sequence of these.
#[derive(Debug, Clone)]
pub enum FindPredicate {
    ByExactName(String),
    ByNamePrefix(String),
    ByType(EntityType),
    ByOwner(Id),
    /// Direct children of a container/action entity (spec §4.D deferred
    /// delete's breadth-first cascade).
    ByContainedBy(Id),
}

/// The persistence contract every backend implements. All methods are
/// blocking; callers that need concurrency run them from a worker thread
/// (the Update Manager, or a request-handling thread pool upstream).
pub trait StorageBackend: Send + Sync {
    fn init(&self) -> DbResult<()>;
    fn shutdown(&self) -> DbResult<()>;

    /// Allocates a fresh id within `site_id`, reusing a recycled id first
    /// if one is available (spec §4.B, §6.2 `id_reuse`).
    fn new_entity_id(&self, site_id: SiteId) -> DbResult<Id>;

    fn save_entity(&self, id: Id, entity: &Entity) -> DbResult<()>;
    fn get_entity(&self, id: Id) -> DbResult<Entity>;
    fn entity_exists(&self, id: Id) -> DbResult<bool>;
    fn get_entity_type(&self, id: Id) -> DbResult<EntityType>;
    fn get_entity_metadata(&self, id: Id) -> DbResult<EntityMetadata>;

    /// Deletes the entity outright and recycles its id (spec §4.B, §6.2
    /// `id_reuse`). The façade above is responsible for ensuring nothing
    /// still pins the entity before calling this.
    fn delete_entity(&self, id: Id) -> DbResult<()>;

    fn find(&self, site_id: SiteId, predicate: &FindPredicate) -> DbResult<Vec<Id>>;

    /// Looks up the program registered under `name` within `site_id`
    /// (spec §4.B `find_program_reg`).
    fn find_program_reg(&self, site_id: SiteId, name: &str) -> DbResult<Option<Id>>;
    /// Inverse lookup: the registration name a program is known by, if any.
    fn find_program_reg_inverse(&self, program_id: Id) -> DbResult<Option<String>>;
    fn set_program_reg(&self, site_id: SiteId, name: &str, program_id: Id) -> DbResult<()>;
    fn clear_program_reg(&self, site_id: SiteId, name: &str) -> DbResult<()>;

    fn new_site(&self, name: &str, description: &str) -> DbResult<SiteId>;
    fn delete_site(&self, site_id: SiteId) -> DbResult<()>;
    fn get_site_ids(&self) -> DbResult<Vec<SiteId>>;
    fn get_site_name(&self, site_id: SiteId) -> DbResult<String>;
    fn get_site_description(&self, site_id: SiteId) -> DbResult<String>;
    fn set_site_name(&self, site_id: SiteId, name: &str) -> DbResult<()>;
    fn set_site_description(&self, site_id: SiteId, description: &str) -> DbResult<()>;

    /// All entity ids within `site_id` whose `last_updated_at` predates
    /// `before`, used by the Update Manager's dirty scan as a sanity cross
    /// check rather than the primary dirty signal (the cache's in-memory
    /// [`crate::entity::DirtySet`] is authoritative; spec §4.E).
    fn entities_updated_before(&self, site_id: SiteId, before: TimeStamp) -> DbResult<Vec<EntityId>>;
}
