//! The Database Access façade (spec §4.D): the single entry point
//! everything above the cache/storage pair talks to. Fans a request out
//! to the right site's [`SiteCache`], falls through to the
//! [`StorageBackend`] on a miss, and owns deferred deletion, listener
//! fan-out, and site lifecycle.

use crate::{
    cache::SiteCache,
    entity::{Entity, EntityRef},
    error::{DbError, DbResult, DbSuccess},
    id::{EntityId, Id, SiteId},
    storage::{FindPredicate, StorageBackend},
    time::TimeStamp,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Fan-out target for entity and site lifecycle events (spec §4.D). Each
/// method has a no-op default so listeners only implement what they need.
pub trait EntityListener: Send + Sync {
    fn entity_created(&self, _id: Id) {}
    fn entity_deleted(&self, _id: Id) {}
    fn site_deleted(&self, _site_id: SiteId) {}
}

pub struct DatabaseAccess {
    backend: Arc<dyn StorageBackend>,
    sites: RwLock<HashMap<SiteId, Arc<SiteCache>>>,
    listeners: RwLock<Vec<Arc<dyn EntityListener>>>,
    /// Names currently mid-rename, consulted by `find_by_name` so a search
    /// racing an in-flight player or program rename sees the new name
    /// before the Update Manager's flush has landed it in storage (spec
    /// §4.D, §8 scenario S4).
    rename_in_flight: RwLock<HashMap<Id, String>>,
}

impl DatabaseAccess {
    pub fn new(backend: Arc<dyn StorageBackend>) -> DbResult<Self> {
        backend.init()?;
        let access = Self {
            backend,
            sites: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            rename_in_flight: RwLock::new(HashMap::new()),
        };
        for site_id in access.backend.get_site_ids()? {
            access
                .sites
                .write()
                .insert(site_id, Arc::new(SiteCache::new(site_id)));
        }
        Ok(access)
    }

    pub fn add_listener(&self, listener: Arc<dyn EntityListener>) {
        self.listeners.write().push(listener);
    }

    /// Dispatches one event to every listener, isolating a panicking
    /// listener so it cannot stop the rest from observing the event (spec
    /// §4.D "per-listener isolation").
    fn notify(&self, dispatch: impl Fn(&dyn EntityListener)) {
        for listener in self.listeners.read().iter() {
            let listener = listener.as_ref();
            if catch_unwind(AssertUnwindSafe(|| dispatch(listener))).is_err() {
                tracing::error!("entity listener panicked during dispatch");
            }
        }
    }

    fn site_cache(&self, site_id: SiteId) -> DbResult<Arc<SiteCache>> {
        self.sites
            .read()
            .get(&site_id)
            .cloned()
            .ok_or(DbError::BadSiteId(site_id))
    }

    // --- entity CRUD ---

    /// Allocates an id for `entity`'s site, overwrites its header id with
    /// the allocation, persists it, and caches it (spec §4.A/§4.B entity
    /// creation).
    ///
    /// Players and guests go through an extra step first (spec §3.6): the
    /// entity is created under a temporary, per-entity-unique name, then
    /// renamed to the caller's chosen name. If that rename collides with
    /// an existing name, the just-created entity is deleted outright and
    /// the call fails rather than leaving an orphaned temp-named player
    /// behind.
    pub fn create_entity(&self, site_id: SiteId, mut entity: Entity) -> DbResult<EntityRef> {
        let cache = self.site_cache(site_id)?;
        let id = self.backend.new_entity_id(site_id)?;
        let is_player_like = matches!(entity.entity_type(), crate::entity::EntityType::Player | crate::entity::EntityType::Guest);
        let chosen_name = entity.name().to_string();
        entity.header_mut().id = id;

        if is_player_like {
            entity.header_mut().name = crate::entity::temp_player_name(id.entity_id, entity.header().instance);
        }

        self.backend.save_entity(id, &entity)?;
        let entity_ref = cache.insert_new(id.entity_id, entity);

        if is_player_like {
            if let Err(e) = self.finalize_player_name(site_id, &entity_ref, &chosen_name) {
                drop(entity_ref);
                self.finish_delete(&cache, id).ok();
                return Err(e);
            }
        }

        self.notify(|l| l.entity_created(id));
        Ok(entity_ref)
    }

    /// Renames a freshly created player/guest from its temporary name to
    /// `chosen_name`, failing if that name is already taken by another
    /// entity on the site (spec §3.6).
    fn finalize_player_name(&self, site_id: SiteId, entity_ref: &EntityRef, chosen_name: &str) -> DbResult<()> {
        if crate::entity::is_reserved_temp_name(chosen_name) {
            return Err(DbError::BadName);
        }
        if !self.find_by_exact_name(site_id, chosen_name)?.is_empty() {
            return Err(DbError::BadName);
        }
        if !entity_ref.write().set_name(chosen_name, usize::MAX) {
            return Err(DbError::BadName);
        }
        Ok(())
    }

    fn get_entity_ref_any(&self, id: Id) -> DbResult<EntityRef> {
        let cache = self.site_cache(id.site_id)?;
        let backend = self.backend.clone();
        cache.get_or_load(id.entity_id, || backend.get_entity(id))
    }

    /// Returns a pinned handle to `id`, failing with [`DbError::BadEntityId`]
    /// if the entity is pending-delete (spec §3.6, §5): a delete-pending
    /// entity is invisible to ordinary lookups even though it is still
    /// materialized and ref-counted.
    pub fn get_entity_ref(&self, id: Id) -> DbResult<EntityRef> {
        let entity_ref = self.get_entity_ref_any(id)?;
        if entity_ref.read().is_deleted() {
            return Err(DbError::BadEntityId(id));
        }
        Ok(entity_ref)
    }

    /// Like [`Self::get_entity_ref`], but bypasses the pending-delete
    /// filter — the one sanctioned way to still reach an entity during its
    /// deferred-delete window (spec §5).
    pub fn get_entity_deleted(&self, id: Id) -> DbResult<EntityRef> {
        self.get_entity_ref_any(id)
    }

    pub fn entity_exists(&self, id: Id) -> DbResult<bool> {
        let cache = self.site_cache(id.site_id)?;
        if let Some(entity_ref) = cache.get(id.entity_id) {
            return Ok(!entity_ref.read().is_deleted());
        }
        self.backend.entity_exists(id)
    }

    pub fn get_entity_type(&self, id: Id) -> DbResult<crate::entity::EntityType> {
        let cache = self.site_cache(id.site_id)?;
        if let Some(entity_ref) = cache.get(id.entity_id) {
            return Ok(entity_ref.read().entity_type());
        }
        self.backend.get_entity_type(id)
    }

    /// Deletes `id`. If it, or any entity contained within it, is still
    /// pinned by a live [`EntityRef`], the deletion is queued and
    /// [`DbSuccess::Delayed`] is returned; the Update Manager completes it
    /// once every pin releases (spec §4.D, §8 scenario S6).
    pub fn delete_entity(&self, id: Id) -> DbResult<DbSuccess> {
        let cache = self.site_cache(id.site_id)?;
        if !self.backend.entity_exists(id)? && cache.get(id.entity_id).is_none() {
            return Err(DbError::BadEntityId(id));
        }

        let children = self.backend.find(id.site_id, &FindPredicate::ByContainedBy(id))?;
        let mut all_pending = Vec::with_capacity(children.len() + 1);
        all_pending.extend(children);
        all_pending.push(id);

        let mut any_delayed = false;
        for pending_id in all_pending {
            let pending_cache = self.site_cache(pending_id.site_id)?;
            if pending_cache.is_anything_referenced(pending_id.entity_id) {
                pending_cache.set_delete_pending(pending_id.entity_id).ok();
                any_delayed = true;
                continue;
            }
            self.finish_delete(&pending_cache, pending_id)?;
        }

        Ok(if any_delayed {
            DbSuccess::Delayed
        } else {
            DbSuccess::Done
        })
    }

    /// Called by the Update Manager once it observes a delete-pending
    /// entity with no remaining references (spec §4.E).
    pub fn finish_delete(&self, cache: &SiteCache, id: Id) -> DbResult<()> {
        self.backend.delete_entity(id)?;
        cache.evict_if_unreferenced(id.entity_id);
        self.notify(|l| l.entity_deleted(id));
        Ok(())
    }

    pub fn cache_for_site(&self, site_id: SiteId) -> DbResult<Arc<SiteCache>> {
        self.site_cache(site_id)
    }

    // --- search ---

    pub fn find_by_exact_name(&self, site_id: SiteId, name: &str) -> DbResult<Vec<Id>> {
        let cache = self.site_cache(site_id)?;
        let mut ids = self.backend.find(site_id, &FindPredicate::ByExactName(name.to_string()))?;
        ids.retain(|id| !cache.is_delete_pending(id.entity_id));
        let renamed_matches: Vec<Id> = self
            .rename_in_flight
            .read()
            .iter()
            .filter(|(id, new_name)| id.site_id == site_id && new_name.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
            .collect();
        for id in renamed_matches {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    pub fn find_by_name_prefix(&self, site_id: SiteId, prefix: &str) -> DbResult<Vec<Id>> {
        let cache = self.site_cache(site_id)?;
        let mut ids = self.backend.find(site_id, &FindPredicate::ByNamePrefix(prefix.to_string()))?;
        ids.retain(|id| !cache.is_delete_pending(id.entity_id));
        Ok(ids)
    }

    pub fn find_by_type(&self, site_id: SiteId, entity_type: crate::entity::EntityType) -> DbResult<Vec<Id>> {
        let cache = self.site_cache(site_id)?;
        let mut ids = self.backend.find(site_id, &FindPredicate::ByType(entity_type))?;
        ids.retain(|id| !cache.is_delete_pending(id.entity_id));
        Ok(ids)
    }

    pub fn note_rename_in_flight(&self, id: Id, new_name: String) {
        self.rename_in_flight.write().insert(id, new_name);
    }

    pub fn clear_rename_in_flight(&self, id: Id) {
        self.rename_in_flight.write().remove(&id);
    }

    pub fn find_program_reg(&self, site_id: SiteId, name: &str) -> DbResult<Option<Id>> {
        self.backend.find_program_reg(site_id, name)
    }

    pub fn find_program_reg_inverse(&self, program_id: Id) -> DbResult<Option<String>> {
        self.backend.find_program_reg_inverse(program_id)
    }

    pub fn set_program_reg(&self, site_id: SiteId, name: &str, program_id: Id) -> DbResult<()> {
        self.backend.set_program_reg(site_id, name, program_id)
    }

    pub fn clear_program_reg(&self, site_id: SiteId, name: &str) -> DbResult<()> {
        self.backend.clear_program_reg(site_id, name)
    }

    // --- site lifecycle (spec §3.1, §4.D) ---

    pub fn new_site(&self, name: &str, description: &str) -> DbResult<SiteId> {
        let existing_names: DbResult<Vec<String>> = self
            .backend
            .get_site_ids()?
            .into_iter()
            .map(|id| self.backend.get_site_name(id))
            .collect();
        if existing_names?.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            return Err(DbError::BadName);
        }
        let site_id = self.backend.new_site(name, description)?;
        self.sites
            .write()
            .insert(site_id, Arc::new(SiteCache::new(site_id)));
        Ok(site_id)
    }

    /// Deletes a site outright once nothing within it is referenced; the
    /// Update Manager retries sites that come back [`DbSuccess::Delayed`]
    /// (spec §4.D).
    pub fn delete_site(&self, site_id: SiteId) -> DbResult<DbSuccess> {
        let cache = self.site_cache(site_id)?;
        if cache.len() > 0 {
            return Ok(DbSuccess::Delayed);
        }
        self.backend.delete_site(site_id)?;
        self.sites.write().remove(&site_id);
        self.notify(|l| l.site_deleted(site_id));
        Ok(DbSuccess::Done)
    }

    pub fn get_site_ids(&self) -> DbResult<Vec<SiteId>> {
        self.backend.get_site_ids()
    }

    pub fn get_site_name(&self, site_id: SiteId) -> DbResult<String> {
        self.backend.get_site_name(site_id)
    }

    pub fn get_site_description(&self, site_id: SiteId) -> DbResult<String> {
        self.backend.get_site_description(site_id)
    }

    pub fn set_site_name(&self, site_id: SiteId, name: &str) -> DbResult<()> {
        self.backend.set_site_name(site_id, name)
    }

    pub fn set_site_description(&self, site_id: SiteId, description: &str) -> DbResult<()> {
        self.backend.set_site_description(site_id, description)
    }

    // --- forwarded from the host process (spec §4.E) ---

    pub fn entities_updated_before(&self, site_id: SiteId, before: TimeStamp) -> DbResult<Vec<EntityId>> {
        self.backend.entities_updated_before(site_id, before)
    }

    /// Direct access to the underlying backend, bypassing the cache.
    /// Exposed for the Update Manager's flush loop and for tests that need
    /// to observe storage state independent of what's cached.
    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        self.backend.clone()
    }

    pub(crate) fn all_site_caches(&self) -> Vec<Arc<SiteCache>> {
        self.sites.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entity::{ContainerData, EntityType, Header, PlayerData},
        storage::SqliteBackend,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn access() -> DatabaseAccess {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        DatabaseAccess::new(backend).unwrap()
    }

    fn room(id: Id, contained_by: Id) -> Entity {
        Entity::Room(
            Header::new(id, EntityType::Room, Id::new(id.site_id, 1), "Room".into()),
            ContainerData::new(contained_by),
        )
    }

    #[test]
    fn create_then_fetch_round_trips() {
        let access = access();
        let site = access.new_site("Alpha", "").unwrap();
        let placeholder = room(Id::INVALID, Id::new(site, 1));
        let entity_ref = access.create_entity(site, placeholder).unwrap();
        let id = entity_ref.id();
        assert!(id.is_valid());
        let fetched = access.get_entity_ref(id).unwrap();
        assert_eq!(fetched.read().name(), "Room");
    }

    #[test]
    fn delete_with_live_ref_is_delayed_then_completes_on_drop() {
        let access = access();
        let site = access.new_site("Alpha", "").unwrap();
        let entity_ref = access
            .create_entity(site, room(Id::INVALID, Id::new(site, 1)))
            .unwrap();
        let id = entity_ref.id();

        let outcome = access.delete_entity(id).unwrap();
        assert_eq!(outcome, DbSuccess::Delayed);
        assert!(!access.entity_exists(id).unwrap());
        assert!(access.get_entity_ref(id).is_err());
        assert!(access.get_entity_deleted(id).is_ok());

        drop(entity_ref);
        let cache = access.cache_for_site(site).unwrap();
        assert!(cache.is_delete_pending(id.entity_id));
        access.finish_delete(&cache, id).unwrap();
        assert!(!access.backend.entity_exists(id).unwrap());
    }

    #[test]
    fn delete_without_live_refs_completes_immediately() {
        let access = access();
        let site = access.new_site("Alpha", "").unwrap();
        let entity_ref = access
            .create_entity(site, room(Id::INVALID, Id::new(site, 1)))
            .unwrap();
        let id = entity_ref.id();
        drop(entity_ref);
        assert_eq!(access.delete_entity(id).unwrap(), DbSuccess::Done);
        assert!(!access.entity_exists(id).unwrap());
    }

    #[test]
    fn listener_panic_does_not_block_other_listeners() {
        struct Panics;
        impl EntityListener for Panics {
            fn entity_created(&self, _id: Id) {
                panic!("boom");
            }
        }
        struct Counts(AtomicUsize);
        impl EntityListener for Counts {
            fn entity_created(&self, _id: Id) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let access = access();
        let site = access.new_site("Alpha", "").unwrap();
        access.add_listener(Arc::new(Panics));
        let counter = Arc::new(Counts(AtomicUsize::new(0)));
        access.add_listener(counter.clone());
        access
            .create_entity(site, room(Id::INVALID, Id::new(site, 1)))
            .unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn new_site_rejects_case_insensitive_duplicate_name() {
        let access = access();
        access.new_site("Alpha", "").unwrap();
        assert!(matches!(access.new_site("alpha", ""), Err(DbError::BadName)));
    }

    #[test]
    fn create_entity_renames_player_from_temp_name() {
        let access = access();
        let site = access.new_site("Alpha", "").unwrap();
        let player_ref = access
            .create_entity(
                site,
                Entity::Player(
                    Header::new(Id::INVALID, EntityType::Player, Id::INVALID, "Alice".to_string()),
                    PlayerData::new(Id::new(site, 1)),
                ),
            )
            .unwrap();
        assert_eq!(player_ref.read().name(), "Alice");
        assert!(!crate::entity::is_reserved_temp_name(player_ref.read().name()));
    }

    #[test]
    fn create_entity_rolls_back_player_on_duplicate_name() {
        let access = access();
        let site = access.new_site("Alpha", "").unwrap();
        access
            .create_entity(
                site,
                Entity::Player(
                    Header::new(Id::INVALID, EntityType::Player, Id::INVALID, "Alice".to_string()),
                    PlayerData::new(Id::new(site, 1)),
                ),
            )
            .unwrap();

        let before = access.find_by_type(site, EntityType::Player).unwrap().len();
        let result = access.create_entity(
            site,
            Entity::Player(
                Header::new(Id::INVALID, EntityType::Player, Id::INVALID, "Alice".to_string()),
                PlayerData::new(Id::new(site, 1)),
            ),
        );
        assert!(result.is_err());
        let after = access.find_by_type(site, EntityType::Player).unwrap().len();
        assert_eq!(before, after);
    }

    #[test]
    fn search_sees_in_flight_rename_before_flush() {
        let access = access();
        let site = access.new_site("Alpha", "").unwrap();
        let entity_ref = access
            .create_entity(site, room(Id::INVALID, Id::new(site, 1)))
            .unwrap();
        let id = entity_ref.id();
        access.note_rename_in_flight(id, "Renamed".to_string());
        let found = access.find_by_exact_name(site, "Renamed").unwrap();
        assert_eq!(found, vec![id]);
    }
}
