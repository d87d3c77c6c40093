//! The per-site live-entity cache (spec §4.C): the first tier of the
//! two-tier façade in front of the [`crate::storage::StorageBackend`].
//! Holds every entity currently referenced by a live [`EntityRef`], plus
//! entities the Database Access façade chose to keep warm.

use crate::{
    entity::{Entity, EntityCell, EntityRef},
    error::{DbError, DbResult},
    id::{EntityId, Id, SiteId},
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

struct CacheSlot {
    cell: EntityCell,
    /// Set once the façade has queued this entity for deletion; the Update
    /// Manager drains these once nothing pins them anymore (spec §4.D).
    delete_pending: bool,
}

/// The live entity table for a single site. One `SiteCache` exists per
/// open site; sites are entirely independent of one another (spec §3.1).
pub struct SiteCache {
    site_id: SiteId,
    live: Mutex<HashMap<EntityId, CacheSlot>>,
}

impl SiteCache {
    pub fn new(site_id: SiteId) -> Self {
        Self {
            site_id,
            live: Mutex::new(HashMap::new()),
        }
    }

    pub fn site_id(&self) -> SiteId {
        self.site_id
    }

    /// Returns a pinned handle to an already-cached entity, without
    /// touching storage.
    pub fn get(&self, entity_id: EntityId) -> Option<EntityRef> {
        let live = self.live.lock();
        live.get(&entity_id)
            .map(|slot| EntityRef::new(Id::new(self.site_id, entity_id), slot.cell.clone()))
    }

    /// Returns a cached entity, loading it via `loader` on a cache miss.
    /// `loader` runs while holding the cache's internal lock, matching the
    /// original's single-flight load-on-miss behavior: concurrent misses
    /// for the same id block on each other rather than racing duplicate
    /// loads.
    pub fn get_or_load(
        &self,
        entity_id: EntityId,
        loader: impl FnOnce() -> DbResult<Entity>,
    ) -> DbResult<EntityRef> {
        let mut live = self.live.lock();
        if let Some(slot) = live.get(&entity_id) {
            return Ok(EntityRef::new(Id::new(self.site_id, entity_id), slot.cell.clone()));
        }
        let entity = loader()?;
        let cell = Arc::new(RwLock::new(entity));
        live.insert(
            entity_id,
            CacheSlot {
                cell: cell.clone(),
                delete_pending: false,
            },
        );
        Ok(EntityRef::new(Id::new(self.site_id, entity_id), cell))
    }

    /// Inserts a freshly created entity directly, skipping the loader path
    /// (spec §4.A/§4.B entity creation).
    pub fn insert_new(&self, entity_id: EntityId, entity: Entity) -> EntityRef {
        let cell = Arc::new(RwLock::new(entity));
        let mut live = self.live.lock();
        live.insert(
            entity_id,
            CacheSlot {
                cell: cell.clone(),
                delete_pending: false,
            },
        );
        EntityRef::new(Id::new(self.site_id, entity_id), cell)
    }

    pub fn set_delete_pending(&self, entity_id: EntityId) -> DbResult<()> {
        let mut live = self.live.lock();
        let slot = live
            .get_mut(&entity_id)
            .ok_or(DbError::BadEntityId(Id::new(self.site_id, entity_id)))?;
        slot.delete_pending = true;
        // Flips the entity's own header flag too, so anything holding an
        // `EntityRef` directly (not going through the cache lookup path)
        // also observes the pending delete (spec §3.6).
        slot.cell.write().mark_deleted();
        Ok(())
    }

    pub fn is_delete_pending(&self, entity_id: EntityId) -> bool {
        self.live
            .lock()
            .get(&entity_id)
            .map(|slot| slot.delete_pending)
            .unwrap_or(false)
    }

    /// True if anything beyond the cache's own slot still holds a
    /// reference to this entity (spec §4.C `is_anything_referenced`).
    pub fn is_anything_referenced(&self, entity_id: EntityId) -> bool {
        self.live
            .lock()
            .get(&entity_id)
            .map(|slot| Arc::strong_count(&slot.cell) > 1)
            .unwrap_or(false)
    }

    /// Drops the cache's own slot for `entity_id` if nothing external
    /// references it. Returns `true` if the slot was actually removed.
    /// Used once storage deletion has completed (spec §4.D).
    pub fn evict_if_unreferenced(&self, entity_id: EntityId) -> bool {
        let mut live = self.live.lock();
        let Some(slot) = live.get(&entity_id) else {
            return false;
        };
        if Arc::strong_count(&slot.cell) > 1 {
            return false;
        }
        live.remove(&entity_id);
        true
    }

    /// Ids of every currently cached entity with at least one dirty field
    /// (spec §4.E dirty scan).
    pub fn dirty_entity_ids(&self) -> Vec<EntityId> {
        let live = self.live.lock();
        live.iter()
            .filter(|(_, slot)| slot.cell.read().header().dirty.is_any_dirty())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids of every cached entity marked delete-pending, regardless of
    /// current reference state (the Update Manager decides readiness).
    pub fn delete_pending_ids(&self) -> Vec<EntityId> {
        let live = self.live.lock();
        live.iter()
            .filter(|(_, slot)| slot.delete_pending)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ContainerData, EntityType, Header};

    fn room(id: Id) -> Entity {
        Entity::Room(
            Header::new(id, EntityType::Room, Id::new(1, 1), "Room".into()),
            ContainerData::new(Id::new(1, 1)),
        )
    }

    #[test]
    fn get_or_load_only_invokes_loader_once() {
        let cache = SiteCache::new(1);
        let mut calls = 0;
        cache
            .get_or_load(5, || {
                calls += 1;
                Ok(room(Id::new(1, 5)))
            })
            .unwrap();
        cache.get_or_load(5, || panic!("loader should not run again")).unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn dropping_all_refs_allows_eviction() {
        let cache = SiteCache::new(1);
        let r = cache.insert_new(5, room(Id::new(1, 5)));
        assert!(!cache.evict_if_unreferenced(5));
        drop(r);
        assert!(cache.evict_if_unreferenced(5));
        assert!(cache.is_empty());
    }

    #[test]
    fn held_ref_blocks_eviction() {
        let cache = SiteCache::new(1);
        let r = cache.insert_new(5, room(Id::new(1, 5)));
        assert!(cache.is_anything_referenced(5));
        assert!(!cache.evict_if_unreferenced(5));
        drop(r);
        assert!(!cache.is_anything_referenced(5));
    }

    #[test]
    fn dirty_scan_reflects_mutations() {
        let cache = SiteCache::new(1);
        let r = cache.insert_new(5, room(Id::new(1, 5)));
        assert!(cache.dirty_entity_ids().is_empty());
        r.write().set_name("New", 64);
        assert_eq!(cache.dirty_entity_ids(), vec![5]);
    }
}
