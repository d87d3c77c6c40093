//! The per-entity ref-counted, lockable handle the cache hands out (spec
//! §4.C `EntityRef`), and the fixed-set multi-lock helper operations that
//! touch more than one entity atomically use (spec §4.A).

use super::Entity;
use crate::id::Id;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;
use thiserror::Error;

/// The lock cell a cache entry owns. Cloning an [`EntityRef`] bumps the
/// `Arc` refcount rather than copying the entity, so every holder observes
/// the same live data (spec §4.C).
pub type EntityCell = Arc<RwLock<Entity>>;

/// A pinned handle to a live cached entity. Holding one keeps the cache
/// from evicting or finishing a pending delete of the underlying entity
/// until every `EntityRef` to it is dropped (spec §4.C, §4.D).
#[derive(Clone)]
pub struct EntityRef {
    id: Id,
    cell: EntityCell,
}

impl EntityRef {
    pub fn new(id: Id, cell: EntityCell) -> Self {
        Self { id, cell }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Entity> {
        self.cell.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Entity> {
        self.cell.write()
    }

    /// Strong count of the underlying cell, used by the cache to decide
    /// whether an entity is still referenced anywhere (spec §4.C
    /// `is_anything_referenced`).
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.cell)
    }
}

#[derive(Debug, Error)]
pub enum MultiLockError {
    #[error("one or more ids passed to a multi-entity lock were duplicated")]
    DuplicateId,
}

/// Acquires write locks on a fixed set of entities, always in ascending
/// `Id` order, regardless of the order callers request them in. This is
/// the only sanctioned way to lock more than one entity at once; taking
/// locks in a consistent global order rules out the classic two-entity
/// deadlock (A locks X-then-Y while B locks Y-then-X).
///
/// Returns guards in the same order as the (sorted) input. Rejects
/// duplicate ids up front rather than deadlocking on a self-relock.
pub fn lock_many<'a>(
    refs: &'a [EntityRef],
) -> Result<Vec<RwLockWriteGuard<'a, Entity>>, MultiLockError> {
    let mut order: Vec<usize> = (0..refs.len()).collect();
    order.sort_by_key(|&i| refs[i].id());
    for window in order.windows(2) {
        if refs[window[0]].id() == refs[window[1]].id() {
            return Err(MultiLockError::DuplicateId);
        }
    }

    let mut sorted_guards: Vec<(usize, RwLockWriteGuard<'a, Entity>)> = Vec::with_capacity(refs.len());
    for &i in &order {
        sorted_guards.push((i, refs[i].write()));
    }
    sorted_guards.sort_by_key(|(i, _)| *i);
    Ok(sorted_guards.into_iter().map(|(_, g)| g).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ContainerData, EntityType, Header};

    fn make_ref(id: Id) -> EntityRef {
        let entity = Entity::Room(
            Header::new(id, EntityType::Room, Id::new(1, 2), "r".into()),
            ContainerData::new(Id::new(1, 3)),
        );
        EntityRef::new(id, Arc::new(RwLock::new(entity)))
    }

    #[test]
    fn clone_shares_the_same_cell() {
        let r1 = make_ref(Id::new(1, 5));
        let r2 = r1.clone();
        assert_eq!(r1.strong_count(), 2);
        r2.write().set_name("renamed", 64);
        assert_eq!(r1.read().name(), "renamed");
    }

    #[test]
    fn lock_many_rejects_duplicates() {
        let r = make_ref(Id::new(1, 5));
        let refs = vec![r.clone(), r];
        assert!(matches!(lock_many(&refs), Err(MultiLockError::DuplicateId)));
    }

    #[test]
    fn lock_many_returns_guards_in_requested_order() {
        let a = make_ref(Id::new(1, 9));
        let b = make_ref(Id::new(1, 3));
        let refs = vec![a.clone(), b.clone()];
        let guards = lock_many(&refs).expect("no duplicates");
        assert_eq!(guards[0].id(), Id::new(1, 9));
        assert_eq!(guards[1].id(), Id::new(1, 3));
    }
}
