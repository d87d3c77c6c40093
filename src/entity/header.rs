//! The shared entity header (spec §3.2): immutable identity fields, the
//! per-field dirty bitset, and the reference-delta log the Update Manager
//! folds into the inbound-reference index.

use crate::{id::Id, security::Security, time::TimeStamp};
use serde::{Deserialize, Serialize};

/// Every mutable or reference-bearing field a setter can touch. The
/// discriminant doubles as the bit index into [`DirtySet`], so this list
/// must stay under 64 entries and never renumber an existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityField {
    Name = 0,
    Owner = 1,
    Security = 2,
    ContainedBy = 3,
    LinkedPrograms = 4,
    Registrations = 5,
    Home = 6,
    EncryptedPassword = 7,
    DisplayName = 8,
    LastConnect = 9,
    Lock = 10,
    VehicleInterior = 11,
    VehicleController = 12,
    ActionTargets = 13,
    ActionMessages = 14,
    ActionCommands = 15,
    ArriveMessages = 16,
    GroupMembers = 17,
    GroupDisabled = 18,
    Properties = 19,
    ProgramSource = 20,
    RegistrationName = 21,
    DeletedFlag = 22,
}

/// A 64-bit per-field dirty bitset, indexed by [`EntityField`]'s
/// discriminant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtySet(u64);

impl DirtySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn set(&mut self, field: EntityField) {
        self.0 |= 1 << (field as u8);
    }

    pub fn is_dirty(&self, field: EntityField) -> bool {
        self.0 & (1 << (field as u8)) != 0
    }

    pub fn is_any_dirty(&self) -> bool {
        self.0 != 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Marks every known field dirty; used after `clone()` so the first
    /// flush re-persists the whole entity (spec §4.A).
    pub fn mark_all(&mut self) {
        self.0 = u64::MAX;
    }
}

/// A pending change to the inbound-reference index: `target` gained or
/// lost a reference from this entity's `field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDelta {
    pub target: Id,
    pub field: EntityField,
    pub delta: i8,
}

impl ReferenceDelta {
    pub fn added(target: Id, field: EntityField) -> Self {
        Self {
            target,
            field,
            delta: 1,
        }
    }

    pub fn removed(target: Id, field: EntityField) -> Self {
        Self {
            target,
            field,
            delta: -1,
        }
    }
}

/// The closed set of entity variants (spec §3.3). The tag is fixed at
/// creation and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Group,
    Capability,
    Region,
    Room,
    Player,
    Guest,
    Thing,
    Puppet,
    Vehicle,
    Command,
    Exit,
    Program,
}

impl EntityType {
    pub fn is_action(self) -> bool {
        matches!(self, EntityType::Command | EntityType::Exit)
    }

    pub fn is_container_property(self) -> bool {
        matches!(self, EntityType::Region | EntityType::Room)
    }

    pub fn is_player_like(self) -> bool {
        matches!(self, EntityType::Player | EntityType::Guest)
    }
}

/// Fields shared by every entity variant (spec §3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub id: Id,
    pub entity_type: EntityType,
    pub version: u32,
    pub instance: u32,
    pub owner: Id,
    pub name: String,
    pub security: Security,
    pub created_at: TimeStamp,
    pub last_updated_at: TimeStamp,
    pub deleted_flag: bool,
    #[serde(skip)]
    pub dirty: DirtySet,
    #[serde(skip)]
    pub pending_deltas: Vec<ReferenceDelta>,
}

impl Header {
    pub fn new(id: Id, entity_type: EntityType, owner: Id, name: String) -> Self {
        let now = TimeStamp::now();
        Self {
            id,
            entity_type,
            version: 1,
            instance: 1,
            owner,
            name,
            security: Security::default(),
            created_at: now,
            last_updated_at: now,
            deleted_flag: false,
            dirty: DirtySet::empty(),
            pending_deltas: Vec::new(),
        }
    }

    pub fn touch(&mut self, field: EntityField) {
        self.dirty.set(field);
        self.last_updated_at = TimeStamp::now();
    }

    pub fn record_reference_change(&mut self, old: Id, new: Id, field: EntityField) {
        if old == new {
            return;
        }
        if old.is_valid() {
            self.pending_deltas.push(ReferenceDelta::removed(old, field));
        }
        if new.is_valid() {
            self.pending_deltas.push(ReferenceDelta::added(new, field));
        }
    }

    pub fn take_pending_deltas(&mut self) -> Vec<ReferenceDelta> {
        std::mem::take(&mut self.pending_deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_set_tracks_individual_fields() {
        let mut dirty = DirtySet::empty();
        assert!(!dirty.is_any_dirty());
        dirty.set(EntityField::Name);
        assert!(dirty.is_dirty(EntityField::Name));
        assert!(!dirty.is_dirty(EntityField::Owner));
        assert!(dirty.is_any_dirty());
    }

    #[test]
    fn mark_all_sets_every_known_field() {
        let mut dirty = DirtySet::empty();
        dirty.mark_all();
        assert!(dirty.is_dirty(EntityField::Name));
        assert!(dirty.is_dirty(EntityField::ProgramSource));
    }

    #[test]
    fn clear_resets_dirty_bits() {
        let mut dirty = DirtySet::empty();
        dirty.set(EntityField::Name);
        dirty.clear();
        assert!(!dirty.is_any_dirty());
    }

    #[test]
    fn reference_change_emits_both_deltas_when_both_valid() {
        let mut header = Header::new(Id::new(1, 1), EntityType::Thing, Id::new(1, 2), "x".into());
        header.record_reference_change(Id::new(1, 10), Id::new(1, 11), EntityField::ContainedBy);
        let deltas = header.take_pending_deltas();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0], ReferenceDelta::removed(Id::new(1, 10), EntityField::ContainedBy));
        assert_eq!(deltas[1], ReferenceDelta::added(Id::new(1, 11), EntityField::ContainedBy));
    }

    #[test]
    fn reference_change_is_noop_for_identical_ids() {
        let mut header = Header::new(Id::new(1, 1), EntityType::Thing, Id::new(1, 2), "x".into());
        header.record_reference_change(Id::new(1, 10), Id::new(1, 10), EntityField::ContainedBy);
        assert!(header.take_pending_deltas().is_empty());
    }

    #[test]
    fn reference_change_from_invalid_only_adds() {
        let mut header = Header::new(Id::new(1, 1), EntityType::Thing, Id::new(1, 2), "x".into());
        header.record_reference_change(Id::INVALID, Id::new(1, 11), EntityField::Home);
        let deltas = header.take_pending_deltas();
        assert_eq!(deltas, vec![ReferenceDelta::added(Id::new(1, 11), EntityField::Home)]);
    }
}
