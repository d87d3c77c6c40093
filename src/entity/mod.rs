//! The tagged entity sum type, its per-variant fields, and the
//! getter/setter API every setter routes mutation through (spec §3, §4.A).
//!
//! Replaces the original source's `dynamic_cast`-based polymorphism with
//! an explicit match over a closed `Entity` enum (spec §9 redesign note):
//! the variant tag was already just data (`EntityType`), so there is no
//! virtual dispatch left to remove, only the match itself.

mod action;
mod container;
mod group;
mod header;
mod player;
mod program;
mod property;
mod ref_handle;
mod registration;
mod text;
mod thing;

pub use action::{ActionData, ExitData};
pub use container::ContainerData;
pub use group::GroupData;
pub use header::{DirtySet, EntityField, EntityType, Header, ReferenceDelta};
pub use player::PlayerData;
pub use program::ProgramData;
pub use property::{Application, PropertyDirectory, PropertyValue};
pub use ref_handle::{EntityCell, EntityRef, MultiLockError};
pub use registration::RegistrationDirectory;
pub use text::{eq_ignore_case, is_reserved_temp_name, temp_player_name, validate_limited};
pub use thing::{PuppetData, ThingData, VehicleData};

use crate::{id::Id, security::Lock};
use serde::{Deserialize, Serialize};

/// The closed set of entity variants (spec §3.3). Each carries the shared
/// [`Header`] plus its own extra-fields struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entity {
    Group(Header, GroupData),
    Capability(Header, GroupData),
    Region(Header, ContainerData),
    Room(Header, ContainerData),
    Player(Header, PlayerData),
    Guest(Header, PlayerData),
    Thing(Header, ThingData),
    Puppet(Header, PuppetData),
    Vehicle(Header, VehicleData),
    Command(Header, ActionData),
    Exit(Header, ExitData),
    Program(Header, ProgramData),
}

impl Entity {
    pub fn header(&self) -> &Header {
        match self {
            Entity::Group(h, _)
            | Entity::Capability(h, _)
            | Entity::Region(h, _)
            | Entity::Room(h, _)
            | Entity::Player(h, _)
            | Entity::Guest(h, _)
            | Entity::Thing(h, _)
            | Entity::Puppet(h, _)
            | Entity::Vehicle(h, _)
            | Entity::Command(h, _)
            | Entity::Exit(h, _)
            | Entity::Program(h, _) => h,
        }
    }

    pub fn header_mut(&mut self) -> &mut Header {
        match self {
            Entity::Group(h, _)
            | Entity::Capability(h, _)
            | Entity::Region(h, _)
            | Entity::Room(h, _)
            | Entity::Player(h, _)
            | Entity::Guest(h, _)
            | Entity::Thing(h, _)
            | Entity::Puppet(h, _)
            | Entity::Vehicle(h, _)
            | Entity::Command(h, _)
            | Entity::Exit(h, _)
            | Entity::Program(h, _) => h,
        }
    }

    pub fn id(&self) -> Id {
        self.header().id
    }

    pub fn entity_type(&self) -> EntityType {
        self.header().entity_type
    }

    pub fn owner(&self) -> Id {
        self.header().owner
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn is_deleted(&self) -> bool {
        self.header().deleted_flag
    }

    /// Marks the entity pending-delete (spec §3.6). Idempotent.
    pub fn mark_deleted(&mut self) {
        let header = self.header_mut();
        if !header.deleted_flag {
            header.deleted_flag = true;
            header.touch(EntityField::DeletedFlag);
        }
    }

    /// Sets the entity name, enforcing trim/non-empty/limit (spec §3.2).
    /// Returns `false` and leaves the prior name untouched on failure
    /// (spec §4.A failure-mode contract).
    pub fn set_name(&mut self, raw: &str, limit: usize) -> bool {
        let Some(name) = validate_limited(raw, limit) else {
            return false;
        };
        let header = self.header_mut();
        header.name = name;
        header.touch(EntityField::Name);
        true
    }

    pub fn set_owner(&mut self, new_owner: Id) -> bool {
        if !new_owner.is_valid() {
            return false;
        }
        let header = self.header_mut();
        let old = header.owner;
        header.owner = new_owner;
        header.record_reference_change(old, new_owner, EntityField::Owner);
        header.touch(EntityField::Owner);
        true
    }

    pub fn set_security(&mut self, security: crate::security::Security) {
        let header = self.header_mut();
        header.security = security;
        header.touch(EntityField::Security);
    }

    /// Deep-copies this entity into a new id/version/instance, marking
    /// every field dirty so the first flush re-persists all of it (spec
    /// §3.3, §4.A). The variant tag never changes across a clone.
    pub fn clone_as(&self, new_id: Id, new_version: u32, new_instance: u32) -> Entity {
        let mut cloned = self.clone();
        {
            let header = cloned.header_mut();
            header.id = new_id;
            header.version = new_version;
            header.instance = new_instance;
            header.created_at = crate::time::TimeStamp::now();
            header.last_updated_at = header.created_at;
            header.dirty.mark_all();
            header.pending_deltas.clear();
        }
        cloned
    }

    // --- container-entity fields (Region, Room) ---

    pub fn contained_by(&self) -> Option<Id> {
        match self {
            Entity::Region(_, c) | Entity::Room(_, c) => Some(c.contained_by),
            Entity::Command(_, a) | Entity::Exit(_, ExitData { action: a, .. }) => {
                Some(a.contained_by)
            }
            _ => None,
        }
    }

    pub fn set_contained_by(&mut self, new_container: Id) -> bool {
        if !new_container.is_valid() {
            return false;
        }
        let (old, field) = match self {
            Entity::Region(_, c) | Entity::Room(_, c) => (c.contained_by, EntityField::ContainedBy),
            Entity::Command(_, a) | Entity::Exit(_, ExitData { action: a, .. }) => {
                (a.contained_by, EntityField::ContainedBy)
            }
            _ => return false,
        };
        match self {
            Entity::Region(_, c) | Entity::Room(_, c) => c.contained_by = new_container,
            Entity::Command(_, a) | Entity::Exit(_, ExitData { action: a, .. }) => {
                a.contained_by = new_container
            }
            _ => unreachable!(),
        }
        let header = self.header_mut();
        header.record_reference_change(old, new_container, field);
        header.touch(field);
        true
    }

    pub fn properties(&self) -> Option<&PropertyDirectory> {
        match self {
            Entity::Region(_, c) | Entity::Room(_, c) => Some(&c.properties),
            Entity::Program(_, p) => Some(&p.properties),
            _ => None,
        }
    }

    pub fn properties_mut(&mut self) -> Option<&mut PropertyDirectory> {
        let field = EntityField::Properties;
        let props = match self {
            Entity::Region(_, c) | Entity::Room(_, c) => Some(&mut c.properties),
            Entity::Program(_, p) => Some(&mut p.properties),
            _ => None,
        };
        if props.is_some() {
            self.header_mut().touch(field);
        }
        match self {
            Entity::Region(_, c) | Entity::Room(_, c) => Some(&mut c.properties),
            Entity::Program(_, p) => Some(&mut p.properties),
            _ => None,
        }
    }

    // --- home (Player, Guest, Thing, Puppet, Vehicle) ---

    pub fn home(&self) -> Option<Id> {
        match self {
            Entity::Player(_, p) | Entity::Guest(_, p) => Some(p.home),
            Entity::Thing(_, t) => Some(t.home),
            Entity::Puppet(_, p) => Some(p.thing.home),
            Entity::Vehicle(_, v) => Some(v.thing.home),
            _ => None,
        }
    }

    pub fn set_home(&mut self, new_home: Id) -> bool {
        if !new_home.is_valid() {
            return false;
        }
        let old = match self {
            Entity::Player(_, p) | Entity::Guest(_, p) => p.home,
            Entity::Thing(_, t) => t.home,
            Entity::Puppet(_, p) => p.thing.home,
            Entity::Vehicle(_, v) => v.thing.home,
            _ => return false,
        };
        match self {
            Entity::Player(_, p) | Entity::Guest(_, p) => p.home = new_home,
            Entity::Thing(_, t) => t.home = new_home,
            Entity::Puppet(_, p) => p.thing.home = new_home,
            Entity::Vehicle(_, v) => v.thing.home = new_home,
            _ => unreachable!(),
        }
        let header = self.header_mut();
        header.record_reference_change(old, new_home, EntityField::Home);
        header.touch(EntityField::Home);
        true
    }

    // --- Player / Guest password and display name ---

    /// Always fails for `Guest` regardless of stored state (spec §3.3).
    pub fn set_password(&mut self, password: &str) -> bool {
        match self {
            Entity::Guest(..) => false,
            Entity::Player(_, p) => {
                let ok = p.set_password(password);
                if ok {
                    self.header_mut().touch(EntityField::EncryptedPassword);
                }
                ok
            }
            _ => false,
        }
    }

    /// Always fails for `Guest` regardless of stored state (spec §3.3).
    pub fn check_password(&self, password: &str) -> bool {
        match self {
            Entity::Guest(..) => false,
            Entity::Player(_, p) => p.check_password(password),
            _ => false,
        }
    }

    pub fn set_display_name(&mut self, raw: &str, limit: usize) -> bool {
        let Some(name) = validate_limited(raw, limit) else {
            return false;
        };
        match self {
            Entity::Player(_, p) | Entity::Guest(_, p) => {
                p.display_name = name;
                self.header_mut().touch(EntityField::DisplayName);
                true
            }
            Entity::Puppet(_, p) => {
                p.puppet_display_name = name;
                self.header_mut().touch(EntityField::DisplayName);
                true
            }
            _ => false,
        }
    }

    /// Resolves the effective display name (empty falls back to the
    /// entity's plain name) for `Player`, `Guest`, and `Puppet`.
    pub fn effective_display_name(&self) -> Option<&str> {
        let entity_name = self.name();
        match self {
            Entity::Player(_, p) | Entity::Guest(_, p) => Some(p.effective_display_name(entity_name)),
            Entity::Puppet(_, p) => Some(p.effective_display_name(entity_name)),
            _ => None,
        }
    }

    // --- lock (Thing/Puppet/Vehicle, Command/Exit) ---

    pub fn set_lock(&mut self, lock: Lock) -> bool {
        match self {
            Entity::Thing(_, t) => {
                t.lock = lock;
                self.header_mut().touch(EntityField::Lock);
                true
            }
            Entity::Puppet(_, p) => {
                p.thing.lock = lock;
                self.header_mut().touch(EntityField::Lock);
                true
            }
            Entity::Vehicle(_, v) => {
                v.thing.lock = lock;
                self.header_mut().touch(EntityField::Lock);
                true
            }
            Entity::Command(_, a) => {
                a.lock = Some(lock);
                self.header_mut().touch(EntityField::Lock);
                true
            }
            Entity::Exit(_, e) => {
                e.action.lock = Some(lock);
                self.header_mut().touch(EntityField::Lock);
                true
            }
            _ => false,
        }
    }

    // --- Vehicle interior/controller ---

    pub fn set_vehicle_interior(&mut self, interior: Id) -> bool {
        let Entity::Vehicle(_, v) = self else {
            return false;
        };
        let old = v.interior;
        v.interior = interior;
        let header = self.header_mut();
        header.record_reference_change(old, interior, EntityField::VehicleInterior);
        header.touch(EntityField::VehicleInterior);
        true
    }

    pub fn set_vehicle_controller(&mut self, controller: Id) -> bool {
        let Entity::Vehicle(_, v) = self else {
            return false;
        };
        let old = v.controller;
        v.controller = controller;
        let header = self.header_mut();
        header.record_reference_change(old, controller, EntityField::VehicleController);
        header.touch(EntityField::VehicleController);
        true
    }

    // --- Action (Command/Exit) targets and commands ---

    pub fn action_data(&self) -> Option<&ActionData> {
        match self {
            Entity::Command(_, a) => Some(a),
            Entity::Exit(_, e) => Some(&e.action),
            _ => None,
        }
    }

    pub fn set_action_targets(&mut self, targets: Vec<Id>) -> bool {
        let old_targets = match self.action_data() {
            Some(a) => a.targets.clone(),
            None => return false,
        };
        match self {
            Entity::Command(_, a) => a.targets = targets.clone(),
            Entity::Exit(_, e) => e.action.targets = targets.clone(),
            _ => return false,
        }
        let header = self.header_mut();
        for old in &old_targets {
            header.record_reference_change(*old, Id::INVALID, EntityField::ActionTargets);
        }
        for new in &targets {
            header.record_reference_change(Id::INVALID, *new, EntityField::ActionTargets);
        }
        header.touch(EntityField::ActionTargets);
        true
    }

    pub fn set_commands(&mut self, commands: Vec<String>) -> bool {
        match self {
            Entity::Command(_, a) => {
                a.set_commands(commands);
                self.header_mut().touch(EntityField::ActionCommands);
                true
            }
            Entity::Exit(_, e) => {
                e.action.set_commands(commands);
                self.header_mut().touch(EntityField::ActionCommands);
                true
            }
            _ => false,
        }
    }

    pub fn has_action_command(&self, candidate: &str) -> bool {
        self.action_data()
            .map(|a| a.has_action_command(candidate))
            .unwrap_or(false)
    }

    // --- Group / Capability membership ---

    pub fn group_data(&self) -> Option<&GroupData> {
        match self {
            Entity::Group(_, g) | Entity::Capability(_, g) => Some(g),
            _ => None,
        }
    }

    pub fn add_group_member(&mut self, member: Id) -> bool {
        match self {
            Entity::Group(_, g) | Entity::Capability(_, g) => {
                g.add_member(member);
                self.header_mut().touch(EntityField::GroupMembers);
                true
            }
            _ => false,
        }
    }

    pub fn remove_group_member(&mut self, member: Id) -> bool {
        match self {
            Entity::Group(_, g) | Entity::Capability(_, g) => {
                g.remove_member(member);
                self.header_mut().touch(EntityField::GroupMembers);
                true
            }
            _ => false,
        }
    }

    pub fn is_active_group_member(&self, candidate: Id) -> bool {
        self.group_data()
            .map(|g| g.is_active_member(candidate))
            .unwrap_or(false)
    }

    // --- Program ---

    pub fn set_program_source(&mut self, source: String) -> bool {
        let Entity::Program(_, p) = self else {
            return false;
        };
        p.source = source;
        self.header_mut().touch(EntityField::ProgramSource);
        true
    }

    pub fn program_registration_name(&self) -> Option<&str> {
        match self {
            Entity::Program(_, p) => p.registration_name.as_deref(),
            _ => None,
        }
    }

    pub fn set_program_registration_name(&mut self, name: Option<String>) -> bool {
        let Entity::Program(_, p) = self else {
            return false;
        };
        p.registration_name = name;
        self.header_mut().touch(EntityField::RegistrationName);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Security;

    fn new_room(id: Id, owner: Id, contained_by: Id) -> Entity {
        Entity::Room(
            Header::new(id, EntityType::Room, owner, "A Room".to_string()),
            ContainerData::new(contained_by),
        )
    }

    #[test]
    fn set_name_rejects_empty_and_preserves_prior_value() {
        let mut room = new_room(Id::new(1, 10), Id::new(1, 2), Id::new(1, 3));
        assert!(!room.set_name("   ", 256));
        assert_eq!(room.name(), "A Room");
    }

    #[test]
    fn set_name_success_marks_dirty_and_updates_timestamp() {
        let mut room = new_room(Id::new(1, 10), Id::new(1, 2), Id::new(1, 3));
        assert!(room.set_name("New Name", 256));
        assert_eq!(room.name(), "New Name");
        assert!(room.header().dirty.is_dirty(EntityField::Name));
    }

    #[test]
    fn set_contained_by_records_reference_delta() {
        let mut room = new_room(Id::new(1, 10), Id::new(1, 2), Id::new(1, 3));
        assert!(room.set_contained_by(Id::new(1, 4)));
        let deltas = room.header_mut().take_pending_deltas();
        assert_eq!(
            deltas,
            vec![
                ReferenceDelta::removed(Id::new(1, 3), EntityField::ContainedBy),
                ReferenceDelta::added(Id::new(1, 4), EntityField::ContainedBy),
            ]
        );
    }

    #[test]
    fn move_to_same_container_is_still_recorded_as_identity_change() {
        // The no-op *movement event* contract lives in the primitives
        // layer outside this crate; at the entity layer, setting the
        // same value should simply be a true no-op diff.
        let mut room = new_room(Id::new(1, 10), Id::new(1, 2), Id::new(1, 3));
        room.header_mut().take_pending_deltas();
        assert!(room.set_contained_by(Id::new(1, 3)));
        assert!(room.header_mut().take_pending_deltas().is_empty());
    }

    #[test]
    fn clone_as_assigns_new_identity_and_marks_all_dirty() {
        let room = new_room(Id::new(1, 10), Id::new(1, 2), Id::new(1, 3));
        let cloned = room.clone_as(Id::new(1, 99), 2, 1);
        assert_eq!(cloned.id(), Id::new(1, 99));
        assert_eq!(cloned.header().version, 2);
        assert_eq!(cloned.header().instance, 1);
        assert_eq!(cloned.entity_type(), EntityType::Room);
        assert!(cloned.header().dirty.is_dirty(EntityField::Name));
    }

    #[test]
    fn guest_password_operations_always_fail() {
        let mut guest = Entity::Guest(
            Header::new(Id::new(1, 11), EntityType::Guest, Id::new(1, 11), "Guest1".into()),
            PlayerData::new(Id::new(1, 2)),
        );
        assert!(!guest.set_password("whatever"));
        assert!(!guest.check_password(""));
    }

    #[test]
    fn player_password_operations_work_normally() {
        let mut player = Entity::Player(
            Header::new(Id::new(1, 12), EntityType::Player, Id::new(1, 12), "Alice".into()),
            PlayerData::new(Id::new(1, 2)),
        );
        assert!(player.set_password("s3cret"));
        assert!(player.check_password("s3cret"));
    }

    #[test]
    fn set_owner_rejects_invalid_id() {
        let mut room = new_room(Id::new(1, 10), Id::new(1, 2), Id::new(1, 3));
        assert!(!room.set_owner(Id::INVALID));
        assert_eq!(room.owner(), Id::new(1, 2));
    }

    #[test]
    fn security_descriptor_round_trips() {
        let mut room = new_room(Id::new(1, 10), Id::new(1, 2), Id::new(1, 3));
        let mut sec = Security::default();
        sec.admin_ids.insert(Id::new(1, 99));
        room.set_security(sec.clone());
        assert_eq!(room.header().security, sec);
    }
}
