//! `Group` and `Capability` (spec §3.3) — identical shape; `Capability`
//! additionally requires a per-site unique name, enforced by the Database
//! Access façade at creation/rename time, not here.

use crate::id::Id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupData {
    pub members: BTreeSet<Id>,
    /// Subset of `members` that are temporarily excluded from membership
    /// checks without being removed outright.
    pub disabled: BTreeSet<Id>,
}

impl GroupData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&mut self, id: Id) {
        self.members.insert(id);
    }

    pub fn remove_member(&mut self, id: Id) {
        self.members.remove(&id);
        self.disabled.remove(&id);
    }

    pub fn disable_member(&mut self, id: Id) {
        if self.members.contains(&id) {
            self.disabled.insert(id);
        }
    }

    pub fn enable_member(&mut self, id: Id) {
        self.disabled.remove(&id);
    }

    /// Active membership: present in `members` and not in `disabled`.
    pub fn is_active_member(&self, id: Id) -> bool {
        self.members.contains(&id) && !self.disabled.contains(&id)
    }
}
