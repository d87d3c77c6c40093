//! A minimal `RegistrationDirectory`: the per-entity map from a local
//! friendly name to a linked program id, carried by
//! `ContainerPropertyEntity` (spec §3.3). Distinct from the per-site
//! unique `Program::registration_name` the Database Access façade indexes
//! (spec §4.B `find_program_reg`) — this directory only scopes names
//! within the single entity that owns it.

use crate::id::Id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationDirectory {
    entries: BTreeMap<String, Id>,
}

impl RegistrationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Id> {
        self.entries.get(name).copied()
    }

    pub fn set(&mut self, name: impl Into<String>, program: Id) {
        self.entries.insert(name.into(), program);
    }

    pub fn remove(&mut self, name: &str) -> Option<Id> {
        self.entries.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut dir = RegistrationDirectory::new();
        dir.set("helper", Id::new(1, 7));
        assert_eq!(dir.get("helper"), Some(Id::new(1, 7)));
    }

    #[test]
    fn remove_clears_entry() {
        let mut dir = RegistrationDirectory::new();
        dir.set("helper", Id::new(1, 7));
        dir.remove("helper");
        assert_eq!(dir.get("helper"), None);
        assert!(dir.is_empty());
    }
}
