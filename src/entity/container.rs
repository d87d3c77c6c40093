//! `ContainerPropertyEntity` (abstract in spec §3.3): shared shape for
//! `Region` and `Room`.

use super::{property::PropertyDirectory, registration::RegistrationDirectory};
use crate::id::Id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerData {
    pub properties: PropertyDirectory,
    pub contained_by: Id,
    pub linked_programs: BTreeSet<Id>,
    pub registrations: Option<RegistrationDirectory>,
}

impl ContainerData {
    pub fn new(contained_by: Id) -> Self {
        Self {
            properties: PropertyDirectory::new(),
            contained_by,
            linked_programs: BTreeSet::new(),
            registrations: None,
        }
    }

    pub fn link_program(&mut self, program: Id) {
        self.linked_programs.insert(program);
    }

    pub fn unlink_program(&mut self, program: Id) {
        self.linked_programs.remove(&program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_container_has_no_linked_programs() {
        let c = ContainerData::new(Id::new(1, 5));
        assert!(c.linked_programs.is_empty());
        assert_eq!(c.contained_by, Id::new(1, 5));
    }

    #[test]
    fn link_and_unlink_program() {
        let mut c = ContainerData::new(Id::new(1, 5));
        c.link_program(Id::new(1, 9));
        assert!(c.linked_programs.contains(&Id::new(1, 9)));
        c.unlink_program(Id::new(1, 9));
        assert!(!c.linked_programs.contains(&Id::new(1, 9)));
    }
}
