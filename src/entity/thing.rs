//! `Thing`, `Puppet`, and `Vehicle` (spec §3.3).

use crate::{id::Id, security::Lock};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThingData {
    pub home: Id,
    pub lock: Lock,
}

impl ThingData {
    pub fn new(home: Id) -> Self {
        Self {
            home,
            lock: Lock::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuppetData {
    pub thing: ThingData,
    pub puppet_display_name: String,
}

impl PuppetData {
    pub fn new(home: Id) -> Self {
        Self {
            thing: ThingData::new(home),
            puppet_display_name: String::new(),
        }
    }

    /// Same empty-name fallback policy as `Player` (spec §9 open
    /// question, resolved "yes" for puppets too).
    pub fn effective_display_name<'a>(&'a self, entity_name: &'a str) -> &'a str {
        if self.puppet_display_name.is_empty() {
            entity_name
        } else {
            &self.puppet_display_name
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleData {
    pub thing: ThingData,
    pub interior: Id,
    pub controller: Id,
}

impl VehicleData {
    pub fn new(home: Id) -> Self {
        Self {
            thing: ThingData::new(home),
            interior: Id::INVALID,
            controller: Id::INVALID,
        }
    }
}
