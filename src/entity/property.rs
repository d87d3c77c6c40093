//! A minimal stand-in for the property-directory data type. Spec §1
//! explicitly treats the full property-directory (a tree of keyed values
//! with its own query language) as an external collaborator; this crate
//! only needs enough of it to exercise the seams `ContainerPropertyEntity`,
//! `PropertyEntity`, and `Program` expose, and for the security evaluator
//! to apply application-scoped ACLs (spec §4.F) instead of the entity's.

use crate::{id::Id, security::Security};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One property "application" (namespace): its own owner and security
/// descriptor, plus a flat key/value store of leaf values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Application {
    pub owner: Id,
    pub security: Security,
    values: BTreeMap<String, PropertyValue>,
}

/// A leaf property value. The full directory's richer value model (lists,
/// nested documents, …) is out of scope; these are the primitive kinds
/// the core touches directly (lock coercion, display fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl PropertyValue {
    /// Coercion used by `Lock::ByProperty` (spec §3.5): integers are
    /// truthy when nonzero, text is truthy when non-empty.
    pub fn as_bool(&self) -> bool {
        match self {
            PropertyValue::Bool(b) => *b,
            PropertyValue::Integer(i) => *i != 0,
            PropertyValue::Text(s) => !s.is_empty(),
        }
    }
}

impl Application {
    pub fn new(owner: Id) -> Self {
        Self {
            owner,
            security: Security::default(),
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.values.remove(key)
    }
}

/// A tree of applications keyed by name, e.g. `"@desc"` or a program's
/// own namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyDirectory {
    applications: BTreeMap<String, Application>,
}

impl PropertyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application(&self, name: &str) -> Option<&Application> {
        self.applications.get(name)
    }

    pub fn application_mut(&mut self, name: &str) -> Option<&mut Application> {
        self.applications.get_mut(name)
    }

    pub fn ensure_application(&mut self, name: &str, default_owner: Id) -> &mut Application {
        self.applications
            .entry(name.to_string())
            .or_insert_with(|| Application::new(default_owner))
    }

    /// Reads a dotted `application/key` path and coerces it to bool, for
    /// `Lock::ByProperty`. Missing applications or keys coerce to `false`.
    pub fn read_as_bool(&self, path: &str) -> bool {
        let Some((app, key)) = path.split_once('/') else {
            return false;
        };
        self.application(app)
            .and_then(|a| a.get(key))
            .map(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_path_is_falsy() {
        let dir = PropertyDirectory::new();
        assert!(!dir.read_as_bool("flags/locked"));
    }

    #[test]
    fn set_and_read_bool_property() {
        let mut dir = PropertyDirectory::new();
        dir.ensure_application("flags", Id::new(1, 1))
            .set("locked", PropertyValue::Bool(true));
        assert!(dir.read_as_bool("flags/locked"));
    }

    #[test]
    fn integer_and_text_coercion() {
        assert!(PropertyValue::Integer(1).as_bool());
        assert!(!PropertyValue::Integer(0).as_bool());
        assert!(PropertyValue::Text("x".into()).as_bool());
        assert!(!PropertyValue::Text("".into()).as_bool());
    }

    #[test]
    fn malformed_path_without_slash_is_falsy() {
        let dir = PropertyDirectory::new();
        assert!(!dir.read_as_bool("noslash"));
    }
}
