//! Lock expressions (spec §3.5).

use crate::id::Id;
use serde::{Deserialize, Serialize};

/// A boolean gate evaluated against an entity. `ByProperty` reads a
/// property from the *evaluated* entity and coerces it to bool; the
/// coercion is supplied by the caller since the property directory's
/// value model lives outside this crate's scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lock {
    None,
    ById(Id),
    ByGroup(Id),
    ByProperty(String),
}

impl Default for Lock {
    fn default() -> Self {
        Lock::None
    }
}

/// Evaluates a lock against `evaluated`, given helpers to resolve group
/// membership and property truthiness (both may require backend access,
/// so they are supplied by the caller rather than baked into `Lock`).
pub fn evaluate_lock(
    lock: &Lock,
    evaluated: Id,
    is_member_of: impl FnOnce(Id, Id) -> bool,
    property_is_true: impl FnOnce(Id, &str) -> bool,
) -> bool {
    match lock {
        Lock::None => true,
        Lock::ById(id) => *id == evaluated,
        Lock::ByGroup(group_id) => is_member_of(evaluated, *group_id),
        Lock::ByProperty(path) => property_is_true(evaluated, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_always_passes() {
        assert!(evaluate_lock(
            &Lock::None,
            Id::new(1, 5),
            |_, _| false,
            |_, _| false
        ));
    }

    #[test]
    fn by_id_matches_exact_id() {
        let lock = Lock::ById(Id::new(1, 5));
        assert!(evaluate_lock(&lock, Id::new(1, 5), |_, _| false, |_, _| false));
        assert!(!evaluate_lock(&lock, Id::new(1, 6), |_, _| false, |_, _| false));
    }

    #[test]
    fn by_group_delegates_to_membership_check() {
        let lock = Lock::ByGroup(Id::new(1, 9));
        assert!(evaluate_lock(
            &lock,
            Id::new(1, 5),
            |who, group| who == Id::new(1, 5) && group == Id::new(1, 9),
            |_, _| false
        ));
    }

    #[test]
    fn by_property_delegates_to_coercion() {
        let lock = Lock::ByProperty("flags/locked".to_string());
        assert!(evaluate_lock(
            &lock,
            Id::new(1, 5),
            |_, _| false,
            |_, path| path == "flags/locked"
        ));
    }
}
