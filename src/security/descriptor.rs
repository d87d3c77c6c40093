//! The [`Security`] descriptor attached to every entity and to each
//! property application (spec §3.4).

use crate::id::Id;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

bitflags! {
    /// Flags resolved against `other` — anyone not covered by owner
    /// equality, `admin_ids`, or `list_ids`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct OtherFlags: u8 {
        const READ  = 0b0001;
        const WRITE = 0b0010;
        const CHOWN = 0b0100;
        /// Short-circuits all flag checks in this scope: if set, every
        /// operation resolves `Allow` for anyone (spec §3.4).
        const BASIC = 0b1000;
    }
}

bitflags! {
    /// Flags resolved against `list_ids` members.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ListFlags: u8 {
        const READ  = 0b0001;
        const WRITE = 0b0010;
        const CHOWN = 0b0100;
        const BASIC = 0b1000;
    }
}

/// Security descriptor: who may do what, beyond plain owner equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub other_flags: OtherFlags,
    pub list_flags: ListFlags,
    pub admin_ids: BTreeSet<Id>,
    pub list_ids: BTreeSet<Id>,
}

impl Security {
    /// A descriptor granting nothing beyond owner equality.
    pub fn locked_down() -> Self {
        Self {
            other_flags: OtherFlags::empty(),
            list_flags: ListFlags::empty(),
            admin_ids: BTreeSet::new(),
            list_ids: BTreeSet::new(),
        }
    }

    /// A descriptor granting `other` read access, matching the default a
    /// freshly created room/thing gets in the original source.
    pub fn default_readable() -> Self {
        Self {
            other_flags: OtherFlags::READ,
            list_flags: ListFlags::empty(),
            admin_ids: BTreeSet::new(),
            list_ids: BTreeSet::new(),
        }
    }
}

impl Default for Security {
    fn default() -> Self {
        Self::locked_down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_down_has_no_flags() {
        let s = Security::locked_down();
        assert!(s.other_flags.is_empty());
        assert!(s.list_flags.is_empty());
    }

    #[test]
    fn default_readable_allows_other_read() {
        let s = Security::default_readable();
        assert!(s.other_flags.contains(OtherFlags::READ));
        assert!(!s.other_flags.contains(OtherFlags::WRITE));
    }
}
