//! Identifiers: [`SiteId`], [`EntityId`], and the combined [`Id`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// 16-bit site identifier. `0` is reserved for the invalid/default site.
pub type SiteId = u16;

/// 32-bit entity identifier, unique within its site. `0` is reserved for
/// the invalid/default entity.
pub type EntityId = u32;

/// A site-qualified entity identifier. `(0, 0)` is the explicit
/// default/invalid value; see [`Id::INVALID`].
///
/// Wire JSON is `{"siteId": <uint>, "entityId": <uint>}` (spec §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Id {
    pub site_id: SiteId,
    pub entity_id: EntityId,
}

impl Id {
    /// The explicit invalid/default id, `(0, 0)`.
    pub const INVALID: Id = Id {
        site_id: 0,
        entity_id: 0,
    };

    /// Root player bootstrap id: site 1, entity 1.
    pub const ROOT_PLAYER: Id = Id {
        site_id: 1,
        entity_id: 1,
    };

    /// Root room bootstrap id: site 1, entity 2.
    pub const ROOT_ROOM: Id = Id {
        site_id: 1,
        entity_id: 2,
    };

    /// Root player's initial home/second room bootstrap id: site 1, entity 3.
    pub const ROOT_ROOM_2: Id = Id {
        site_id: 1,
        entity_id: 3,
    };

    pub const fn new(site_id: SiteId, entity_id: EntityId) -> Self {
        Self { site_id, entity_id }
    }

    /// True for every id other than `(0, 0)`.
    pub const fn is_valid(self) -> bool {
        self.site_id != 0 && self.entity_id != 0
    }

    /// True if this id names one of the three invariant bootstrap records
    /// (site 1, entities 1-3) that every site is seeded with.
    pub const fn is_bootstrap(self) -> bool {
        self.site_id == 1 && self.entity_id >= 1 && self.entity_id <= 3
    }

    /// Fixed 6-byte encoding used for cache keys and reference-delta
    /// records: big-endian site id followed by big-endian entity id.
    pub const fn to_bytes(self) -> [u8; 6] {
        let s = self.site_id.to_be_bytes();
        let e = self.entity_id.to_be_bytes();
        [s[0], s[1], e[0], e[1], e[2], e[3]]
    }

    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        let site_id = u16::from_be_bytes([bytes[0], bytes[1]]);
        let entity_id = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        Self { site_id, entity_id }
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.site_id, self.entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_is_zero_zero() {
        assert_eq!(Id::INVALID, Id::new(0, 0));
        assert!(!Id::INVALID.is_valid());
    }

    #[test]
    fn valid_ids_are_nonzero_in_both_fields() {
        assert!(Id::new(1, 1).is_valid());
        assert!(!Id::new(0, 1).is_valid());
        assert!(!Id::new(1, 0).is_valid());
    }

    #[test]
    fn byte_roundtrip() {
        let id = Id::new(0xBEEF, 0xCAFEBABE);
        assert_eq!(Id::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn bootstrap_range() {
        assert!(Id::new(1, 1).is_bootstrap());
        assert!(Id::new(1, 3).is_bootstrap());
        assert!(!Id::new(1, 4).is_bootstrap());
        assert!(!Id::new(2, 1).is_bootstrap());
    }

    #[test]
    fn ordering_is_site_major() {
        assert!(Id::new(1, 999) < Id::new(2, 1));
    }
}
