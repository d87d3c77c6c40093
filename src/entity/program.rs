//! `Program` (spec §3.3): properties, a source body, and a registration
//! name unique per site. Per-site uniqueness is enforced by the Database
//! Access façade (spec §4.B `find_program_reg`), not here — this struct
//! only carries the name the façade indexes.

use super::property::PropertyDirectory;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramData {
    pub properties: PropertyDirectory,
    pub source: String,
    pub registration_name: Option<String>,
}

impl ProgramData {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_program_has_no_registration() {
        let p = ProgramData::new();
        assert!(p.registration_name.is_none());
        assert!(p.source.is_empty());
    }
}
