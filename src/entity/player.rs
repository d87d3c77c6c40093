//! `Player` and `Guest` (spec §3.3). `Guest` shares `Player`'s shape; its
//! `set_password`/`check_password` always fail regardless of stored state
//! (enforced at the `Entity` enum level, see `entity::mod`).

use crate::{id::Id, time::TimeStamp};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerData {
    pub encrypted_password: Option<String>,
    pub display_name: String,
    pub home: Id,
    pub last_connect: TimeStamp,
}

impl PlayerData {
    pub fn new(home: Id) -> Self {
        Self {
            encrypted_password: None,
            display_name: String::new(),
            home,
            last_connect: TimeStamp::default(),
        }
    }

    /// Hashes and stores `password`. Returns `false` only if hashing
    /// itself fails (argon2 params rejecting the input), matching the
    /// setter contract in spec §4.A ("prior state is preserved... returns
    /// false").
    pub fn set_password(&mut self, password: &str) -> bool {
        let salt = SaltString::generate(&mut OsRng);
        match Argon2::default().hash_password(password.as_bytes(), &salt) {
            Ok(hash) => {
                self.encrypted_password = Some(hash.to_string());
                true
            }
            Err(_) => false,
        }
    }

    pub fn check_password(&self, password: &str) -> bool {
        let Some(stored) = &self.encrypted_password else {
            return false;
        };
        let Ok(hash) = PasswordHash::new(stored) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    }

    /// Display-name fallback (spec §9 open question, resolved "yes" for
    /// both players and puppets): when `display_name` is empty, callers
    /// should fall back to the entity's plain `name` instead. This helper
    /// only covers the player half of that policy; see `ThingData`'s
    /// puppet helper for the symmetric puppet case.
    pub fn effective_display_name<'a>(&'a self, entity_name: &'a str) -> &'a str {
        if self.display_name.is_empty() {
            entity_name
        } else {
            &self.display_name
        }
    }
}
