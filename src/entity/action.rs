//! `ActionEntity` (abstract in spec §3.3): shared shape for `Command` and
//! `Exit`, including command-string normalization (spec §4.A).

use crate::{id::Id, security::Lock};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionData {
    pub targets: Vec<Id>,
    pub lock: Option<Lock>,
    pub success_msg: String,
    pub fail_msg: String,
    pub room_msg: String,
    pub contained_by: Id,
    commands: Vec<String>,
    /// Lowercased mirror of `commands`, kept in lock-step at set time so
    /// `has_action_command_lower` is a plain exact-match scan (spec §4.A).
    commands_lower: Vec<String>,
}

impl ActionData {
    pub fn new(contained_by: Id) -> Self {
        Self {
            targets: Vec::new(),
            lock: None,
            success_msg: String::new(),
            fail_msg: String::new(),
            room_msg: String::new(),
            contained_by,
            commands: Vec::new(),
            commands_lower: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn set_commands(&mut self, commands: Vec<String>) {
        self.commands_lower = commands.iter().map(|c| c.to_lowercase()).collect();
        self.commands = commands;
    }

    /// Case-insensitive exact match against the normalized command list.
    pub fn has_action_command(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        self.commands_lower.iter().any(|c| *c == candidate)
    }
}

/// `Exit`'s extra fields beyond `ActionEntity` (spec §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitData {
    pub action: ActionData,
    pub arrive_msg: String,
    pub arrive_room_msg: String,
}

impl ExitData {
    pub fn new(contained_by: Id) -> Self {
        Self {
            action: ActionData::new(contained_by),
            arrive_msg: String::new(),
            arrive_room_msg: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_action_command_is_case_insensitive() {
        let mut a = ActionData::new(Id::new(1, 1));
        a.set_commands(vec!["Look".to_string(), "Examine".to_string()]);
        assert!(a.has_action_command("look"));
        assert!(a.has_action_command("LOOK"));
        assert!(a.has_action_command("Examine"));
        assert!(!a.has_action_command("poke"));
    }

    #[test]
    fn commands_and_lower_stay_in_sync_across_resets() {
        let mut a = ActionData::new(Id::new(1, 1));
        a.set_commands(vec!["Go".to_string()]);
        assert!(a.has_action_command("go"));
        a.set_commands(vec!["North".to_string()]);
        assert!(!a.has_action_command("go"));
        assert!(a.has_action_command("north"));
    }
}
