//! The security and identity envelope for a single in-progress command or
//! primitive (spec §4.F).

use crate::id::Id;

/// Opaque process identifier, used only for event attribution.
pub type Pid = u64;

/// The operations the evaluator's flag checks discriminate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
    Chown,
}

/// Requester, running program, and authority mode for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// The player driving the action.
    pub requester: Id,
    /// The running program, if any. `None` means "native primitive".
    pub program: Option<Id>,
    /// Whether `program` runs with the player's authority, or only its own.
    pub run_as_requester: bool,
    pub pid: Pid,
}

impl Context {
    pub fn native(requester: Id, pid: Pid) -> Self {
        Self {
            requester,
            program: None,
            run_as_requester: true,
            pid,
        }
    }

    pub fn running_program(requester: Id, program: Id, run_as_requester: bool, pid: Pid) -> Self {
        Self {
            requester,
            program: Some(program),
            run_as_requester,
            pid,
        }
    }

    /// The identities the evaluator should check for ownership/admin
    /// membership: the requester, and — if the program is not running
    /// with the requester's own authority — the program itself.
    pub fn acting_ids(&self) -> impl Iterator<Item = Id> + '_ {
        let program = if self.run_as_requester {
            None
        } else {
            self.program
        };
        std::iter::once(self.requester).chain(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_context_has_no_program() {
        let ctx = Context::native(Id::new(1, 5), 1);
        assert_eq!(ctx.program, None);
        assert_eq!(ctx.acting_ids().collect::<Vec<_>>(), vec![Id::new(1, 5)]);
    }

    #[test]
    fn program_not_run_as_requester_adds_program_identity() {
        let ctx = Context::running_program(Id::new(1, 5), Id::new(1, 9), false, 1);
        let ids: Vec<_> = ctx.acting_ids().collect();
        assert_eq!(ids, vec![Id::new(1, 5), Id::new(1, 9)]);
    }

    #[test]
    fn program_run_as_requester_only_contributes_requester() {
        let ctx = Context::running_program(Id::new(1, 5), Id::new(1, 9), true, 1);
        let ids: Vec<_> = ctx.acting_ids().collect();
        assert_eq!(ids, vec![Id::new(1, 5)]);
    }
}
