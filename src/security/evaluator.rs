//! The pure decision function over `(Context, Operation, Target)` (spec
//! §4.F) plus the locality check that layers on top of it.

use super::{
    context::{Context, Operation},
    descriptor::{ListFlags, OtherFlags, Security},
};
use crate::id::Id;
use thiserror::Error;

/// The evaluator's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allow(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Raised by [`evaluate_checked`] when a call site opts into a structured
/// violation instead of a bare [`Decision`] (spec §7).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("security violation: requester {requester} denied {op:?} on {target}")]
pub struct SecurityError {
    pub requester: Id,
    pub op: Operation,
    pub target: Id,
}

/// Resolves group/capability membership for the transitive admin/list
/// checks. Implemented against the entity graph by callers; kept as a
/// trait so the evaluator itself stays a pure function with no I/O.
pub trait MembershipResolver {
    /// True if `subject` is an active (non-disabled) member of the
    /// `Group`/`Capability` entity `group`. Implementations only need to
    /// check direct membership; the evaluator does the one-level fan-out
    /// over `admin_ids`/`list_ids` itself.
    fn is_group_member(&self, subject: Id, group: Id) -> bool;
}

fn acting_set_hits<'a>(acting: impl Iterator<Item = Id> + Clone + 'a, target: Id) -> bool {
    acting.clone().any(|id| id == target)
}

/// One level of transitive resolution: `acting` matches `ids` directly, or
/// `acting` is a member of some group/capability listed in `ids`.
fn matches_transitively(
    resolver: &dyn MembershipResolver,
    acting: impl Iterator<Item = Id> + Clone,
    ids: &std::collections::BTreeSet<Id>,
) -> bool {
    if acting.clone().any(|id| ids.contains(&id)) {
        return true;
    }
    acting
        .clone()
        .any(|id| ids.iter().any(|group| resolver.is_group_member(id, *group)))
}

/// Deterministic authorization decision (spec §4.F decision order):
///
/// 1. any acting id equals `target_owner` → Allow
/// 2. `other_flags` grants `op` (or carries `BASIC`) → Allow
/// 3. any acting id is in `security.admin_ids`, directly or via one level
///    of Group/Capability membership → Allow
/// 4. `list_flags` grants `op` (or carries `BASIC`) and the subject is in
///    `security.list_ids` → Allow
/// 5. otherwise → Deny
pub fn evaluate(
    resolver: &dyn MembershipResolver,
    ctx: &Context,
    op: Operation,
    target_owner: Id,
    security: &Security,
) -> Decision {
    let acting = ctx.acting_ids();

    if acting_set_hits(acting.clone(), target_owner) {
        return Decision::Allow;
    }

    if security.other_flags.contains(OtherFlags::BASIC) || other_flag_for(op, security.other_flags)
    {
        return Decision::Allow;
    }

    if matches_transitively(resolver, acting.clone(), &security.admin_ids) {
        return Decision::Allow;
    }

    let list_allows = security.list_flags.contains(ListFlags::BASIC) || list_flag_for(op, security.list_flags);
    if list_allows && matches_transitively(resolver, acting, &security.list_ids) {
        return Decision::Allow;
    }

    Decision::Deny
}

/// Same decision as [`evaluate`], but raises a [`SecurityError`] on deny
/// for call sites that want to propagate a structured violation instead
/// of branching on a bare [`Decision`].
pub fn evaluate_checked(
    resolver: &dyn MembershipResolver,
    ctx: &Context,
    op: Operation,
    target: Id,
    target_owner: Id,
    security: &Security,
) -> Result<(), SecurityError> {
    match evaluate(resolver, ctx, op, target_owner, security) {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(SecurityError {
            requester: ctx.requester,
            op,
            target,
        }),
    }
}

fn other_flag_for(op: Operation, flags: OtherFlags) -> bool {
    match op {
        Operation::Read => flags.contains(OtherFlags::READ),
        Operation::Write => flags.contains(OtherFlags::WRITE),
        Operation::Chown => flags.contains(OtherFlags::CHOWN),
    }
}

fn list_flag_for(op: Operation, flags: ListFlags) -> bool {
    match op {
        Operation::Read => flags.contains(ListFlags::READ),
        Operation::Write => flags.contains(ListFlags::WRITE),
        Operation::Chown => flags.contains(ListFlags::CHOWN),
    }
}

/// Locality check (spec §4.F): some operations additionally require the
/// target to be "local" to the requester — in the same container, in the
/// requester's own inventory, or within a `Region` ancestor of the
/// requester's current room. Actions on other players/puppets/guests are
/// never local, regardless of container.
pub fn is_local(
    target_is_player_like: bool,
    requester_container: Id,
    target_container: Id,
    target_in_requester_inventory: bool,
    target_in_requester_region: bool,
) -> bool {
    if target_is_player_like {
        return false;
    }
    requester_container == target_container
        || target_in_requester_inventory
        || target_in_requester_region
}
