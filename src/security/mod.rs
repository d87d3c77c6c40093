//! Deterministic authorization of entity and property operations (spec
//! §3.4, §4.F).

mod context;
mod descriptor;
mod evaluator;
mod lock;

pub use context::{Context, Operation};
pub use descriptor::{ListFlags, OtherFlags, Security};
pub use evaluator::{evaluate, evaluate_checked, Decision, MembershipResolver, SecurityError};
pub use lock::Lock;
