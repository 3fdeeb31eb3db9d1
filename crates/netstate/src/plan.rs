//! Operation ordering.
//!
//! The diff emits operations in declaration order with no regard for
//! dependencies. This module sorts them so that every operation's
//! prerequisites run before it:
//!
//! * route removals precede the removal of the interface they ride on,
//! * bonds deactivate and delete before their ports change hands,
//! * ports exist and are up before the bond that aggregates them,
//! * routes install only after their next-hop interface is active.
//!
//! The sort is stable, so operations with equal rank keep the order the
//! caller declared them in. Two runs over the same states produce the
//! same plan.

use crate::diff::ChangeOp;

/// Phase rank. Lower runs first.
fn phase(op: &ChangeOp) -> u8 {
    match op {
        ChangeOp::DelRoute { .. } => 0,
        ChangeOp::DeactivateIface { .. } => 1,
        ChangeOp::DeleteIface { .. } => 2,
        ChangeOp::CreateIface { .. } => 3,
        ChangeOp::UpdateIface { .. } => 4,
        ChangeOp::ActivateIface { .. } => 5,
        ChangeOp::AddRoute { .. } => 6,
    }
}

/// Within-phase rank from the controller-chain depth.
///
/// Teardown runs top down (a bond before its ports), build-up runs bottom
/// up (ports before their bond).
fn depth(op: &ChangeOp) -> i64 {
    match op {
        ChangeOp::DeactivateIface { up_priority, .. }
        | ChangeOp::DeleteIface { up_priority, .. } => i64::from(*up_priority),
        ChangeOp::CreateIface { up_priority, .. }
        | ChangeOp::ActivateIface { up_priority, .. } => -i64::from(*up_priority),
        ChangeOp::UpdateIface { .. } | ChangeOp::AddRoute { .. } | ChangeOp::DelRoute { .. } => 0,
    }
}

/// Order a diff into an executable plan.
pub fn plan(mut ops: Vec<ChangeOp>) -> Vec<ChangeOp> {
    ops.sort_by_key(|op| (phase(op), depth(op)));
    ops
}

/// Get a one-line-per-operation summary of a plan.
pub fn summary(ops: &[ChangeOp]) -> String {
    ops.iter()
        .map(|op| op.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
