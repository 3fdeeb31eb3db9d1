//! Plan execution.
//!
//! Runs an ordered plan against a backend. A failed operation never
//! aborts the run: every operation is attempted and its outcome
//! recorded, so one bad interface cannot block unrelated changes.
//! The only exception is causality: an operation that depends on an
//! interface whose creation failed is skipped rather than attempted
//! against something that does not exist.
//!
//! Ownership is sequenced here: before the first mutation of an
//! interface the backend reports as unmanaged, the applier takes it over
//! with `set_managed`. A backend that still reports an unmanaged target
//! after that indicates a planning bug and surfaces as
//! [`crate::Error::UnmanagedTarget`].

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::backend::NetworkBackend;
use crate::diff::ChangeOp;
use crate::error::Result;
use crate::merge::MergedState;

/// Per-interface lifecycle stage during one apply pass.
///
/// Every mutation advances the stage; `take_ownership` is legal only out
/// of [`OwnershipStage::Unmanaged`], which is what keeps the handoff a
/// single explicit transition instead of a scattering of flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipStage {
    /// Exists but another control plane owns it.
    Unmanaged,
    /// Owned, no mutation issued yet in this pass.
    Managed,
    /// Owned and mutated in this pass.
    Configured,
    /// Deleted in this pass.
    Absent,
}

impl OwnershipStage {
    /// The stage after `op` succeeds on this interface.
    fn advance(self, op: &ChangeOp) -> Self {
        match op {
            ChangeOp::CreateIface { .. } => Self::Managed,
            ChangeOp::DeleteIface { .. } => Self::Absent,
            ChangeOp::UpdateIface { .. }
            | ChangeOp::ActivateIface { .. }
            | ChangeOp::DeactivateIface { .. } => Self::Configured,
            ChangeOp::AddRoute { .. } | ChangeOp::DelRoute { .. } => self,
        }
    }
}

/// What happened to one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpStatus {
    /// The backend accepted the operation.
    Applied,
    /// Not attempted; a prerequisite failed.
    Skipped {
        /// The failure this operation was waiting on.
        cause: String,
    },
    /// The backend rejected the operation.
    Failed {
        /// The backend's error.
        error: String,
    },
}

/// One operation's outcome.
#[derive(Debug, Clone)]
pub struct OpOutcome {
    /// Human-readable description of the operation.
    pub description: String,
    /// What happened to it.
    pub status: OpStatus,
}

/// The aggregated record of one apply pass.
#[derive(Debug, Clone, Default)]
pub struct AppliedResult {
    /// One entry per planned operation, in execution order.
    pub outcomes: Vec<OpOutcome>,
}

impl AppliedResult {
    /// Count the operations the backend rejected.
    pub fn error_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OpStatus::Failed { .. }))
            .count()
    }

    /// Count the operations skipped over failed prerequisites.
    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OpStatus::Skipped { .. }))
            .count()
    }

    /// Check if every operation was applied.
    pub fn is_clean(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status == OpStatus::Applied)
    }
}

impl std::fmt::Display for AppliedResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for outcome in &self.outcomes {
            match &outcome.status {
                OpStatus::Applied => writeln!(f, "ok      {}", outcome.description)?,
                OpStatus::Skipped { cause } => {
                    writeln!(f, "skipped {} ({})", outcome.description, cause)?
                }
                OpStatus::Failed { error } => {
                    writeln!(f, "failed  {} ({})", outcome.description, error)?
                }
            }
        }
        Ok(())
    }
}

/// Execute an ordered plan. Never fails fast; the returned record holds
/// one outcome per operation.
pub async fn apply<B: NetworkBackend>(
    backend: &B,
    merged: &MergedState,
    ops: &[ChangeOp],
) -> AppliedResult {
    // Lifecycle stage per existing interface. Anything absent from the
    // map does not exist yet; creation inserts it as managed.
    let mut stages: HashMap<String, OwnershipStage> = merged
        .interfaces()
        .iter()
        .filter_map(|e| {
            e.current.as_ref().map(|c| {
                let stage = if c.managed == Some(false) {
                    OwnershipStage::Unmanaged
                } else {
                    OwnershipStage::Managed
                };
                (c.name.clone(), stage)
            })
        })
        .collect();
    let mut failed_creates: HashSet<String> = HashSet::new();
    let mut result = AppliedResult::default();

    for op in ops {
        let description = op.to_string();

        if let Some(blocker) = failed_creates.iter().find(|name| op.references(name.as_str())) {
            debug!(op = %description, blocker = %blocker, "skipping dependent operation");
            result.outcomes.push(OpOutcome {
                description,
                status: OpStatus::Skipped {
                    cause: format!("{} was not created", blocker),
                },
            });
            continue;
        }

        debug!(op = %description, "applying");
        let status = match run_op(backend, op, &mut stages).await {
            Ok(()) => OpStatus::Applied,
            Err(err) => {
                warn!(op = %description, error = %err, "operation failed");
                if let ChangeOp::CreateIface { after, .. } = op {
                    failed_creates.insert(after.name.clone());
                }
                OpStatus::Failed {
                    error: err.to_string(),
                }
            }
        };
        result.outcomes.push(OpOutcome {
            description,
            status,
        });
    }

    result
}

async fn run_op<B: NetworkBackend>(
    backend: &B,
    op: &ChangeOp,
    stages: &mut HashMap<String, OwnershipStage>,
) -> Result<()> {
    match op {
        ChangeOp::CreateIface { after, .. } => backend.create_interface(after).await?,
        ChangeOp::UpdateIface { name, changes, .. } => {
            take_ownership(backend, name, stages).await?;
            backend.update_interface(name, changes).await?;
        }
        ChangeOp::ActivateIface { name, .. } => {
            take_ownership(backend, name, stages).await?;
            backend.activate(name).await?;
        }
        ChangeOp::DeactivateIface { name, .. } => {
            take_ownership(backend, name, stages).await?;
            backend.deactivate(name).await?;
        }
        ChangeOp::DeleteIface { name, .. } => {
            take_ownership(backend, name, stages).await?;
            backend.delete_interface(name).await?;
        }
        ChangeOp::AddRoute { route } => {
            if let Some(name) = &route.next_hop_interface {
                take_ownership(backend, name, stages).await?;
            }
            backend.add_route(route).await?;
        }
        ChangeOp::DelRoute { route } => {
            if let Some(name) = &route.next_hop_interface {
                take_ownership(backend, name, stages).await?;
            }
            backend.del_route(route).await?;
        }
    }
    if let Some(name) = op_target(op) {
        let stage = stages
            .get(name)
            .copied()
            .unwrap_or(OwnershipStage::Managed);
        stages.insert(name.to_string(), stage.advance(op));
    }
    Ok(())
}

/// The interface an operation mutates, if it targets one directly.
fn op_target(op: &ChangeOp) -> Option<&str> {
    match op {
        ChangeOp::CreateIface { after, .. } => Some(&after.name),
        ChangeOp::UpdateIface { name, .. }
        | ChangeOp::ActivateIface { name, .. }
        | ChangeOp::DeactivateIface { name, .. }
        | ChangeOp::DeleteIface { name, .. } => Some(name),
        ChangeOp::AddRoute { .. } | ChangeOp::DelRoute { .. } => None,
    }
}

/// Claim `name` from the backend once, ahead of its first mutation.
async fn take_ownership<B: NetworkBackend>(
    backend: &B,
    name: &str,
    stages: &mut HashMap<String, OwnershipStage>,
) -> Result<()> {
    if stages.get(name) == Some(&OwnershipStage::Unmanaged) {
        debug!(iface = name, "taking ownership");
        backend.set_managed(name, true).await?;
        stages.insert(name.to_string(), OwnershipStage::Managed);
    }
    Ok(())
}
