//! Post-apply verification.
//!
//! Re-collects the live state and re-runs the diff against the original
//! desired document. Convergence means the diff comes back empty; every
//! leftover operation is reported as a mismatch naming the entity and
//! attribute that still differ. Verification only ever looks at asserted
//! attributes, the same partial-document rule the diff follows, so an
//! attribute the caller never mentioned can never fail verification.
//!
//! Daemons apply asynchronously and their query side can lag their own
//! mutations, so verification retries with a bounded delay. The delay
//! goes through [`Clock`] and tests drive it without waiting.

use std::time::Duration;

use tracing::{debug, trace};

use crate::backend::{Clock, NetworkBackend};
use crate::collect::collect;
use crate::diff::{ChangeOp, compute_diff};
use crate::error::{Error, Result};
use crate::merge::MergedState;
use crate::state::NetworkState;

/// One attribute of one entity that has not converged.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// Interface name or route description.
    pub entity: String,
    /// The attribute that differs, e.g. `mtu` or `existence`.
    pub attribute: String,
}

/// Everything still out of line on one verification attempt.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    /// The remaining mismatches.
    pub mismatches: Vec<Mismatch>,
}

impl VerificationReport {
    /// Check if the live state converged.
    pub fn is_converged(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Fold a leftover diff into mismatch entries.
    fn from_ops(ops: &[ChangeOp]) -> Self {
        let mut mismatches = Vec::new();
        for op in ops {
            match op {
                ChangeOp::CreateIface { after, .. } => mismatches.push(Mismatch {
                    entity: after.name.clone(),
                    attribute: "existence".into(),
                }),
                ChangeOp::DeleteIface { name, .. } => mismatches.push(Mismatch {
                    entity: name.clone(),
                    attribute: "existence".into(),
                }),
                ChangeOp::ActivateIface { name, .. } | ChangeOp::DeactivateIface { name, .. } => {
                    mismatches.push(Mismatch {
                        entity: name.clone(),
                        attribute: "state".into(),
                    })
                }
                ChangeOp::UpdateIface { name, changes, .. } => {
                    for attr in changes.changed_attrs() {
                        mismatches.push(Mismatch {
                            entity: name.clone(),
                            attribute: attr.into(),
                        });
                    }
                }
                ChangeOp::AddRoute { route } | ChangeOp::DelRoute { route } => {
                    mismatches.push(Mismatch {
                        entity: route.to_string(),
                        attribute: "route".into(),
                    })
                }
            }
        }
        Self { mismatches }
    }
}

impl std::fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .mismatches
            .iter()
            .map(|m| format!("{}/{}", m.entity, m.attribute))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Verification retry policy.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Collection attempts before giving up.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(400),
        }
    }
}

/// Collect once and check the desired document against it.
pub async fn verify_once<B: NetworkBackend>(backend: &B, desired: &NetworkState) -> Result<()> {
    let report = check(backend, desired).await?;
    if report.is_converged() {
        Ok(())
    } else {
        Err(Error::Verification(report))
    }
}

/// Check the desired document against the live state, retrying until it
/// converges or the attempt budget runs out.
pub async fn verify<B: NetworkBackend, C: Clock>(
    backend: &B,
    clock: &C,
    desired: &NetworkState,
    opts: &VerifyOptions,
) -> Result<()> {
    let attempts = opts.max_attempts.max(1);
    let mut last = VerificationReport::default();
    for attempt in 1..=attempts {
        let report = check(backend, desired).await?;
        if report.is_converged() {
            debug!(attempt, "state converged");
            return Ok(());
        }
        trace!(attempt, mismatches = %report, "not converged yet");
        last = report;
        if attempt < attempts {
            clock.sleep(opts.delay).await;
        }
    }
    Err(Error::ConvergenceTimeout { attempts, last })
}

pub(crate) async fn check<B: NetworkBackend>(
    backend: &B,
    desired: &NetworkState,
) -> Result<VerificationReport> {
    let current = collect(backend).await?;
    let merged = MergedState::new(desired.clone(), current)?;
    Ok(VerificationReport::from_ops(&compute_diff(&merged)))
}
