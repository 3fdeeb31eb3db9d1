//! The reconcile entry point.
//!
//! Ties the pipeline together: collect the live state, merge the desired
//! document onto it, diff, order, apply, verify. Validation failures
//! surface before any mutation; apply failures carry the complete
//! per-operation record; an already-converged document is a no-op and
//! touches nothing.

use tracing::{debug, info};

use crate::apply::{AppliedResult, apply};
use crate::backend::{Clock, NetworkBackend, TokioClock};
use crate::collect::collect;
use crate::diff::compute_diff;
use crate::error::{Error, Result};
use crate::merge::MergedState;
use crate::plan::{plan, summary};
use crate::state::NetworkState;
use crate::verify::{VerifyOptions, check, verify};

/// The record of one successful reconcile call.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Per-operation outcomes. Empty when nothing needed changing.
    pub applied: AppliedResult,
    /// Whether any mutation was attempted.
    pub changed: bool,
}

/// Drives a network backend toward declaratively described states.
#[derive(Debug)]
pub struct Reconciler<B, C = TokioClock> {
    backend: B,
    clock: C,
    verify_opts: VerifyOptions,
}

impl<B: NetworkBackend> Reconciler<B> {
    /// Create a reconciler over `backend` with the default retry policy.
    pub fn new(backend: B) -> Self {
        Self::with_clock(backend, TokioClock)
    }
}

impl<B: NetworkBackend, C: Clock> Reconciler<B, C> {
    /// Create a reconciler with an explicit clock. Tests use this to
    /// drive verification retries without real delays.
    pub fn with_clock(backend: B, clock: C) -> Self {
        Self {
            backend,
            clock,
            verify_opts: VerifyOptions::default(),
        }
    }

    /// Override the verification retry policy.
    pub fn verify_options(mut self, opts: VerifyOptions) -> Self {
        self.verify_opts = opts;
        self
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Snapshot the live network state.
    pub async fn query(&self) -> Result<NetworkState> {
        collect(&self.backend).await
    }

    /// Drive the live state to match `desired`.
    ///
    /// Only the attributes the document asserts are compared or touched.
    /// Returns once the backend reports the asserted state, or with:
    ///
    /// * [`Error::Collection`] when the backend cannot be queried,
    /// * [`Error::InvalidReference`] when the document fails validation,
    ///   before any mutation has been attempted,
    /// * [`Error::Apply`] when operations failed, with the full record
    ///   and a read-back of what the partial apply left unsettled,
    /// * [`Error::ConvergenceTimeout`] when the backend accepted every
    ///   operation but never reported the asserted state.
    pub async fn reconcile(&self, desired: &NetworkState) -> Result<ReconcileReport> {
        let current = collect(&self.backend).await?;
        let merged = MergedState::new(desired.clone(), current)?;
        let ops = plan(compute_diff(&merged));

        if ops.is_empty() {
            info!("state already converged, nothing to apply");
            return Ok(ReconcileReport::default());
        }

        debug!(ops = ops.len(), "plan:\n{}", summary(&ops));
        let applied = apply(&self.backend, &merged, &ops).await;
        if applied.error_count() > 0 {
            // The operations that did land still count; report what the
            // daemon looks like after them alongside the failures.
            let unconverged = check(&self.backend, desired).await.unwrap_or_default();
            return Err(Error::Apply {
                report: applied,
                unconverged,
            });
        }

        verify(&self.backend, &self.clock, desired, &self.verify_opts).await?;
        info!(ops = applied.outcomes.len(), "reconciled");
        Ok(ReconcileReport {
            applied,
            changed: true,
        })
    }
}
