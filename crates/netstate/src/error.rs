//! Error types for reconcile operations.

/// Result type for reconcile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconciling network state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The daemon/kernel query channel is unreachable. Fatal for the whole
    /// reconcile call; a partial snapshot is never trusted.
    #[error("state collection failed: {0}")]
    Collection(String),

    /// The desired state names a dependency that does not exist in either
    /// the desired or the current state. Surfaced before any mutation.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// A mutation was attempted on an interface the control plane does not
    /// own yet. A correct plan never produces this; seeing it means the
    /// planner skipped the ownership handoff.
    #[error("interface not managed: {name}")]
    UnmanagedTarget {
        /// The interface that rejected the mutation.
        name: String,
    },

    /// A single-entity mutation was rejected by the daemon.
    #[error("{operation} failed on {entity}: {reason}")]
    ApplyOperation {
        /// The operation that failed (e.g. "activate", "add route").
        operation: String,
        /// The entity it targeted.
        entity: String,
        /// Daemon-side failure reason.
        reason: String,
    },

    /// One or more plan operations failed; the result carries the complete
    /// per-operation picture.
    #[error("apply completed with {} failed operation(s)", .report.error_count())]
    Apply {
        /// Per-operation outcomes, including failures and skips.
        report: crate::apply::AppliedResult,
        /// What the operations that did land still left unsettled,
        /// from a fresh read of the daemon after the partial apply.
        unconverged: crate::verify::VerificationReport,
    },

    /// An asserted attribute did not match the live state after apply.
    #[error("verification failed: {0}")]
    Verification(crate::verify::VerificationReport),

    /// Verification retries were exhausted without convergence.
    #[error("no convergence after {attempts} attempt(s): {last}")]
    ConvergenceTimeout {
        /// Number of collection attempts made.
        attempts: u32,
        /// Mismatches still present on the last attempt.
        last: crate::verify::VerificationReport,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this is a collection failure (daemon/kernel unreachable).
    pub fn is_collection_failure(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    /// Check if this is a desired-state validation failure. These surface
    /// before any live mutation has been attempted.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidReference(_))
    }

    /// Check if this is a post-apply verification failure.
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::Verification(_) | Self::ConvergenceTimeout { .. })
    }

    /// Check if this is an ownership-sequencing bug.
    pub fn is_unmanaged_target(&self) -> bool {
        matches!(self, Self::UnmanagedTarget { .. })
    }
}
