//! Declarative network state reconciliation.
//!
//! This crate drives a host's network configuration toward a declared
//! state. Callers describe what they want (interfaces, bonds, IP
//! configuration, routes) in a partial document; the reconciler collects
//! the live state, computes the difference over the asserted attributes
//! only, orders the changes so dependencies resolve, applies them through
//! a backend, and verifies the result converged.
//!
//! # Features
//!
//! - `lab` - In-memory fake backend for integration testing
//! - `full` - All features enabled
//!
//! # Example
//!
//! ```ignore
//! use netstate::{NetworkState, Reconciler};
//!
//! #[tokio::main]
//! async fn main() -> netstate::Result<()> {
//!     let desired: NetworkState = serde_yaml::from_str(
//!         r"
//!         interfaces:
//!         - name: bond99
//!           type: bond
//!           state: up
//!           bond:
//!             mode: balance-rr
//!             port:
//!             - dummy1
//!             - dummy2
//!         ",
//!     )?;
//!
//!     let reconciler = Reconciler::new(backend);
//!     reconciler.reconcile(&desired).await?;
//!     Ok(())
//! }
//! ```
//!
//! Reconciling the same document twice is a no-op: the second call
//! observes a converged state and touches nothing.

pub mod apply;
pub mod backend;
pub mod collect;
pub mod diff;
pub mod error;
pub mod merge;
pub mod plan;
pub mod reconcile;
pub mod state;
pub mod verify;

#[cfg(any(test, feature = "lab"))]
pub mod fake;

// Re-export common types at crate root for convenience
pub use backend::{Clock, NetworkBackend, TokioClock};
pub use error::{Error, Result};
pub use reconcile::{ReconcileReport, Reconciler};
pub use state::{Interface, InterfaceState, InterfaceType, NetworkState, Route};
