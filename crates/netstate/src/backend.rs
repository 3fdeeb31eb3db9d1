//! The daemon contract.
//!
//! The reconciler never talks to the kernel or the network-management
//! daemon directly; it drives an injected [`NetworkBackend`] capability.
//! Production code wires in a real daemon client, tests substitute the
//! fake in `crate::fake` (feature `lab`).

use std::time::Duration;

use crate::diff::AttrChanges;
use crate::error::Result;
use crate::state::{Interface, Route};

/// Query and mutation primitives the underlying daemon must expose.
///
/// All mutations are idempotent from the daemon's perspective: setting an
/// attribute to its current value must succeed. Mutating an interface the
/// daemon does not own must fail with [`crate::Error::UnmanagedTarget`];
/// the applier is responsible for toggling the managed flag first.
#[allow(async_fn_in_trait)]
pub trait NetworkBackend {
    /// Every interface currently visible, regardless of managed flag.
    /// The managed flag must be reported accurately on each entry.
    async fn query_interfaces(&self) -> Result<Vec<Interface>>;

    /// Every configured route.
    async fn query_routes(&self) -> Result<Vec<Route>>;

    /// Toggle whether this control plane owns the interface.
    async fn set_managed(&self, name: &str, managed: bool) -> Result<()>;

    /// Create an interface from a full merged description. The new
    /// interface starts owned and deactivated.
    async fn create_interface(&self, iface: &Interface) -> Result<()>;

    /// Mutate the given attribute set on an existing interface.
    async fn update_interface(&self, name: &str, changes: &AttrChanges) -> Result<()>;

    /// Activate an interface.
    async fn activate(&self, name: &str) -> Result<()>;

    /// Deactivate an interface, keeping its configuration.
    async fn deactivate(&self, name: &str) -> Result<()>;

    /// Remove an interface entirely.
    async fn delete_interface(&self, name: &str) -> Result<()>;

    /// Install a route.
    async fn add_route(&self, route: &Route) -> Result<()>;

    /// Remove a route.
    async fn del_route(&self, route: &Route) -> Result<()>;
}

/// Sleep capability for the verifier's retry loop.
///
/// Injected so tests run the bounded backoff without real delays.
#[allow(async_fn_in_trait)]
pub trait Clock {
    /// Sleep for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
