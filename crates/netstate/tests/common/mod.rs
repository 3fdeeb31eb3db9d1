//! Common test utilities for integration tests.
//!
//! Provides a lab reconciler wired to the in-memory daemon and a manual
//! clock, plus YAML helpers for building states.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use netstate::fake::FakeDaemon;
use netstate::{Clock, NetworkState, Reconciler};

/// A clock that records requested delays and returns immediately, so
/// verification retries run at full speed.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    /// How many times the reconciler asked to wait.
    pub fn sleeps(&self) -> usize {
        self.slept.lock().unwrap().len()
    }
}

impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// A reconciler over a fresh in-memory daemon, with a handle to the
/// clock for retry assertions.
pub fn lab() -> (Reconciler<FakeDaemon, ManualClock>, ManualClock) {
    let clock = ManualClock::default();
    (
        Reconciler::with_clock(FakeDaemon::new(), clock.clone()),
        clock,
    )
}

/// Parse a YAML state document.
pub fn doc(yaml: &str) -> NetworkState {
    serde_yaml::from_str(yaml).expect("invalid test document")
}

/// Load a YAML document into the daemon as pre-existing live state.
pub fn seed(daemon: &FakeDaemon, yaml: &str) {
    let state = doc(yaml);
    for iface in state.interfaces {
        daemon.seed_interface(iface);
    }
    for route in state.routes.unwrap_or_default() {
        daemon.seed_route(route);
    }
}

/// Position of the first journal entry starting with `prefix`.
pub fn journal_pos(journal: &[String], prefix: &str) -> usize {
    journal
        .iter()
        .position(|e| e.starts_with(prefix))
        .unwrap_or_else(|| panic!("no journal entry starting with {:?} in {:?}", prefix, journal))
}
