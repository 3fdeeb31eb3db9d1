//! In-memory backend for exercising the reconciler without touching a
//! kernel.
//!
//! [`FakeDaemon`] keeps interfaces and routes in a mutex-guarded table
//! and records every mutation in a journal, so tests can assert not just
//! the final state but the order operations ran in. Failure injection
//! covers the situations the reconciler must survive: individual
//! operations failing, the whole backend being unreachable, and queries
//! that lag behind mutations the way a real daemon's caches do.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::backend::NetworkBackend;
use crate::diff::AttrChanges;
use crate::error::{Error, Result};
use crate::state::{Interface, InterfaceState, Route};

#[derive(Debug)]
struct StaleView {
    interfaces: Vec<Interface>,
    routes: Vec<Route>,
    reads_left: u32,
}

#[derive(Debug, Default)]
struct Inner {
    interfaces: Vec<Interface>,
    routes: Vec<Route>,
    journal: Vec<String>,
    fail_prefixes: HashSet<String>,
    unreachable: bool,
    stale: Option<StaleView>,
}

impl Inner {
    fn find(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut Interface> {
        self.interfaces
            .iter_mut()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::ApplyOperation {
                operation: "lookup".into(),
                entity: name.into(),
                reason: "no such interface".into(),
            })
    }

    /// Journal the entry, or fail the call if a test armed a matching
    /// failure. Failed calls are journaled too, marked with a `!`.
    fn record(&mut self, entry: String) -> Result<()> {
        let armed = self.fail_prefixes.iter().any(|p| entry.starts_with(p.as_str()));
        if armed {
            self.journal.push(format!("! {}", entry));
            let (operation, entity) = entry.split_once(' ').unwrap_or((entry.as_str(), ""));
            return Err(Error::ApplyOperation {
                operation: operation.into(),
                entity: entity.into(),
                reason: "injected failure".into(),
            });
        }
        self.journal.push(entry);
        Ok(())
    }

    /// Mutations on an interface someone else owns must never reach the
    /// backend; the caller is expected to take ownership first.
    fn check_owned(&self, name: &str) -> Result<()> {
        if self.find(name).is_some_and(|i| i.managed == Some(false)) {
            return Err(Error::UnmanagedTarget { name: name.into() });
        }
        Ok(())
    }
}

/// An in-memory network daemon.
#[derive(Debug, Default)]
pub struct FakeDaemon {
    inner: Mutex<Inner>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an interface as pre-existing live state.
    pub fn seed_interface(&self, iface: Interface) {
        self.inner.lock().unwrap().interfaces.push(iface);
    }

    /// Install a route as pre-existing live state.
    pub fn seed_route(&self, route: Route) {
        self.inner.lock().unwrap().routes.push(route);
    }

    /// The mutations applied so far, in order. Entries look like
    /// `"deactivate bond99"`; failed calls carry a `! ` prefix.
    pub fn journal(&self) -> Vec<String> {
        self.inner.lock().unwrap().journal.clone()
    }

    /// Arm a failure: any mutation whose journal entry starts with
    /// `prefix` (for example `"create bond99"` or just `"create"`) fails.
    pub fn fail_op(&self, prefix: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_prefixes
            .insert(prefix.to_string());
    }

    /// Make every query fail, as if the daemon were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().unwrap().unreachable = unreachable;
    }

    /// Freeze the observable state: the next `reads` full queries return
    /// the state as it is now, however much the backend mutates in
    /// between. Mimics a daemon whose cache lags its own changes.
    pub fn delay_observation(&self, reads: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.stale = Some(StaleView {
            interfaces: inner.interfaces.clone(),
            routes: inner.routes.clone(),
            reads_left: reads,
        });
    }

    /// The live interface table, for end-of-test assertions.
    pub fn interfaces(&self) -> Vec<Interface> {
        self.inner.lock().unwrap().interfaces.clone()
    }

    /// The live route table, for end-of-test assertions.
    pub fn routes(&self) -> Vec<Route> {
        self.inner.lock().unwrap().routes.clone()
    }
}

impl NetworkBackend for FakeDaemon {
    async fn query_interfaces(&self) -> Result<Vec<Interface>> {
        let inner = self.inner.lock().unwrap();
        if inner.unreachable {
            return Err(Error::Collection("daemon unreachable".into()));
        }
        match &inner.stale {
            Some(view) => Ok(view.interfaces.clone()),
            None => Ok(inner.interfaces.clone()),
        }
    }

    async fn query_routes(&self) -> Result<Vec<Route>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.unreachable {
            return Err(Error::Collection("daemon unreachable".into()));
        }
        // A full query reads interfaces then routes, so the stale view
        // expires here.
        if let Some(view) = &mut inner.stale {
            let routes = view.routes.clone();
            view.reads_left = view.reads_left.saturating_sub(1);
            if view.reads_left == 0 {
                inner.stale = None;
            }
            return Ok(routes);
        }
        Ok(inner.routes.clone())
    }

    async fn set_managed(&self, name: &str, managed: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.record(format!("manage {}", name))?;
        inner.find_mut(name)?.managed = Some(managed);
        Ok(())
    }

    async fn create_interface(&self, iface: &Interface) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.record(format!("create {}", iface.name))?;
        // Creation leaves the interface down; activation is a separate
        // call.
        inner.interfaces.push(Interface {
            state: Some(InterfaceState::Down),
            managed: Some(true),
            ..iface.clone()
        });
        Ok(())
    }

    async fn update_interface(&self, name: &str, changes: &AttrChanges) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_owned(name)?;
        inner.record(format!("update {}", name))?;
        let iface = inner.find_mut(name)?;
        if let Some(mtu) = changes.mtu {
            iface.mtu = Some(mtu);
        }
        if let Some(controller) = &changes.controller {
            iface.controller = controller.clone();
        }
        if let Some(ipv4) = &changes.ipv4 {
            iface.ipv4 = Some(ipv4.clone());
        }
        if let Some(ipv6) = &changes.ipv6 {
            iface.ipv6 = Some(ipv6.clone());
        }
        if let Some(bond) = &changes.bond {
            iface.bond = Some(bond.clone());
        }
        Ok(())
    }

    async fn activate(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_owned(name)?;
        inner.record(format!("activate {}", name))?;
        inner.find_mut(name)?.state = Some(InterfaceState::Up);
        Ok(())
    }

    async fn deactivate(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_owned(name)?;
        inner.record(format!("deactivate {}", name))?;
        inner.find_mut(name)?.state = Some(InterfaceState::Down);
        Ok(())
    }

    async fn delete_interface(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_owned(name)?;
        inner.record(format!("delete {}", name))?;
        inner.interfaces.retain(|i| i.name != name);
        Ok(())
    }

    async fn add_route(&self, route: &Route) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.record(format!("route-add {}", route))?;
        inner.routes.push(route.clone());
        Ok(())
    }

    async fn del_route(&self, route: &Route) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.record(format!("route-del {}", route))?;
        inner.routes.retain(|r| r != route);
        Ok(())
    }
}
