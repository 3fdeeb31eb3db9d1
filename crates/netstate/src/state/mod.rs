//! Network state documents.
//!
//! [`NetworkState`] is both the desired-state document callers submit and
//! the snapshot the collector produces. Every attribute below the interface
//! name is optional: an absent field in a desired document means "leave the
//! current value alone", which is what makes partial specification a
//! compile-time-checkable shape rather than a dictionary convention.

mod iface;
mod ip;
mod route;

pub use iface::{BondConfig, BondMode, Interface, InterfaceState, InterfaceType};
pub use ip::{IpAddress, IpConfig};
pub use route::{Cidr, CidrParseError, Route};

use serde::{Deserialize, Serialize};

/// A network state document: interfaces plus system routes.
///
/// Interface order is significant and preserved (it is the tie-breaker for
/// plan ordering). Routes carry no ordering guarantee and are compared as a
/// set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    /// Interfaces, unique by name, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,

    /// Configured routes. `None` in a desired document means routes are not
    /// asserted at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
}

impl NetworkState {
    /// Create an empty state document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an interface by name.
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Add an interface, replacing any previous entry with the same name.
    pub fn push_interface(&mut self, iface: Interface) {
        if let Some(existing) = self.interfaces.iter_mut().find(|i| i.name == iface.name) {
            *existing = iface;
        } else {
            self.interfaces.push(iface);
        }
    }

    /// Routes whose next-hop interface is `name`.
    pub fn routes_via(&self, name: &str) -> Vec<&Route> {
        self.routes
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|r| r.next_hop_interface.as_deref() == Some(name))
            .collect()
    }

    /// Parse a JSON state document.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty-printed JSON, for machine consumers of query
    /// output.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
