//! Desired-state normalization.
//!
//! [`MergedState`] expands a partial desired document against the current
//! snapshot: unset attributes are carried forward, list attributes are
//! replaced wholesale when their key is present, bond ports named only in
//! a port list are pulled in with just their membership, and referential
//! integrity (port ownership, controller chains, route next-hops) is
//! validated before anything touches the live system.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::state::{Interface, InterfaceState, IpConfig, NetworkState, Route};

/// Controller chains deeper than this are rejected.
const MAX_CONTROLLER_DEPTH: u32 = 4;

/// One interface with its desired, current, and merged views.
#[derive(Debug, Clone)]
pub struct MergedInterface {
    /// The asserted attributes, exactly as declared (or synthesized for an
    /// auto-included port: membership only).
    pub desired: Option<Interface>,
    /// The collected view, when the interface exists.
    pub current: Option<Interface>,
    /// The merged description to apply. `None` for interfaces the caller
    /// did not touch.
    pub for_apply: Option<Interface>,
    /// Depth in the controller chain: a port sits one below its bond.
    /// The planner activates deeper entries first.
    pub up_priority: u32,
    /// Whether this entry exists only because a bond port list named it.
    pub auto_included: bool,
}

impl MergedInterface {
    /// The interface name.
    pub fn name(&self) -> &str {
        self.desired
            .as_ref()
            .or(self.current.as_ref())
            .map(|i| i.name.as_str())
            .unwrap_or_default()
    }

    /// Whether the caller declared (or implied) this interface.
    pub fn is_desired(&self) -> bool {
        self.desired.is_some()
    }

    /// The controller this entry will belong to after apply, if any.
    fn effective_controller(&self) -> Option<&str> {
        let iface = self.for_apply.as_ref().or(self.current.as_ref())?;
        match iface.controller.as_deref() {
            Some("") | None => None,
            Some(c) => Some(c),
        }
    }
}

/// Normalized desired state: the diff engine's sole input.
#[derive(Debug)]
pub struct MergedState {
    interfaces: Vec<MergedInterface>,
    index: HashMap<String, usize>,
    /// Desired routes, `None` when the document does not assert routes.
    pub desired_routes: Option<Vec<Route>>,
    /// Routes currently installed.
    pub current_routes: Vec<Route>,
}

impl MergedState {
    /// Merge and validate `desired` against `current`.
    ///
    /// Fails with [`Error::InvalidReference`] on dangling bond ports,
    /// ports claimed by two controllers, controller chains deeper than
    /// [`MAX_CONTROLLER_DEPTH`], or routes through interfaces that will
    /// not exist after apply. No mutation happens before this passes.
    pub fn new(desired: NetworkState, current: NetworkState) -> Result<Self> {
        let current_by_name: HashMap<String, Interface> = current
            .interfaces
            .iter()
            .map(|i| (i.name.clone(), i.clone()))
            .collect();

        let mut merged = Self {
            interfaces: Vec::new(),
            index: HashMap::new(),
            desired_routes: desired.routes.clone(),
            current_routes: current.routes.clone().unwrap_or_default(),
        };

        for iface in &desired.interfaces {
            if merged.index.contains_key(&iface.name) {
                return Err(Error::InvalidReference(format!(
                    "interface {} declared twice",
                    iface.name
                )));
            }
            let cur = current_by_name.get(&iface.name);
            merged.push(MergedInterface {
                for_apply: Some(merge_interface(iface, cur)),
                desired: Some(iface.clone()),
                current: cur.cloned(),
                up_priority: 0,
                auto_included: false,
            });
        }

        // Interfaces the caller did not touch still matter for controller
        // resolution, route validation, and verification.
        for iface in &current.interfaces {
            if !merged.index.contains_key(&iface.name) {
                merged.push(MergedInterface {
                    desired: None,
                    current: Some(iface.clone()),
                    for_apply: None,
                    up_priority: 0,
                    auto_included: false,
                });
            }
        }

        merged.validate_port_claims()?;
        merged.include_implicit_ports()?;
        merged.resolve_up_priorities()?;
        merged.validate_routes()?;

        Ok(merged)
    }

    /// All merged entries: desired declaration order first, auto-included
    /// ports next, untouched current-only interfaces last.
    pub fn interfaces(&self) -> &[MergedInterface] {
        &self.interfaces
    }

    /// Look up a merged entry by name.
    pub fn get(&self, name: &str) -> Option<&MergedInterface> {
        self.index.get(name).map(|&i| &self.interfaces[i])
    }

    fn push(&mut self, entry: MergedInterface) {
        self.index.insert(entry.name().to_string(), self.interfaces.len());
        self.interfaces.push(entry);
    }

    /// Each port may be claimed by at most one controller, counting both
    /// bond port lists and explicit `controller` properties.
    fn validate_port_claims(&self) -> Result<()> {
        let mut claims: HashMap<&str, &str> = HashMap::new();

        for entry in &self.interfaces {
            let Some(desired) = &entry.desired else {
                continue;
            };
            if desired.is_absent() {
                continue;
            }
            if let Some(ports) = desired.ports() {
                for port in ports {
                    if let Some(other) = claims.insert(port, &desired.name)
                        && other != desired.name
                    {
                        return Err(Error::InvalidReference(format!(
                            "port {} claimed by both {} and {}",
                            port, other, desired.name
                        )));
                    }
                }
            }
        }

        for entry in &self.interfaces {
            let Some(desired) = &entry.desired else {
                continue;
            };
            let Some(controller) = desired.controller.as_deref() else {
                continue;
            };
            match claims.get(desired.name.as_str()) {
                // Detaching while some controller still lists the port.
                Some(claimant) if controller.is_empty() => {
                    return Err(Error::InvalidReference(format!(
                        "{} detaches from its controller but {} lists it as a port",
                        desired.name, claimant
                    )));
                }
                Some(claimant) if *claimant != controller => {
                    return Err(Error::InvalidReference(format!(
                        "{} declares controller {} but {} lists it as a port",
                        desired.name, controller, claimant
                    )));
                }
                _ => {}
            }
            if controller.is_empty() {
                continue;
            }
            // The controller itself must exist, and when it asserts a port
            // list, that list must include this interface.
            let Some(ctrl) = self.get(controller) else {
                return Err(Error::InvalidReference(format!(
                    "{} declares unknown controller {}",
                    desired.name, controller
                )));
            };
            if let Some(ctrl_desired) = &ctrl.desired
                && let Some(ports) = ctrl_desired.ports()
                && !ports.iter().any(|p| p == &desired.name)
            {
                return Err(Error::InvalidReference(format!(
                    "{} declares controller {} whose port list does not include it",
                    desired.name, controller
                )));
            }
        }

        Ok(())
    }

    /// Pull in ports named only in a bond's port list. They get membership
    /// and ownership, nothing else: their own admin state and IP config
    /// are left exactly as collected.
    fn include_implicit_ports(&mut self) -> Result<()> {
        let claims = self.port_claims();

        for (port, bond) in &claims {
            let Some(&idx) = self.index.get(port) else {
                return Err(Error::InvalidReference(format!(
                    "bond {} names port {} which exists in neither desired nor current state",
                    bond, port
                )));
            };
            let entry = &mut self.interfaces[idx];
            if entry.is_desired() {
                // Declared separately: it still inherits its membership.
                if let Some(for_apply) = &mut entry.for_apply
                    && for_apply.controller.is_none()
                {
                    for_apply.controller = Some(bond.clone());
                }
                continue;
            }
            let cur = entry.current.clone();
            let synthesized = Interface {
                name: port.clone(),
                controller: Some(bond.clone()),
                ..Default::default()
            };
            entry.for_apply = Some(merge_interface(&synthesized, cur.as_ref()));
            entry.desired = Some(synthesized);
            entry.auto_included = true;
        }

        Ok(())
    }

    fn port_claims(&self) -> HashMap<String, String> {
        let mut claims = HashMap::new();
        for entry in &self.interfaces {
            if let Some(desired) = &entry.desired
                && !desired.is_absent()
                && let Some(ports) = desired.ports()
            {
                for port in ports {
                    claims.insert(port.clone(), desired.name.clone());
                }
            }
        }
        claims
    }

    /// Assign controller-chain depths. A bond sits above its ports; chains
    /// deeper than [`MAX_CONTROLLER_DEPTH`] or containing a loop are
    /// rejected.
    fn resolve_up_priorities(&mut self) -> Result<()> {
        let mut depths: HashMap<String, u32> = HashMap::new();

        for entry in &self.interfaces {
            let name = entry.name().to_string();
            let mut depth = 0u32;
            let mut cursor = entry.effective_controller().map(str::to_string);
            while let Some(ctrl_name) = cursor {
                depth += 1;
                if depth > MAX_CONTROLLER_DEPTH {
                    return Err(Error::InvalidReference(format!(
                        "controller chain above {} exceeds depth {}",
                        name, MAX_CONTROLLER_DEPTH
                    )));
                }
                cursor = self
                    .get(&ctrl_name)
                    .and_then(|c| c.effective_controller())
                    .map(str::to_string);
            }
            depths.insert(name, depth);
        }

        for entry in &mut self.interfaces {
            entry.up_priority = depths.get(entry.name()).copied().unwrap_or(0);
        }
        Ok(())
    }

    /// A route's next-hop interface must exist after this apply.
    fn validate_routes(&self) -> Result<()> {
        let Some(routes) = &self.desired_routes else {
            return Ok(());
        };
        for route in routes {
            let Some(dev) = route.next_hop_interface.as_deref() else {
                continue;
            };
            let entry = self.get(dev).ok_or_else(|| {
                Error::InvalidReference(format!(
                    "route {} references unknown interface {}",
                    route, dev
                ))
            })?;
            let removed = entry
                .for_apply
                .as_ref()
                .map(|i| i.is_absent())
                .unwrap_or(false);
            if removed {
                return Err(Error::InvalidReference(format!(
                    "route {} references interface {} which is marked absent",
                    route, dev
                )));
            }
        }
        Ok(())
    }
}

/// Merge one declared interface onto its current view.
///
/// Scalars merge by presence; the per-family address lists and the bond
/// port list replace wholesale when their key is present. An absent
/// interface keeps only identity, there is nothing to merge into a
/// removal.
fn merge_interface(desired: &Interface, current: Option<&Interface>) -> Interface {
    if desired.is_absent() {
        return Interface {
            name: desired.name.clone(),
            iface_type: desired
                .iface_type
                .or(current.and_then(|c| c.iface_type)),
            state: Some(InterfaceState::Absent),
            ..Default::default()
        };
    }

    let cur = current.cloned().unwrap_or_default();
    let state = match desired.state {
        Some(state) => Some(state),
        // Declaring a new interface implies bringing it up; an existing
        // one keeps its current admin state.
        None if current.is_none() => Some(InterfaceState::Up),
        None => cur.state,
    };

    Interface {
        name: desired.name.clone(),
        iface_type: desired.iface_type.or(cur.iface_type),
        state,
        // Declared means owned.
        managed: Some(true),
        mtu: desired.mtu.or(cur.mtu),
        controller: desired.controller.clone().or(cur.controller),
        ipv4: merge_ip(desired.ipv4.as_ref(), cur.ipv4.as_ref()),
        ipv6: merge_ip(desired.ipv6.as_ref(), cur.ipv6.as_ref()),
        bond: match (&desired.bond, &cur.bond) {
            (Some(d), Some(c)) => Some(crate::state::BondConfig {
                mode: d.mode.or(c.mode),
                ports: d.ports.clone().or_else(|| c.ports.clone()),
            }),
            (Some(d), None) => Some(d.clone()),
            (None, c) => c.clone(),
        },
    }
}

fn merge_ip(desired: Option<&IpConfig>, current: Option<&IpConfig>) -> Option<IpConfig> {
    match (desired, current) {
        (Some(d), Some(c)) => Some(d.merged_onto(c)),
        (Some(d), None) => Some(d.clone()),
        (None, c) => c.cloned(),
    }
}
