//! State diffing.
//!
//! Compares the merged desired state against the current snapshot and
//! produces typed change operations. The contract that everything else
//! leans on: an attribute the caller did not assert is never compared, so
//! under-specification can never produce a spurious change. A fully
//! converged pair of states yields an empty operation list.

use crate::merge::MergedState;
use crate::state::{BondConfig, Interface, IpConfig, Route};

/// One typed change against one interface or route.
///
/// Interface operations carry the snapshots the applier and verifier need:
/// `before` for delete/update decisions, `after` for creation.
#[derive(Debug, Clone)]
pub enum ChangeOp {
    /// Create an interface from its merged description.
    CreateIface {
        /// Full merged description of the interface to create.
        after: Interface,
        /// Controller-chain depth, used for plan ordering.
        up_priority: u32,
    },
    /// Mutate an attribute set on an existing interface.
    UpdateIface {
        /// Target interface.
        name: String,
        /// The asserted attributes that differ.
        changes: AttrChanges,
        /// Snapshot before the mutation.
        before: Interface,
        /// Controller-chain depth.
        up_priority: u32,
    },
    /// Activate an interface.
    ActivateIface {
        /// Target interface.
        name: String,
        /// Controller-chain depth.
        up_priority: u32,
    },
    /// Deactivate an interface, keeping its configuration.
    DeactivateIface {
        /// Target interface.
        name: String,
        /// Controller-chain depth.
        up_priority: u32,
    },
    /// Remove an interface.
    DeleteIface {
        /// Target interface.
        name: String,
        /// Snapshot before removal.
        before: Interface,
        /// Controller-chain depth.
        up_priority: u32,
    },
    /// Install a route.
    AddRoute {
        /// The route to install.
        route: Route,
    },
    /// Remove a route.
    DelRoute {
        /// The route to remove.
        route: Route,
    },
}

impl ChangeOp {
    /// The entity this operation targets, for reporting.
    pub fn entity(&self) -> String {
        match self {
            Self::CreateIface { after, .. } => after.name.clone(),
            Self::UpdateIface { name, .. }
            | Self::ActivateIface { name, .. }
            | Self::DeactivateIface { name, .. }
            | Self::DeleteIface { name, .. } => name.clone(),
            Self::AddRoute { route } | Self::DelRoute { route } => route.to_string(),
        }
    }

    /// Whether this operation depends on interface `name` existing.
    pub fn references(&self, name: &str) -> bool {
        match self {
            Self::CreateIface { after, .. } => {
                after.controller.as_deref() == Some(name)
                    || after.ports().is_some_and(|p| p.iter().any(|p| p == name))
            }
            Self::UpdateIface {
                name: target,
                changes,
                ..
            } => {
                target == name
                    || changes.controller.as_ref().is_some_and(|c| c.as_deref() == Some(name))
                    || changes
                        .bond
                        .as_ref()
                        .and_then(|b| b.ports.as_deref())
                        .is_some_and(|p| p.iter().any(|p| p == name))
            }
            Self::ActivateIface { name: target, .. }
            | Self::DeactivateIface { name: target, .. }
            | Self::DeleteIface { name: target, .. } => target == name,
            Self::AddRoute { route } | Self::DelRoute { route } => {
                route.next_hop_interface.as_deref() == Some(name)
            }
        }
    }
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateIface { after, .. } => {
                let kind = after
                    .iface_type
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unknown".into());
                write!(f, "+ iface {} ({})", after.name, kind)
            }
            Self::UpdateIface { name, changes, .. } => {
                write!(f, "~ iface {} ({})", name, changes.summary())
            }
            Self::ActivateIface { name, .. } => write!(f, "^ up {}", name),
            Self::DeactivateIface { name, .. } => write!(f, "v down {}", name),
            Self::DeleteIface { name, .. } => write!(f, "- iface {}", name),
            Self::AddRoute { route } => write!(f, "+ route {}", route),
            Self::DelRoute { route } => write!(f, "- route {}", route),
        }
    }
}

/// The asserted attributes of one interface that differ from the live
/// state. Only populated fields are mutated; this is the payload of
/// [`ChangeOp::UpdateIface`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrChanges {
    /// Take ownership first: managed flag goes false to true.
    pub take_ownership: bool,
    /// New MTU.
    pub mtu: Option<u32>,
    /// New controller; `Some(None)` detaches.
    pub controller: Option<Option<String>>,
    /// New IPv4 configuration (already merged).
    pub ipv4: Option<IpConfig>,
    /// New IPv6 configuration (already merged).
    pub ipv6: Option<IpConfig>,
    /// New bond mode/ports (already merged). Presence forces a full bond
    /// reactivation.
    pub bond: Option<BondConfig>,
}

impl AttrChanges {
    /// Check if no attribute differs.
    pub fn is_empty(&self) -> bool {
        !self.take_ownership
            && self.mtu.is_none()
            && self.controller.is_none()
            && self.ipv4.is_none()
            && self.ipv6.is_none()
            && self.bond.is_none()
    }

    /// Attribute names that differ, for verification reports.
    pub fn changed_attrs(&self) -> Vec<&'static str> {
        let mut attrs = Vec::new();
        if self.take_ownership {
            attrs.push("managed");
        }
        if self.mtu.is_some() {
            attrs.push("mtu");
        }
        if self.controller.is_some() {
            attrs.push("controller");
        }
        if self.ipv4.is_some() {
            attrs.push("ipv4");
        }
        if self.ipv6.is_some() {
            attrs.push("ipv6");
        }
        if self.bond.is_some() {
            attrs.push("bond");
        }
        attrs
    }

    /// Get a summary of the changes.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.take_ownership {
            parts.push("ownership".to_string());
        }
        if let Some(mtu) = self.mtu {
            parts.push(format!("mtu={}", mtu));
        }
        match &self.controller {
            Some(Some(ctrl)) => parts.push(format!("controller={}", ctrl)),
            Some(None) => parts.push("nocontroller".to_string()),
            None => {}
        }
        if self.ipv4.is_some() {
            parts.push("ipv4".to_string());
        }
        if self.ipv6.is_some() {
            parts.push("ipv6".to_string());
        }
        if self.bond.is_some() {
            parts.push("bond".to_string());
        }
        parts.join(", ")
    }
}

/// Compute the change operations that take the current state to the
/// desired one. An empty result means the states already converge.
///
/// The result is unordered with respect to dependencies; feed it through
/// [`crate::plan::plan`] before applying.
pub fn compute_diff(merged: &MergedState) -> Vec<ChangeOp> {
    let mut ops = Vec::new();

    for entry in merged.interfaces() {
        let Some(desired) = &entry.desired else {
            continue;
        };
        let Some(for_apply) = &entry.for_apply else {
            continue;
        };
        let priority = entry.up_priority;

        match (&entry.current, for_apply.is_absent()) {
            // Absent and already gone: nothing to do.
            (None, true) => {}
            (Some(cur), true) => {
                for route in merged
                    .current_routes
                    .iter()
                    .filter(|r| r.next_hop_interface.as_deref() == Some(cur.name.as_str()))
                {
                    ops.push(ChangeOp::DelRoute {
                        route: route.clone(),
                    });
                }
                if cur.is_up() {
                    ops.push(ChangeOp::DeactivateIface {
                        name: cur.name.clone(),
                        up_priority: priority,
                    });
                }
                ops.push(ChangeOp::DeleteIface {
                    name: cur.name.clone(),
                    before: cur.clone(),
                    up_priority: priority,
                });
            }
            (None, false) => {
                ops.push(ChangeOp::CreateIface {
                    after: for_apply.clone(),
                    up_priority: priority,
                });
                if for_apply.is_up() {
                    ops.push(ChangeOp::ActivateIface {
                        name: for_apply.name.clone(),
                        up_priority: priority,
                    });
                }
            }
            (Some(cur), false) => {
                let changes = attr_changes(desired, for_apply, cur);
                let reactivate_bond = changes.bond.is_some();

                if reactivate_bond {
                    // Changing a live bond's mode or membership while
                    // ports are attached leaves the kernel in a partial
                    // membership state: take it down first, reshape, and
                    // bring it back only if it is meant to be up. A bond
                    // that is (or is asserted) down stays down.
                    if cur.is_up() {
                        ops.push(ChangeOp::DeactivateIface {
                            name: cur.name.clone(),
                            up_priority: priority,
                        });
                    }
                    ops.push(ChangeOp::UpdateIface {
                        name: cur.name.clone(),
                        changes,
                        before: cur.clone(),
                        up_priority: priority,
                    });
                    if for_apply.is_up() {
                        ops.push(ChangeOp::ActivateIface {
                            name: cur.name.clone(),
                            up_priority: priority,
                        });
                    }
                    continue;
                }

                if !changes.is_empty() {
                    ops.push(ChangeOp::UpdateIface {
                        name: cur.name.clone(),
                        changes,
                        before: cur.clone(),
                        up_priority: priority,
                    });
                }
                // Admin state only when the caller asserted one.
                match desired.state {
                    Some(crate::state::InterfaceState::Up) if !cur.is_up() => {
                        ops.push(ChangeOp::ActivateIface {
                            name: cur.name.clone(),
                            up_priority: priority,
                        });
                    }
                    Some(crate::state::InterfaceState::Down) if cur.is_up() => {
                        ops.push(ChangeOp::DeactivateIface {
                            name: cur.name.clone(),
                            up_priority: priority,
                        });
                    }
                    _ => {}
                }
            }
        }
    }

    if let Some(desired_routes) = &merged.desired_routes {
        for route in desired_routes {
            let present = merged.current_routes.iter().any(|c| route.matches(c));
            if !present {
                ops.push(ChangeOp::AddRoute {
                    route: route.clone(),
                });
            }
        }
    }

    ops
}

/// Compare only the attributes asserted in `desired`; the merged
/// `for_apply` supplies the full values to write when one differs.
fn attr_changes(desired: &Interface, for_apply: &Interface, cur: &Interface) -> AttrChanges {
    let mut changes = AttrChanges::default();

    if cur.managed == Some(false) {
        changes.take_ownership = true;
    }

    if let Some(mtu) = desired.mtu
        && cur.mtu != Some(mtu)
    {
        changes.mtu = Some(mtu);
    }

    // Membership may come from the document or from a bond's port list;
    // either way it lives in the merged view.
    let target_ctrl = normalize_controller(for_apply.controller.as_deref());
    let cur_ctrl = normalize_controller(cur.controller.as_deref());
    if (desired.controller.is_some() || for_apply.controller != cur.controller)
        && target_ctrl != cur_ctrl
    {
        changes.controller = Some(target_ctrl.map(str::to_string));
    }

    if let Some(desired_ip) = &desired.ipv4
        && !desired_ip.matches(cur.ipv4.as_ref().unwrap_or(&IpConfig::default()))
    {
        changes.ipv4 = for_apply.ipv4.clone();
    }
    if let Some(desired_ip) = &desired.ipv6
        && !desired_ip.matches(cur.ipv6.as_ref().unwrap_or(&IpConfig::default()))
    {
        changes.ipv6 = for_apply.ipv6.clone();
    }

    if let Some(desired_bond) = &desired.bond
        && !desired_bond.matches(cur.bond.as_ref().unwrap_or(&BondConfig::default()))
    {
        changes.bond = for_apply.bond.clone();
    }

    changes
}

fn normalize_controller(ctrl: Option<&str>) -> Option<&str> {
    match ctrl {
        Some("") | None => None,
        Some(c) => Some(c),
    }
}
