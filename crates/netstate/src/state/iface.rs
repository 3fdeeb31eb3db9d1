//! Interface description and type-specific configuration.

use serde::{Deserialize, Serialize};

use super::ip::IpConfig;

/// One network interface, as declared or as observed.
///
/// Everything except `name` is optional. In a desired document, `None`
/// means "not asserted"; in a collected snapshot the collector fills in
/// what the daemon reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Interface {
    /// Interface name, unique within a state document.
    pub name: String,

    /// Interface type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub iface_type: Option<InterfaceType>,

    /// Administrative state. Declaring an unknown interface without a state
    /// implies `up`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InterfaceState>,

    /// Whether this control plane governs the interface. Reported by the
    /// collector; never asserted directly in a desired document (declaring
    /// an interface implies the target is managed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed: Option<bool>,

    /// Maximum transmission unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,

    /// Name of the controller (bond) this interface is a port of.
    /// An empty string detaches the interface from its controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    /// IPv4 configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<IpConfig>,

    /// IPv6 configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<IpConfig>,

    /// Bond-specific configuration. Only meaningful when `type` is `bond`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond: Option<BondConfig>,
}

impl Interface {
    /// Create a bare interface entry with only the name set.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Whether the interface is (or is asserted to be) up.
    pub fn is_up(&self) -> bool {
        self.state == Some(InterfaceState::Up)
    }

    /// Whether the interface is marked for removal.
    pub fn is_absent(&self) -> bool {
        self.state == Some(InterfaceState::Absent)
    }

    /// Whether this is a bond.
    pub fn is_bond(&self) -> bool {
        self.iface_type == Some(InterfaceType::Bond) || self.bond.is_some()
    }

    /// Port names, when this interface is a bond with a declared port list.
    pub fn ports(&self) -> Option<&[String]> {
        self.bond.as_ref()?.ports.as_deref()
    }
}

/// Interface type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceType {
    /// Physical or emulated ethernet.
    Ethernet,
    /// Link aggregation over port interfaces.
    Bond,
    /// One end of a virtual ethernet pair.
    Veth,
    /// Dummy interface.
    Dummy,
    /// Reported by the daemon but not modeled here.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ethernet => "ethernet",
            Self::Bond => "bond",
            Self::Veth => "veth",
            Self::Dummy => "dummy",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Administrative interface state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceState {
    /// Interface should be (or is) active.
    Up,
    /// Interface should be (or is) deactivated but kept.
    Down,
    /// Interface should be removed. Never appears in collected snapshots.
    Absent,
}

impl std::fmt::Display for InterfaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Absent => "absent",
        };
        write!(f, "{}", s)
    }
}

/// Bond (link aggregation) configuration.
///
/// The port list is a list attribute: when the key is present in a desired
/// document it replaces the current port list wholesale. Port membership is
/// compared as a set; reordering alone is not a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BondConfig {
    /// Port selection mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<BondMode>,

    /// Names of the port interfaces.
    #[serde(rename = "port", default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<String>>,
}

impl BondConfig {
    /// Whether `other` describes the same mode and port set.
    ///
    /// Only attributes asserted on `self` participate; port order is
    /// irrelevant.
    pub fn matches(&self, other: &BondConfig) -> bool {
        if let Some(mode) = self.mode
            && other.mode != Some(mode)
        {
            return false;
        }
        if let Some(ports) = &self.ports {
            let mut desired: Vec<&str> = ports.iter().map(String::as_str).collect();
            let mut current: Vec<&str> = other
                .ports
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(String::as_str)
                .collect();
            desired.sort_unstable();
            current.sort_unstable();
            if desired != current {
                return false;
            }
        }
        true
    }
}

/// Bond port selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondMode {
    /// Round-robin.
    #[serde(rename = "balance-rr")]
    BalanceRr,
    /// Active-backup failover.
    #[serde(rename = "active-backup")]
    ActiveBackup,
    /// XOR hash.
    #[serde(rename = "balance-xor")]
    BalanceXor,
    /// Broadcast on all ports.
    #[serde(rename = "broadcast")]
    Broadcast,
    /// 802.3ad link aggregation (LACP).
    #[serde(rename = "802.3ad")]
    Ieee802_3ad,
    /// Transmit load balancing.
    #[serde(rename = "balance-tlb")]
    BalanceTlb,
    /// Adaptive load balancing.
    #[serde(rename = "balance-alb")]
    BalanceAlb,
}
