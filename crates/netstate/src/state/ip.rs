//! Per-family IP configuration.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// IP configuration for one address family on one interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpConfig {
    /// Whether the family is enabled at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Whether addresses come from DHCP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<bool>,

    /// Whether addresses come from router advertisements (IPv6 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoconf: Option<bool>,

    /// Address list. Order is significant and preserved exactly as
    /// observed or declared. When DHCP/autoconf is on, the list is
    /// informational only and never participates in diffing.
    #[serde(rename = "address", default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<IpAddress>>,
}

impl IpConfig {
    /// Whether the address list is daemon/kernel-managed rather than static.
    pub fn is_auto(&self) -> bool {
        self.dhcp == Some(true) || self.autoconf == Some(true)
    }

    /// Whether `current` satisfies every attribute asserted here.
    ///
    /// Address comparison is order-sensitive: `[A, B]` does not match
    /// `[B, A]` even though the sets are equal. When this configuration is
    /// auto-addressed, the address list is skipped entirely.
    pub fn matches(&self, current: &IpConfig) -> bool {
        if let Some(enabled) = self.enabled
            && current.enabled.unwrap_or(false) != enabled
        {
            return false;
        }
        if let Some(dhcp) = self.dhcp
            && current.dhcp.unwrap_or(false) != dhcp
        {
            return false;
        }
        if let Some(autoconf) = self.autoconf
            && current.autoconf.unwrap_or(false) != autoconf
        {
            return false;
        }
        if !self.is_auto()
            && let Some(addresses) = &self.addresses
            && addresses != current.addresses.as_deref().unwrap_or_default()
        {
            return false;
        }
        true
    }

    /// Merge by presence: fields asserted here win, everything else is
    /// carried forward from `current`. The address list is a list attribute
    /// so key presence replaces it wholesale.
    pub fn merged_onto(&self, current: &IpConfig) -> IpConfig {
        IpConfig {
            enabled: self.enabled.or(current.enabled),
            dhcp: self.dhcp.or(current.dhcp),
            autoconf: self.autoconf.or(current.autoconf),
            addresses: self
                .addresses
                .clone()
                .or_else(|| current.addresses.clone()),
        }
    }
}

/// One IP address with prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IpAddress {
    /// The address.
    pub ip: IpAddr,
    /// Prefix length.
    pub prefix_length: u8,
}

impl IpAddress {
    /// Build an address entry, e.g. `IpAddress::new("192.0.2.251".parse()?, 24)`.
    pub fn new(ip: IpAddr, prefix_length: u8) -> Self {
        Self { ip, prefix_length }
    }
}

impl std::fmt::Display for IpAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_length)
    }
}
