//! Route entries and CIDR destinations.

use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One configured route.
///
/// Identity is the `(destination, next-hop-interface, next-hop-address,
/// metric)` tuple. Routes carry no ordering guarantee; state documents
/// compare them as sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Route {
    /// Destination prefix, e.g. `0.0.0.0/0`.
    pub destination: Cidr,

    /// Gateway address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_address: Option<IpAddr>,

    /// Egress interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_interface: Option<String>,

    /// Route metric (priority).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<u32>,
}

impl Route {
    /// Build a route toward `destination`.
    pub fn new(destination: Cidr) -> Self {
        Self {
            destination,
            next_hop_address: None,
            next_hop_interface: None,
            metric: None,
        }
    }

    /// Set the gateway address.
    pub fn via(mut self, gateway: IpAddr) -> Self {
        self.next_hop_address = Some(gateway);
        self
    }

    /// Set the egress interface.
    pub fn dev(mut self, iface: &str) -> Self {
        self.next_hop_interface = Some(iface.to_string());
        self
    }

    /// Set the metric.
    pub fn metric(mut self, metric: u32) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Whether `current` is this route, under partial specification: an
    /// identity component left unset here matches any current value.
    pub fn matches(&self, current: &Route) -> bool {
        if self.destination != current.destination {
            return false;
        }
        if let Some(gw) = self.next_hop_address
            && current.next_hop_address != Some(gw)
        {
            return false;
        }
        if let Some(dev) = &self.next_hop_interface
            && current.next_hop_interface.as_ref() != Some(dev)
        {
            return false;
        }
        if let Some(metric) = self.metric
            && current.metric != Some(metric)
        {
            return false;
        }
        true
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.destination)?;
        if let Some(gw) = self.next_hop_address {
            write!(f, " via {}", gw)?;
        }
        if let Some(dev) = &self.next_hop_interface {
            write!(f, " dev {}", dev)?;
        }
        if let Some(metric) = self.metric {
            write!(f, " metric {}", metric)?;
        }
        Ok(())
    }
}

/// A destination prefix in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    /// Network address.
    pub addr: IpAddr,
    /// Prefix length.
    pub prefix: u8,
}

impl Cidr {
    /// The IPv4 default destination, `0.0.0.0/0`.
    pub fn v4_default() -> Self {
        Self {
            addr: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            prefix: 0,
        }
    }

    /// The IPv6 default destination, `::/0`.
    pub fn v6_default() -> Self {
        Self {
            addr: IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
            prefix: 0,
        }
    }
}

/// Error parsing CIDR notation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CidrParseError {
    /// Missing the `/prefix` part.
    #[error("missing prefix: {0} (expected format: 10.0.0.0/8)")]
    MissingPrefix(String),
    /// Invalid network address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Prefix did not parse or exceeds the family maximum.
    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),
}

impl FromStr for Cidr {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, prefix_str) = s
            .split_once('/')
            .ok_or_else(|| CidrParseError::MissingPrefix(s.to_string()))?;
        let addr: IpAddr = addr_str
            .parse()
            .map_err(|_| CidrParseError::InvalidAddress(addr_str.to_string()))?;
        let prefix: u8 = prefix_str
            .parse()
            .map_err(|_| CidrParseError::InvalidPrefix(prefix_str.to_string()))?;
        let max_prefix = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max_prefix {
            return Err(CidrParseError::InvalidPrefix(format!(
                "{} exceeds maximum {} for address family",
                prefix, max_prefix
            )));
        }
        Ok(Self { addr, prefix })
    }
}

impl std::fmt::Display for Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl Serialize for Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
