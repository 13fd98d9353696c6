// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Network ranges and host names that outbound fetches must never reach.

use crate::error::ConfigError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// Loopback, private, link-local, shared, reserved and multicast space.
pub const DEFAULT_DENIED_RANGES: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "::/128",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
    "ff00::/8",
];

/// Cloud metadata services and loopback names.
pub const DEFAULT_DENIED_HOSTS: &[&str] = &[
    "localhost",
    "metadata",
    "metadata.google.internal",
    "metadata.goog",
    "instance-data",
    "instance-data.ec2.internal",
];

/// An IPv4 or IPv6 CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, ConfigError> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return Err(ConfigError::InvalidNetwork(format!("{addr}/{prefix}")));
        }
        Ok(Self { addr, prefix })
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Whether `ip` falls inside this block. Families never mix.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = v4_mask(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = v6_mask(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

fn v4_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn v6_mask(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl FromStr for IpNetwork {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidNetwork(s.to_string());
        let s = s.trim();

        match s.split_once('/') {
            Some((addr, prefix)) => {
                let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
                let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
                Self::new(addr, prefix).map_err(|_| invalid())
            }
            None => {
                let addr: IpAddr = s.parse().map_err(|_| invalid())?;
                let prefix = if addr.is_ipv4() { 32 } else { 128 };
                Self::new(addr, prefix)
            }
        }
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Compiled deny list for outbound targets.
#[derive(Debug, Clone)]
pub struct NetworkPolicy {
    ranges: Vec<IpNetwork>,
    hosts: Vec<String>,
}

impl NetworkPolicy {
    /// Parse CIDR ranges and host names.
    pub fn new(ranges: &[String], hosts: &[String]) -> Result<Self, ConfigError> {
        let ranges = ranges
            .iter()
            .map(|r| r.parse())
            .collect::<Result<Vec<IpNetwork>, _>>()?;
        let hosts = hosts.iter().map(|h| normalize_host(h)).collect();
        Ok(Self { ranges, hosts })
    }

    /// Whether an address is inside any denied range.
    ///
    /// IPv4-mapped (`::ffff:a.b.c.d`) and NAT64 (`64:ff9b::a.b.c.d`)
    /// addresses are judged by the IPv4 address they carry.
    pub fn is_denied_ip(&self, ip: IpAddr) -> bool {
        let ip = unmap(ip);
        self.ranges.iter().any(|net| net.contains(ip))
    }

    /// Whether a host name is refused outright.
    /// Any subdomain of `localhost` counts as `localhost`.
    pub fn is_denied_host(&self, host: &str) -> bool {
        let host = normalize_host(host);
        if host == "localhost" || host.ends_with(".localhost") {
            return self.hosts.iter().any(|h| h == "localhost");
        }
        self.hosts.iter().any(|h| *h == host)
    }
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        let ranges = DEFAULT_DENIED_RANGES
            .iter()
            .filter_map(|r| r.parse().ok())
            .collect();
        let hosts = DEFAULT_DENIED_HOSTS.iter().map(|h| h.to_string()).collect();
        Self { ranges, hosts }
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Well-known NAT64 prefix `64:ff9b::/96`.
const NAT64_PREFIX: [u16; 6] = [0x64, 0xff9b, 0, 0, 0, 0];

fn unmap(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return IpAddr::V4(v4);
            }
            if v6.segments()[..6] == NAT64_PREFIX {
                let [.., a, b, c, d] = v6.octets();
                return IpAddr::V4(Ipv4Addr::new(a, b, c, d));
            }
            IpAddr::V6(v6)
        }
        v4 => v4,
    }
}
