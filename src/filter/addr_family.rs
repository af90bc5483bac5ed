// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use ipnetwork::IpNetwork;

use std::fmt;
use std::net::IpAddr;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddrFamily {
    #[default]
    Any,
    Ipv4,
    Ipv6,
}

impl AddrFamily {
    /// Returns the family both arguments agree on, or `None` if they are incompatible.
    pub fn compatible(self, other: AddrFamily) -> Option<AddrFamily> {
        match (self, other) {
            (af1, af2) if af1 == af2 => Some(af1),
            (af, AddrFamily::Any) | (AddrFamily::Any, af) => Some(af),
            _ => None,
        }
    }
}

impl From<IpAddr> for AddrFamily {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddrFamily::Ipv4,
            IpAddr::V6(_) => AddrFamily::Ipv6,
        }
    }
}

impl From<IpNetwork> for AddrFamily {
    fn from(network: IpNetwork) -> Self {
        match network {
            IpNetwork::V4(_) => AddrFamily::Ipv4,
            IpNetwork::V6(_) => AddrFamily::Ipv6,
        }
    }
}

impl fmt::Display for AddrFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AddrFamily::Any => "any",
            AddrFamily::Ipv4 => "IPv4",
            AddrFamily::Ipv6 => "IPv6",
        }
        .fmt(f)
    }
}
