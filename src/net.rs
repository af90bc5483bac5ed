// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

/// Port that DNS traffic is identified by. All traffic to this port is controlled by the DNS
/// sublayer.
pub const DNS_SERVER_PORT: u16 = 53;

const fn net4(ip: Ipv4Addr, prefix: u8) -> IpNetwork {
    match Ipv4Network::new_checked(ip, prefix) {
        Some(network) => IpNetwork::V4(network),
        None => panic!("invalid IPv4 prefix"),
    }
}

const fn net6(ip: Ipv6Addr, prefix: u8) -> IpNetwork {
    match Ipv6Network::new_checked(ip, prefix) {
        Some(network) => IpNetwork::V6(network),
        None => panic!("invalid IPv6 prefix"),
    }
}

/// Private unicast IPv4 networks reachable when LAN access is permitted.
pub const ALLOWED_LAN_NETS_V4: [IpNetwork; 4] = [
    net4(Ipv4Addr::new(10, 0, 0, 0), 8),
    net4(Ipv4Addr::new(172, 16, 0, 0), 12),
    net4(Ipv4Addr::new(192, 168, 0, 0), 16),
    net4(Ipv4Addr::new(169, 254, 0, 0), 16),
];

/// Private unicast IPv6 networks reachable when LAN access is permitted.
pub const ALLOWED_LAN_NETS_V6: [IpNetwork; 2] = [
    net6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10),
    net6(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),
];

/// Broadcast and non-routable multicast IPv4 networks reachable when LAN access is permitted.
pub const ALLOWED_LAN_MULTICAST_NETS_V4: [IpNetwork; 3] = [
    // Local network broadcast
    net4(Ipv4Addr::new(255, 255, 255, 255), 32),
    // Local subnetwork multicast
    net4(Ipv4Addr::new(224, 0, 0, 0), 24),
    // Admin-local multicast
    net4(Ipv4Addr::new(239, 0, 0, 0), 8),
];

/// Non-routable multicast IPv6 networks reachable when LAN access is permitted.
pub const ALLOWED_LAN_MULTICAST_NETS_V6: [IpNetwork; 5] = [
    // Interface-local
    net6(Ipv6Addr::new(0xff01, 0, 0, 0, 0, 0, 0, 0), 16),
    // Link-local
    net6(Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0), 16),
    // Realm-local
    net6(Ipv6Addr::new(0xff03, 0, 0, 0, 0, 0, 0, 0), 16),
    // Admin-local
    net6(Ipv6Addr::new(0xff04, 0, 0, 0, 0, 0, 0, 0), 16),
    // Site-local
    net6(Ipv6Addr::new(0xff05, 0, 0, 0, 0, 0, 0, 0), 16),
];

pub(crate) const LINK_LOCAL_NET_V6: IpNetwork = net6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10);

/// Representation of a transport protocol, either UDP or TCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProtocol {
    Udp,
    Tcp,
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TransportProtocol::Udp => "udp",
            TransportProtocol::Tcp => "tcp",
        }
        .fmt(f)
    }
}

/// A network layer address together with a transport protocol and port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: SocketAddr,
    pub protocol: TransportProtocol,
}

impl Endpoint {
    pub fn new(ip: impl Into<IpAddr>, port: u16, protocol: TransportProtocol) -> Self {
        Endpoint {
            address: SocketAddr::new(ip.into(), port),
            protocol,
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.address.ip()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.protocol)
    }
}

/// An endpoint that may be reached outside the tunnel, optionally only by the listed
/// applications. An empty client list allows every application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AllowedEndpoint {
    pub endpoint: Endpoint,
    pub clients: Vec<PathBuf>,
}

impl AllowedEndpoint {
    pub fn new(endpoint: Endpoint, clients: Vec<PathBuf>) -> Self {
        AllowedEndpoint { endpoint, clients }
    }

    /// Allowed endpoint reachable by any application.
    pub fn any_client(endpoint: Endpoint) -> Self {
        Self::new(endpoint, Vec::new())
    }
}

impl From<Endpoint> for AllowedEndpoint {
    fn from(endpoint: Endpoint) -> Self {
        Self::any_client(endpoint)
    }
}

impl fmt::Display for AllowedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.endpoint.fmt(f)?;
        if !self.clients.is_empty() {
            f.write_str(" for")?;
            for client in &self.clients {
                write!(f, " {}", client.display())?;
            }
        }
        Ok(())
    }
}

/// How much of a tunnel interface's traffic is permitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum AllowedTunnelTraffic {
    /// Nothing is permitted on the interface.
    #[default]
    None,
    /// Every destination is permitted on the interface.
    All,
    /// Only this endpoint is permitted.
    One(Endpoint),
    /// Only these two endpoints are permitted, e.g. both relays of a multihop setup.
    Two(Endpoint, Endpoint),
}

impl AllowedTunnelTraffic {
    pub fn all(&self) -> bool {
        matches!(self, AllowedTunnelTraffic::All)
    }
}

impl fmt::Display for AllowedTunnelTraffic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowedTunnelTraffic::None => "None".fmt(f),
            AllowedTunnelTraffic::All => "All".fmt(f),
            AllowedTunnelTraffic::One(endpoint) => endpoint.fmt(f),
            AllowedTunnelTraffic::Two(endpoint1, endpoint2) => {
                write!(f, "{endpoint1}, {endpoint2}")
            }
        }
    }
}
