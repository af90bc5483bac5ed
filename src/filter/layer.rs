// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{AddrFamily, Direction};

use std::fmt;

/// The filtering layer a filter is installed in. A layer is the combination of a traffic
/// direction and an address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Outbound connection authorization, IPv4.
    AleAuthConnectV4,
    /// Outbound connection authorization, IPv6.
    AleAuthConnectV6,
    /// Inbound connection acceptance, IPv4.
    AleAuthRecvAcceptV4,
    /// Inbound connection acceptance, IPv6.
    AleAuthRecvAcceptV6,
}

impl Layer {
    pub fn new(direction: Direction, af: AddrFamily) -> Option<Self> {
        match (direction, af) {
            (Direction::Outbound, AddrFamily::Ipv4) => Some(Layer::AleAuthConnectV4),
            (Direction::Outbound, AddrFamily::Ipv6) => Some(Layer::AleAuthConnectV6),
            (Direction::Inbound, AddrFamily::Ipv4) => Some(Layer::AleAuthRecvAcceptV4),
            (Direction::Inbound, AddrFamily::Ipv6) => Some(Layer::AleAuthRecvAcceptV6),
            (_, AddrFamily::Any) => None,
        }
    }

    pub fn direction(&self) -> Direction {
        match *self {
            Layer::AleAuthConnectV4 | Layer::AleAuthConnectV6 => Direction::Outbound,
            Layer::AleAuthRecvAcceptV4 | Layer::AleAuthRecvAcceptV6 => Direction::Inbound,
        }
    }

    pub fn af(&self) -> AddrFamily {
        match *self {
            Layer::AleAuthConnectV4 | Layer::AleAuthRecvAcceptV4 => AddrFamily::Ipv4,
            Layer::AleAuthConnectV6 | Layer::AleAuthRecvAcceptV6 => AddrFamily::Ipv6,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Layer::AleAuthConnectV4 => "ALE_AUTH_CONNECT_V4",
            Layer::AleAuthConnectV6 => "ALE_AUTH_CONNECT_V6",
            Layer::AleAuthRecvAcceptV4 => "ALE_AUTH_RECV_ACCEPT_V4",
            Layer::AleAuthRecvAcceptV6 => "ALE_AUTH_RECV_ACCEPT_V6",
        }
        .fmt(f)
    }
}
