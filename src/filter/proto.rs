// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{net::TransportProtocol, AddrFamily};

use std::fmt;

/// IP protocol matched by a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proto {
    Tcp,
    Udp,
    Icmp,
    IcmpV6,
}

impl Proto {
    /// The address family this protocol implies. ICMP variants are bound to one family.
    pub fn get_af(&self) -> AddrFamily {
        match *self {
            Proto::Tcp | Proto::Udp => AddrFamily::Any,
            Proto::Icmp => AddrFamily::Ipv4,
            Proto::IcmpV6 => AddrFamily::Ipv6,
        }
    }
}

impl From<TransportProtocol> for Proto {
    fn from(protocol: TransportProtocol) -> Self {
        match protocol {
            TransportProtocol::Tcp => Proto::Tcp,
            TransportProtocol::Udp => Proto::Udp,
        }
    }
}

impl From<Proto> for u8 {
    /// IP protocol number, as the engine matches it.
    fn from(proto: Proto) -> Self {
        match proto {
            Proto::Tcp => libc::IPPROTO_TCP as u8,
            Proto::Udp => libc::IPPROTO_UDP as u8,
            Proto::Icmp => libc::IPPROTO_ICMP as u8,
            Proto::IcmpV6 => libc::IPPROTO_ICMPV6 as u8,
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Proto::Tcp => "tcp",
            Proto::Udp => "udp",
            Proto::Icmp => "icmp",
            Proto::IcmpV6 => "icmp6",
        }
        .fmt(f)
    }
}
