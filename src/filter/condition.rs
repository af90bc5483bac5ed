// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{AddrFamily, InterfaceMatch, Proto};
use ipnetwork::IpNetwork;

use std::net::IpAddr;
use std::path::PathBuf;

/// A single match condition of a filter. Conditions on different fields must all match, while
/// several conditions on the same field match if any one of them does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    RemoteAddress(IpNetwork),
    RemotePort(u16),
    LocalPort(u16),
    Protocol(Proto),
    /// The application that owns the socket.
    Application(PathBuf),
    Interface(InterfaceMatch),
    /// ICMP type, carried in the local port field by the engine.
    IcmpType(u8),
    /// Traffic on a loopback interface.
    Loopback,
}

impl Condition {
    /// Matches a single remote host.
    pub fn remote_ip(ip: impl Into<IpAddr>) -> Self {
        Condition::RemoteAddress(IpNetwork::from(ip.into()))
    }

    /// Returns the address family this condition restricts the filter to.
    pub fn get_af(&self) -> AddrFamily {
        match *self {
            Condition::RemoteAddress(network) => AddrFamily::from(network),
            Condition::Protocol(proto) => proto.get_af(),
            _ => AddrFamily::Any,
        }
    }
}
