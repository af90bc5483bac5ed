// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Rules are the units policies are composed of. Each rule captures its own configuration when
//! it is constructed and expands into a fixed set of filters with stable identifiers, so applying
//! the same rule twice always produces the same filters.

use crate::identity::IdentifierPool;
use crate::{
    AddrFamily, Condition, Direction, Filter, FilterBuilder, Layer, ObjectInstaller, Proto,
    Result, TransportProtocol,
};
use uuid::Uuid;

use std::net::IpAddr;
use std::path::PathBuf;

pub mod baseline;
pub mod dns;
pub mod multi;
pub mod persistent;

macro_rules! rule_variants {
    ($($(#[$attr:meta])* $variant:ident($rule:ty) => $name:literal,)*) => {
        /// Every rule a policy can be composed of.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Rule {
            $($(#[$attr])* $variant($rule),)*
        }

        impl Rule {
            /// The filters this rule installs, in installation order.
            pub fn filters(&self) -> Result<Vec<Filter>> {
                match self {
                    $(Rule::$variant(rule) => rule.filters(),)*
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(Rule::$variant(_) => $name,)*
                }
            }
        }

        $(
            impl From<$rule> for Rule {
                fn from(rule: $rule) -> Self {
                    Rule::$variant(rule)
                }
            }
        )*
    };
}

rule_variants! {
    BlockAll(baseline::BlockAll) => "baseline::BlockAll",
    PermitLoopback(baseline::PermitLoopback) => "baseline::PermitLoopback",
    PermitDhcp(baseline::PermitDhcp) => "baseline::PermitDhcp",
    PermitNdp(baseline::PermitNdp) => "baseline::PermitNdp",
    PermitDhcpServer(baseline::PermitDhcpServer) => "baseline::PermitDhcpServer",
    PermitLan(baseline::PermitLan) => "baseline::PermitLan",
    PermitLanService(baseline::PermitLanService) => "baseline::PermitLanService",
    PermitDns(baseline::PermitDns) => "baseline::PermitDns",
    PermitEndpoint(baseline::PermitEndpoint) => "baseline::PermitEndpoint",
    PermitVpnTunnel(baseline::PermitVpnTunnel) => "baseline::PermitVpnTunnel",
    PermitVpnTunnelService(baseline::PermitVpnTunnelService) => "baseline::PermitVpnTunnelService",
    PermitVpnRelay(multi::PermitVpnRelay) => "multi::PermitVpnRelay",
    DnsBlockAll(dns::BlockAll) => "dns::BlockAll",
    DnsPermitLoopback(dns::PermitLoopback) => "dns::PermitLoopback",
    DnsPermitTunnel(dns::PermitTunnel) => "dns::PermitTunnel",
    DnsPermitNonTunnel(dns::PermitNonTunnel) => "dns::PermitNonTunnel",
    /// Only installed when the firewall is torn down but the network should stay blocked.
    PersistentBlockAll(persistent::BlockAll) => "persistent::BlockAll",
}

impl Rule {
    /// Installs every filter of this rule. Stops at the first filter that can not be installed.
    pub fn apply(&self, installer: &mut dyn ObjectInstaller) -> Result<()> {
        for filter in self.filters()? {
            installer.add_filter(filter)?;
        }
        Ok(())
    }
}

/// An ordered sequence of rules, applied front to back.
pub type Ruleset = Vec<Rule>;

/// Starts a filter with the fields every rule sets.
fn filter_builder(key: Uuid, name: &str, layer: Layer, sublayer: Uuid) -> FilterBuilder {
    let mut builder = FilterBuilder::default();
    builder.key(key).name(name).layer(layer).sublayer(sublayer);
    builder
}

fn layer_for(direction: Direction, ip: IpAddr) -> Layer {
    match (direction, ip) {
        (Direction::Outbound, IpAddr::V4(_)) => Layer::AleAuthConnectV4,
        (Direction::Outbound, IpAddr::V6(_)) => Layer::AleAuthConnectV6,
        (Direction::Inbound, IpAddr::V4(_)) => Layer::AleAuthRecvAcceptV4,
        (Direction::Inbound, IpAddr::V6(_)) => Layer::AleAuthRecvAcceptV6,
    }
}

/// Conditions matching traffic to one remote endpoint, optionally only from the given
/// applications.
fn endpoint_conditions(
    ip: IpAddr,
    port: u16,
    protocol: TransportProtocol,
    clients: &[PathBuf],
) -> Vec<Condition> {
    let mut conditions = vec![
        Condition::remote_ip(ip),
        Condition::RemotePort(port),
        Condition::Protocol(Proto::from(protocol)),
    ];
    conditions.extend(clients.iter().cloned().map(Condition::Application));
    conditions
}

/// Hands out identifiers from a pool, one instance index per address family at a time.
struct PoolCursor {
    pool: IdentifierPool,
    ipv4: usize,
    ipv6: usize,
}

impl PoolCursor {
    fn new(pool: IdentifierPool) -> Self {
        PoolCursor {
            pool,
            ipv4: 0,
            ipv6: 0,
        }
    }

    /// The identifier for the next instance in the family of `ip`. The pool is checked before
    /// the index is consumed.
    fn next(&mut self, ip: IpAddr) -> Result<Uuid> {
        let (family, index) = match ip {
            IpAddr::V4(_) => (AddrFamily::Ipv4, &mut self.ipv4),
            IpAddr::V6(_) => (AddrFamily::Ipv6, &mut self.ipv6),
        };
        let key = self.pool.get(family, *index)?;
        *index += 1;
        Ok(key)
    }
}
