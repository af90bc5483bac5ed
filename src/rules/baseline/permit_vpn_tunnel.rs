// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::identity::{self, IdentifierPool};
use crate::rules::filter_builder;
use crate::{
    AddrFamily, AllowedTunnelTraffic, Condition, Direction, Endpoint, Filter, FilterAction,
    InterfaceAlias, InterfaceMatch, Layer, Proto, Result, WeightClass,
};

use std::fmt;

/// Which of the, possibly two, tunnel interfaces a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelMarker {
    Entry,
    Exit,
}

impl fmt::Display for TunnelMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TunnelMarker::Entry => "entry",
            TunnelMarker::Exit => "exit",
        }
        .fmt(f)
    }
}

/// Configuration shared by the tunnel rules.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TunnelTraffic {
    interface: InterfaceAlias,
    /// Empty if every remote endpoint is permitted.
    endpoints: Vec<Endpoint>,
    marker: TunnelMarker,
}

impl TunnelTraffic {
    fn new(
        interface: InterfaceAlias,
        traffic: &AllowedTunnelTraffic,
        marker: TunnelMarker,
    ) -> Option<Self> {
        let endpoints = match traffic {
            AllowedTunnelTraffic::None => return None,
            AllowedTunnelTraffic::All => vec![],
            AllowedTunnelTraffic::One(endpoint) => vec![*endpoint],
            AllowedTunnelTraffic::Two(endpoint1, endpoint2) => vec![*endpoint1, *endpoint2],
        };
        Some(TunnelTraffic {
            interface,
            endpoints,
            marker,
        })
    }

    /// One filter per permitted endpoint, or one per address family when every endpoint is
    /// permitted. An endpoint's position selects its identifier within its family's pool.
    fn filters(
        &self,
        direction: Direction,
        pool: IdentifierPool,
        name: &str,
        description: &str,
    ) -> Result<Vec<Filter>> {
        let interface = Condition::Interface(InterfaceMatch::equal(self.interface.clone()));
        let filter = |af: AddrFamily, index: usize, mut conditions: Vec<Condition>| {
            let layer = match (direction, af) {
                (Direction::Outbound, AddrFamily::Ipv6) => Layer::AleAuthConnectV6,
                (Direction::Inbound, AddrFamily::Ipv6) => Layer::AleAuthRecvAcceptV6,
                (Direction::Outbound, _) => Layer::AleAuthConnectV4,
                (Direction::Inbound, _) => Layer::AleAuthRecvAcceptV4,
            };
            conditions.insert(0, interface.clone());
            pool.get(af, index).and_then(|key| {
                filter_builder(key, name, layer, identity::SUBLAYER_BASELINE)
                    .description(description)
                    .weight(WeightClass::Max)
                    .action(FilterAction::Permit)
                    .conditions(conditions)
                    .build()
            })
        };

        if self.endpoints.is_empty() {
            return Ok(vec![
                filter(AddrFamily::Ipv4, 0, vec![])?,
                filter(AddrFamily::Ipv6, 0, vec![])?,
            ]);
        }
        self.endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| {
                filter(
                    AddrFamily::from(endpoint.ip()),
                    index,
                    vec![
                        Condition::remote_ip(endpoint.ip()),
                        Condition::RemotePort(endpoint.port()),
                        Condition::Protocol(Proto::from(endpoint.protocol)),
                    ],
                )
            })
            .collect()
    }
}

/// Permits outbound traffic on a tunnel interface, either to every destination or only to the
/// given endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitVpnTunnel {
    traffic: TunnelTraffic,
}

impl PermitVpnTunnel {
    /// Returns `None` if `traffic` permits nothing, since the rule would install no filters.
    pub fn new(
        interface: InterfaceAlias,
        traffic: &AllowedTunnelTraffic,
        marker: TunnelMarker,
    ) -> Option<Self> {
        TunnelTraffic::new(interface, traffic, marker).map(|traffic| PermitVpnTunnel { traffic })
    }

    pub fn interface(&self) -> &InterfaceAlias {
        &self.traffic.interface
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.traffic.endpoints
    }

    pub fn marker(&self) -> TunnelMarker {
        self.traffic.marker
    }

    pub fn filters(&self) -> Result<Vec<Filter>> {
        let pool = match self.traffic.marker {
            TunnelMarker::Entry => identity::VPN_TUNNEL_ENTRY_POOL,
            TunnelMarker::Exit => identity::VPN_TUNNEL_EXIT_POOL,
        };
        self.traffic.filters(
            Direction::Outbound,
            pool,
            "Permit outbound connections on tunnel interface",
            "This filter is part of a rule that permits communications inside the VPN tunnel",
        )
    }
}

/// The inbound twin of [`PermitVpnTunnel`], for system services that accept connections over the
/// tunnel. Takes the same endpoint constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitVpnTunnelService {
    traffic: TunnelTraffic,
}

impl PermitVpnTunnelService {
    /// Returns `None` if `traffic` permits nothing, since the rule would install no filters.
    pub fn new(
        interface: InterfaceAlias,
        traffic: &AllowedTunnelTraffic,
        marker: TunnelMarker,
    ) -> Option<Self> {
        TunnelTraffic::new(interface, traffic, marker)
            .map(|traffic| PermitVpnTunnelService { traffic })
    }

    pub fn interface(&self) -> &InterfaceAlias {
        &self.traffic.interface
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.traffic.endpoints
    }

    pub fn marker(&self) -> TunnelMarker {
        self.traffic.marker
    }

    pub fn filters(&self) -> Result<Vec<Filter>> {
        let pool = match self.traffic.marker {
            TunnelMarker::Entry => identity::VPN_TUNNEL_SERVICE_ENTRY_POOL,
            TunnelMarker::Exit => identity::VPN_TUNNEL_SERVICE_EXIT_POOL,
        };
        self.traffic.filters(
            Direction::Inbound,
            pool,
            "Permit inbound connections on tunnel interface",
            "This filter is part of a rule that permits system services to communicate inside the VPN tunnel",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportProtocol;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn alias() -> InterfaceAlias {
        InterfaceAlias::new("wg-entry").unwrap()
    }

    #[test]
    fn no_traffic_no_rule() {
        assert!(
            PermitVpnTunnel::new(alias(), &AllowedTunnelTraffic::None, TunnelMarker::Entry)
                .is_none()
        );
        assert!(PermitVpnTunnelService::new(
            alias(),
            &AllowedTunnelTraffic::None,
            TunnelMarker::Exit
        )
        .is_none());
    }

    #[test]
    fn all_traffic_has_no_endpoint_restriction() {
        let filters = PermitVpnTunnel::new(alias(), &AllowedTunnelTraffic::All, TunnelMarker::Entry)
            .unwrap()
            .filters()
            .unwrap();
        assert_eq!(
            filters.iter().map(Filter::key).collect::<Vec<_>>(),
            vec![
                identity::BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV4_1,
                identity::BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV6_1,
            ]
        );
        for filter in &filters {
            assert_eq!(filter.remote_addresses().count(), 0);
            assert_eq!(filter.interface(), Some(&InterfaceMatch::equal(alias())));
        }
    }

    #[test]
    fn one_endpoint() {
        let endpoint = Endpoint::new(Ipv4Addr::new(10, 64, 0, 1), 51820, TransportProtocol::Udp);
        let filters = PermitVpnTunnelService::new(
            alias(),
            &AllowedTunnelTraffic::One(endpoint),
            TunnelMarker::Exit,
        )
        .unwrap()
        .filters()
        .unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(
            filters[0].key(),
            identity::BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV4_1
        );
        assert_eq!(filters[0].layer(), Layer::AleAuthRecvAcceptV4);
        assert_eq!(
            filters[0].remote_addresses().collect::<Vec<_>>(),
            vec![&ipnetwork::IpNetwork::from(endpoint.ip())]
        );
    }

    #[test]
    fn two_endpoints_use_their_position() {
        let first = Endpoint::new(Ipv4Addr::new(10, 64, 0, 1), 51820, TransportProtocol::Udp);
        let second = Endpoint::new(Ipv6Addr::LOCALHOST, 51820, TransportProtocol::Udp);
        let filters = PermitVpnTunnel::new(
            alias(),
            &AllowedTunnelTraffic::Two(first, second),
            TunnelMarker::Exit,
        )
        .unwrap()
        .filters()
        .unwrap();
        assert_eq!(
            filters.iter().map(Filter::key).collect::<Vec<_>>(),
            vec![
                identity::BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV4_1,
                identity::BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV6_2,
            ]
        );
    }
}
