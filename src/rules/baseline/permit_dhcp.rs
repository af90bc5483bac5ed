// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::identity;
use crate::rules::filter_builder;
use crate::{Condition, Filter, FilterAction, Layer, Proto, Result, WeightClass};
use uuid::Uuid;

use std::net::{Ipv4Addr, Ipv6Addr};

const DHCPV4_CLIENT_PORT: u16 = 68;
const DHCPV4_SERVER_PORT: u16 = 67;
const DHCPV6_CLIENT_PORT: u16 = 546;
const DHCPV6_SERVER_PORT: u16 = 547;

/// All_DHCP_Relay_Agents_and_Servers
const DHCPV6_SERVERS_LINK: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2);
/// All_DHCP_Servers
const DHCPV6_SERVERS_SITE: Ipv6Addr = Ipv6Addr::new(0xff05, 0, 0, 0, 0, 0, 1, 3);

/// Permits this host to act as a DHCP client, for both DHCPv4 and DHCPv6.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermitDhcp;

impl PermitDhcp {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        let description = "This filter is part of a rule that permits DHCP client traffic";
        let filter = |key: Uuid, name: &str, layer: Layer, conditions: Vec<Condition>| {
            filter_builder(key, name, layer, identity::SUBLAYER_BASELINE)
                .description(description)
                .weight(WeightClass::Max)
                .action(FilterAction::Permit)
                .conditions(conditions)
                .build()
        };

        Ok(vec![
            filter(
                identity::BASELINE_PERMIT_DHCP_OUTBOUND_REQUEST_IPV4,
                "Permit outbound DHCP requests (IPv4)",
                Layer::AleAuthConnectV4,
                vec![
                    Condition::Protocol(Proto::Udp),
                    Condition::LocalPort(DHCPV4_CLIENT_PORT),
                    Condition::remote_ip(Ipv4Addr::BROADCAST),
                    Condition::RemotePort(DHCPV4_SERVER_PORT),
                ],
            )?,
            filter(
                identity::BASELINE_PERMIT_DHCP_INBOUND_RESPONSE_IPV4,
                "Permit inbound DHCP responses (IPv4)",
                Layer::AleAuthRecvAcceptV4,
                vec![
                    Condition::Protocol(Proto::Udp),
                    Condition::LocalPort(DHCPV4_CLIENT_PORT),
                    Condition::RemotePort(DHCPV4_SERVER_PORT),
                ],
            )?,
            filter(
                identity::BASELINE_PERMIT_DHCP_OUTBOUND_REQUEST_IPV6,
                "Permit outbound DHCP requests (IPv6)",
                Layer::AleAuthConnectV6,
                vec![
                    Condition::Protocol(Proto::Udp),
                    Condition::LocalPort(DHCPV6_CLIENT_PORT),
                    Condition::remote_ip(DHCPV6_SERVERS_LINK),
                    Condition::remote_ip(DHCPV6_SERVERS_SITE),
                    Condition::RemotePort(DHCPV6_SERVER_PORT),
                ],
            )?,
            filter(
                identity::BASELINE_PERMIT_DHCP_INBOUND_RESPONSE_IPV6,
                "Permit inbound DHCP responses (IPv6)",
                Layer::AleAuthRecvAcceptV6,
                vec![
                    Condition::Protocol(Proto::Udp),
                    Condition::RemoteAddress(crate::net::LINK_LOCAL_NET_V6),
                    Condition::LocalPort(DHCPV6_CLIENT_PORT),
                    Condition::RemotePort(DHCPV6_SERVER_PORT),
                ],
            )?,
        ])
    }
}

/// Address families a DHCP server may be permitted for. Only DHCPv4 is supported.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DhcpServerExtent {
    #[default]
    Ipv4Only,
}

/// Permits this host to act as a DHCP server, e.g. when sharing its connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermitDhcpServer {
    extent: DhcpServerExtent,
}

impl PermitDhcpServer {
    pub fn ipv4_only() -> Self {
        PermitDhcpServer {
            extent: DhcpServerExtent::Ipv4Only,
        }
    }

    pub fn filters(&self) -> Result<Vec<Filter>> {
        match self.extent {
            DhcpServerExtent::Ipv4Only => Self::ipv4_filters(),
        }
    }

    fn ipv4_filters() -> Result<Vec<Filter>> {
        let description = "This filter is part of a rule that permits DHCP server traffic";
        let conditions = vec![
            Condition::Protocol(Proto::Udp),
            Condition::LocalPort(DHCPV4_SERVER_PORT),
            Condition::RemotePort(DHCPV4_CLIENT_PORT),
        ];
        Ok(vec![
            filter_builder(
                identity::BASELINE_PERMIT_DHCP_SERVER_INBOUND_REQUEST_IPV4,
                "Permit inbound DHCP requests (IPv4)",
                Layer::AleAuthRecvAcceptV4,
                identity::SUBLAYER_BASELINE,
            )
            .description(description)
            .weight(WeightClass::Max)
            .action(FilterAction::Permit)
            .conditions(conditions.clone())
            .build()?,
            filter_builder(
                identity::BASELINE_PERMIT_DHCP_SERVER_OUTBOUND_RESPONSE_IPV4,
                "Permit outbound DHCP responses (IPv4)",
                Layer::AleAuthConnectV4,
                identity::SUBLAYER_BASELINE,
            )
            .description(description)
            .weight(WeightClass::Max)
            .action(FilterAction::Permit)
            .conditions(conditions)
            .build()?,
        ])
    }
}
