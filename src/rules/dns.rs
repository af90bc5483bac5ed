// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Rules installed in the DNS sublayer. All DNS traffic is blocked there, except to the
//! resolvers these rules carve out.

use crate::identity;
use crate::net::DNS_SERVER_PORT;
use crate::rules::filter_builder;
use crate::{
    Condition, Filter, FilterAction, InterfaceAlias, InterfaceMatch, Layer, Result, WeightClass,
};
use uuid::Uuid;

use std::net::IpAddr;

const OUTBOUND_LAYERS: [(Layer, &str); 2] = [
    (Layer::AleAuthConnectV4, "IPv4"),
    (Layer::AleAuthConnectV6, "IPv6"),
];

/// Blocks all outbound DNS.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockAll;

impl BlockAll {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        [
            identity::DNS_BLOCK_ALL_OUTBOUND_IPV4,
            identity::DNS_BLOCK_ALL_OUTBOUND_IPV6,
        ]
        .into_iter()
        .zip(OUTBOUND_LAYERS)
        .map(|(key, (layer, family))| {
            filter_builder(
                key,
                &format!("Block outbound DNS ({family})"),
                layer,
                identity::SUBLAYER_DNS,
            )
            .description("This filter is part of a rule that restricts DNS traffic")
            .weight(WeightClass::Min)
            .action(FilterAction::Block)
            .conditions(vec![Condition::RemotePort(DNS_SERVER_PORT)])
            .build()
        })
        .collect()
    }
}

/// Permits DNS to resolvers on loopback interfaces.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermitLoopback;

impl PermitLoopback {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        [
            identity::DNS_PERMIT_LOOPBACK_OUTBOUND_IPV4,
            identity::DNS_PERMIT_LOOPBACK_OUTBOUND_IPV6,
        ]
        .into_iter()
        .zip(OUTBOUND_LAYERS)
        .map(|(key, (layer, family))| {
            filter_builder(
                key,
                &format!("Permit DNS on loopback ({family})"),
                layer,
                identity::SUBLAYER_DNS,
            )
            .description("This filter is part of a rule that permits DNS to local resolvers")
            .weight(WeightClass::Max)
            .action(FilterAction::Permit)
            .conditions(vec![
                Condition::Loopback,
                Condition::RemotePort(DNS_SERVER_PORT),
            ])
            .build()
        })
        .collect()
    }
}

/// One permit filter per address family that has servers, matching any of them.
fn permit_servers(
    keys: [Uuid; 2],
    servers: &[IpAddr],
    interface: Option<Condition>,
    name: &str,
    description: &str,
) -> Result<Vec<Filter>> {
    let mut filters = Vec::new();
    for (key, (layer, family)) in keys.into_iter().zip(OUTBOUND_LAYERS) {
        let family_servers: Vec<Condition> = servers
            .iter()
            .filter(|server| crate::AddrFamily::from(**server) == layer.af())
            .map(|server| Condition::remote_ip(*server))
            .collect();
        if family_servers.is_empty() {
            continue;
        }

        let mut conditions = vec![Condition::RemotePort(DNS_SERVER_PORT)];
        conditions.extend(interface.clone());
        conditions.extend(family_servers);
        filters.push(
            filter_builder(
                key,
                &format!("{name} ({family})"),
                layer,
                identity::SUBLAYER_DNS,
            )
            .description(description)
            .weight(WeightClass::Max)
            .action(FilterAction::Permit)
            .conditions(conditions)
            .build()?,
        );
    }
    Ok(filters)
}

/// Permits DNS to the given servers through the tunnel interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitTunnel {
    interface: InterfaceAlias,
    servers: Vec<IpAddr>,
}

impl PermitTunnel {
    pub fn new(interface: InterfaceAlias, servers: Vec<IpAddr>) -> Self {
        PermitTunnel { interface, servers }
    }

    pub fn filters(&self) -> Result<Vec<Filter>> {
        permit_servers(
            [
                identity::DNS_PERMIT_TUNNEL_OUTBOUND_IPV4,
                identity::DNS_PERMIT_TUNNEL_OUTBOUND_IPV6,
            ],
            &self.servers,
            Some(Condition::Interface(InterfaceMatch::equal(
                self.interface.clone(),
            ))),
            "Permit DNS in tunnel",
            "This filter is part of a rule that permits DNS to servers inside the tunnel",
        )
    }
}

/// Permits DNS to the given servers outside the tunnel. When a tunnel interface is given,
/// only traffic leaving through some other interface is permitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitNonTunnel {
    tunnel_interface: Option<InterfaceAlias>,
    servers: Vec<IpAddr>,
}

impl PermitNonTunnel {
    pub fn new(tunnel_interface: Option<InterfaceAlias>, servers: Vec<IpAddr>) -> Self {
        PermitNonTunnel {
            tunnel_interface,
            servers,
        }
    }

    pub fn filters(&self) -> Result<Vec<Filter>> {
        permit_servers(
            [
                identity::DNS_PERMIT_NON_TUNNEL_OUTBOUND_IPV4,
                identity::DNS_PERMIT_NON_TUNNEL_OUTBOUND_IPV6,
            ],
            &self.servers,
            self.tunnel_interface
                .clone()
                .map(|alias| Condition::Interface(InterfaceMatch::not_equal(alias))),
            "Permit DNS outside tunnel",
            "This filter is part of a rule that permits DNS to servers outside the tunnel",
        )
    }
}
