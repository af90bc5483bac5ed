// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::identity;
use crate::net::{
    ALLOWED_LAN_MULTICAST_NETS_V4, ALLOWED_LAN_MULTICAST_NETS_V6, ALLOWED_LAN_NETS_V4,
    ALLOWED_LAN_NETS_V6,
};
use crate::rules::filter_builder;
use crate::{Condition, Filter, FilterAction, Layer, Result, WeightClass};
use ipnetwork::IpNetwork;

fn remote_networks(networks: &[IpNetwork]) -> Vec<Condition> {
    networks.iter().copied().map(Condition::RemoteAddress).collect()
}

/// Permits outbound traffic to private networks, broadcast and non-routable multicast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermitLan;

impl PermitLan {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        [
            (
                identity::BASELINE_PERMIT_LAN_OUTBOUND_IPV4,
                "Permit outbound connections on the LAN (IPv4)",
                Layer::AleAuthConnectV4,
                &ALLOWED_LAN_NETS_V4[..],
            ),
            (
                identity::BASELINE_PERMIT_LAN_OUTBOUND_MULTICAST_IPV4,
                "Permit outbound LAN multicast (IPv4)",
                Layer::AleAuthConnectV4,
                &ALLOWED_LAN_MULTICAST_NETS_V4[..],
            ),
            (
                identity::BASELINE_PERMIT_LAN_OUTBOUND_IPV6,
                "Permit outbound connections on the LAN (IPv6)",
                Layer::AleAuthConnectV6,
                &ALLOWED_LAN_NETS_V6[..],
            ),
            (
                identity::BASELINE_PERMIT_LAN_OUTBOUND_MULTICAST_IPV6,
                "Permit outbound LAN multicast (IPv6)",
                Layer::AleAuthConnectV6,
                &ALLOWED_LAN_MULTICAST_NETS_V6[..],
            ),
        ]
        .into_iter()
        .map(|(key, name, layer, networks)| {
            filter_builder(key, name, layer, identity::SUBLAYER_BASELINE)
                .description("This filter is part of a rule that permits LAN traffic")
                .weight(WeightClass::Max)
                .action(FilterAction::Permit)
                .conditions(remote_networks(networks))
                .build()
        })
        .collect()
    }
}

/// Permits inbound connections from private networks, so services on this host stay reachable
/// on the LAN.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermitLanService;

impl PermitLanService {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        [
            (
                identity::BASELINE_PERMIT_LAN_SERVICE_INBOUND_IPV4,
                "Permit inbound connections on the LAN (IPv4)",
                Layer::AleAuthRecvAcceptV4,
                &ALLOWED_LAN_NETS_V4[..],
            ),
            (
                identity::BASELINE_PERMIT_LAN_SERVICE_INBOUND_IPV6,
                "Permit inbound connections on the LAN (IPv6)",
                Layer::AleAuthRecvAcceptV6,
                &ALLOWED_LAN_NETS_V6[..],
            ),
        ]
        .into_iter()
        .map(|(key, name, layer, networks)| {
            filter_builder(key, name, layer, identity::SUBLAYER_BASELINE)
                .description("This filter is part of a rule that permits hosting services in a LAN environment")
                .weight(WeightClass::Max)
                .action(FilterAction::Permit)
                .conditions(remote_networks(networks))
                .build()
        })
        .collect()
    }
}
