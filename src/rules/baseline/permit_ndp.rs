// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::identity;
use crate::net::LINK_LOCAL_NET_V6;
use crate::rules::filter_builder;
use crate::{Condition, Filter, FilterAction, Layer, Proto, Result, WeightClass};

use std::net::Ipv6Addr;

const ROUTER_SOLICITATION: u8 = 133;
const ROUTER_ADVERTISEMENT: u8 = 134;
const NEIGHBOR_SOLICITATION: u8 = 135;
const NEIGHBOR_ADVERTISEMENT: u8 = 136;
const REDIRECT: u8 = 137;

/// All routers on the link.
const ALL_ROUTERS_LINK: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

/// Permits the subset of ICMPv6 the Neighbor Discovery Protocol needs. IPv6 does not work on the
/// local link without it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermitNdp;

impl PermitNdp {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        [
            (
                identity::BASELINE_PERMIT_NDP_OUTBOUND_ROUTER_SOLICITATION,
                "Permit outbound NDP router solicitation",
                Layer::AleAuthConnectV6,
                ROUTER_SOLICITATION,
                Some(Condition::remote_ip(ALL_ROUTERS_LINK)),
            ),
            (
                identity::BASELINE_PERMIT_NDP_INBOUND_ROUTER_ADVERTISEMENT,
                "Permit inbound NDP router advertisement",
                Layer::AleAuthRecvAcceptV6,
                ROUTER_ADVERTISEMENT,
                Some(Condition::RemoteAddress(LINK_LOCAL_NET_V6)),
            ),
            (
                identity::BASELINE_PERMIT_NDP_OUTBOUND_NEIGHBOR_SOLICITATION,
                "Permit outbound NDP neighbor solicitation",
                Layer::AleAuthConnectV6,
                NEIGHBOR_SOLICITATION,
                None,
            ),
            (
                identity::BASELINE_PERMIT_NDP_INBOUND_NEIGHBOR_SOLICITATION,
                "Permit inbound NDP neighbor solicitation",
                Layer::AleAuthRecvAcceptV6,
                NEIGHBOR_SOLICITATION,
                None,
            ),
            (
                identity::BASELINE_PERMIT_NDP_OUTBOUND_NEIGHBOR_ADVERTISEMENT,
                "Permit outbound NDP neighbor advertisement",
                Layer::AleAuthConnectV6,
                NEIGHBOR_ADVERTISEMENT,
                None,
            ),
            (
                identity::BASELINE_PERMIT_NDP_INBOUND_NEIGHBOR_ADVERTISEMENT,
                "Permit inbound NDP neighbor advertisement",
                Layer::AleAuthRecvAcceptV6,
                NEIGHBOR_ADVERTISEMENT,
                None,
            ),
            (
                identity::BASELINE_PERMIT_NDP_INBOUND_REDIRECT,
                "Permit inbound NDP redirect",
                Layer::AleAuthRecvAcceptV6,
                REDIRECT,
                Some(Condition::RemoteAddress(LINK_LOCAL_NET_V6)),
            ),
        ]
        .into_iter()
        .map(|(key, name, layer, icmp_type, remote)| {
            let mut conditions = vec![
                Condition::Protocol(Proto::IcmpV6),
                Condition::IcmpType(icmp_type),
            ];
            conditions.extend(remote);
            filter_builder(key, name, layer, identity::SUBLAYER_BASELINE)
                .description("This filter is part of a rule that permits NDP traffic")
                .weight(WeightClass::Max)
                .action(FilterAction::Permit)
                .conditions(conditions)
                .build()
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    #[test]
    fn ndp_filters() {
        let filters = PermitNdp.filters().unwrap();
        assert_eq!(filters.len(), 7);
        let outbound = filters
            .iter()
            .filter(|filter| filter.layer().direction() == Direction::Outbound)
            .count();
        assert_eq!(outbound, 3);
        assert!(filters.iter().all(|filter| filter
            .conditions()
            .contains(&Condition::Protocol(Proto::IcmpV6))));
    }
}
