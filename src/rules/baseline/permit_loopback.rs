// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::identity;
use crate::rules::filter_builder;
use crate::{Condition, Filter, FilterAction, Layer, Result, WeightClass};

/// Permits all traffic on loopback interfaces.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermitLoopback;

impl PermitLoopback {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        [
            (
                identity::BASELINE_PERMIT_LOOPBACK_OUTBOUND_IPV4,
                "Permit outbound on loopback (IPv4)",
                Layer::AleAuthConnectV4,
            ),
            (
                identity::BASELINE_PERMIT_LOOPBACK_INBOUND_IPV4,
                "Permit inbound on loopback (IPv4)",
                Layer::AleAuthRecvAcceptV4,
            ),
            (
                identity::BASELINE_PERMIT_LOOPBACK_OUTBOUND_IPV6,
                "Permit outbound on loopback (IPv6)",
                Layer::AleAuthConnectV6,
            ),
            (
                identity::BASELINE_PERMIT_LOOPBACK_INBOUND_IPV6,
                "Permit inbound on loopback (IPv6)",
                Layer::AleAuthRecvAcceptV6,
            ),
        ]
        .into_iter()
        .map(|(key, name, layer)| {
            filter_builder(key, name, layer, identity::SUBLAYER_BASELINE)
                .description("This filter is part of a rule that permits all loopback traffic")
                .weight(WeightClass::Max)
                .action(FilterAction::Permit)
                .conditions(vec![Condition::Loopback])
                .build()
        })
        .collect()
    }
}
