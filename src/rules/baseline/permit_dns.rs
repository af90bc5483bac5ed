// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::identity;
use crate::net::DNS_SERVER_PORT;
use crate::rules::filter_builder;
use crate::{Condition, Filter, FilterAction, Layer, Result, WeightClass};

/// Lets DNS traffic pass the baseline sublayer, leaving the verdict to the DNS sublayer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermitDns;

impl PermitDns {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        [
            (
                identity::BASELINE_PERMIT_DNS_OUTBOUND_IPV4,
                "Permit outbound DNS (IPv4)",
                Layer::AleAuthConnectV4,
            ),
            (
                identity::BASELINE_PERMIT_DNS_OUTBOUND_IPV6,
                "Permit outbound DNS (IPv6)",
                Layer::AleAuthConnectV6,
            ),
        ]
        .into_iter()
        .map(|(key, name, layer)| {
            filter_builder(key, name, layer, identity::SUBLAYER_BASELINE)
                .description("This filter is part of a rule that defers DNS decisions to the DNS sublayer")
                .weight(WeightClass::Max)
                .action(FilterAction::Permit)
                .conditions(vec![Condition::RemotePort(DNS_SERVER_PORT)])
                .build()
        })
        .collect()
    }
}
