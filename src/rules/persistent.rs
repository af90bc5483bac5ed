// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Rules made of persistent objects, which stay in force after this process exits and across
//! restarts of the filtering engine.

use crate::identity;
use crate::rules::filter_builder;
use crate::{Filter, FilterAction, Layer, Result, WeightClass};

/// Blocks all traffic using the persistent provider and sublayer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockAll;

impl BlockAll {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        [
            (
                identity::PERSISTENT_BLOCK_ALL_OUTBOUND_IPV4,
                "Block all outbound connections (IPv4)",
                Layer::AleAuthConnectV4,
            ),
            (
                identity::PERSISTENT_BLOCK_ALL_INBOUND_IPV4,
                "Block all inbound connections (IPv4)",
                Layer::AleAuthRecvAcceptV4,
            ),
            (
                identity::PERSISTENT_BLOCK_ALL_OUTBOUND_IPV6,
                "Block all outbound connections (IPv6)",
                Layer::AleAuthConnectV6,
            ),
            (
                identity::PERSISTENT_BLOCK_ALL_INBOUND_IPV6,
                "Block all inbound connections (IPv6)",
                Layer::AleAuthRecvAcceptV6,
            ),
        ]
        .into_iter()
        .map(|(key, name, layer)| {
            filter_builder(key, name, layer, identity::SUBLAYER_PERSISTENT)
                .description("This filter is part of a rule that blocks traffic while the VPN service is not running")
                .provider(identity::PROVIDER_PERSISTENT)
                .weight(WeightClass::Min)
                .action(FilterAction::Block)
                .persistent(true)
                .build()
        })
        .collect()
    }
}
