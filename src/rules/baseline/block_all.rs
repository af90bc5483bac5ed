// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::identity;
use crate::rules::filter_builder;
use crate::{Filter, FilterAction, Layer, Result, WeightClass};

/// Blocks all traffic in both directions. Everything else in the baseline sublayer is an
/// exception to this rule.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockAll;

impl BlockAll {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        [
            (
                identity::BASELINE_BLOCK_ALL_OUTBOUND_IPV4,
                "Block all outbound connections (IPv4)",
                Layer::AleAuthConnectV4,
            ),
            (
                identity::BASELINE_BLOCK_ALL_INBOUND_IPV4,
                "Block all inbound connections (IPv4)",
                Layer::AleAuthRecvAcceptV4,
            ),
            (
                identity::BASELINE_BLOCK_ALL_OUTBOUND_IPV6,
                "Block all outbound connections (IPv6)",
                Layer::AleAuthConnectV6,
            ),
            (
                identity::BASELINE_BLOCK_ALL_INBOUND_IPV6,
                "Block all inbound connections (IPv6)",
                Layer::AleAuthRecvAcceptV6,
            ),
        ]
        .into_iter()
        .map(|(key, name, layer)| {
            filter_builder(key, name, layer, identity::SUBLAYER_BASELINE)
                .description("This filter is part of a rule that restricts inbound and outbound traffic")
                .weight(WeightClass::Min)
                .action(FilterAction::Block)
                .build()
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_every_layer() {
        let filters = BlockAll.filters().unwrap();
        assert_eq!(filters.len(), 4);
        for filter in &filters {
            assert_eq!(filter.action(), FilterAction::Block);
            assert_eq!(filter.weight(), WeightClass::Min);
            assert_eq!(filter.sublayer(), identity::SUBLAYER_BASELINE);
            assert!(filter.conditions().is_empty());
        }
    }
}
