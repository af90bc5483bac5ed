// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::identity;
use crate::rules::{endpoint_conditions, filter_builder, layer_for, PoolCursor};
use crate::{AllowedEndpoint, Direction, Filter, FilterAction, Result, WeightClass};

/// Permits outbound traffic to explicitly allowed endpoints, such as the API used to fetch the
/// relay list, while everything else is blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitEndpoint {
    endpoints: Vec<AllowedEndpoint>,
}

impl PermitEndpoint {
    pub fn new(endpoints: Vec<AllowedEndpoint>) -> Self {
        PermitEndpoint { endpoints }
    }

    pub fn endpoints(&self) -> &[AllowedEndpoint] {
        &self.endpoints
    }

    pub fn filters(&self) -> Result<Vec<Filter>> {
        let mut keys = PoolCursor::new(identity::ENDPOINT_POOL);
        self.endpoints
            .iter()
            .map(|allowed| -> Result<Filter> {
                let endpoint = &allowed.endpoint;
                filter_builder(
                    keys.next(endpoint.ip())?,
                    "Permit outbound connections to allowed endpoint",
                    layer_for(Direction::Outbound, endpoint.ip()),
                    identity::SUBLAYER_BASELINE,
                )
                .description("This filter is part of a rule that permits traffic to a specific endpoint")
                .weight(WeightClass::Max)
                .action(FilterAction::Permit)
                .conditions(endpoint_conditions(
                    endpoint.ip(),
                    endpoint.port(),
                    endpoint.protocol,
                    &allowed.clients,
                ))
                .build()
            })
            .collect()
    }
}
