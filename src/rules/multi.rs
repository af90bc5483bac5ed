// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Rules whose filters may end up in either sublayer.

use crate::identity;
use crate::net::DNS_SERVER_PORT;
use crate::rules::{endpoint_conditions, filter_builder, layer_for, PoolCursor};
use crate::{AllowedEndpoint, Direction, Filter, FilterAction, Result, WeightClass};
use uuid::Uuid;

/// The sublayer a relay's permit filter is installed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelaySublayer {
    Baseline,
    /// Relays listening on the DNS port. They would otherwise be blocked by the DNS sublayer no
    /// matter what the baseline sublayer permits.
    Dns,
}

impl RelaySublayer {
    pub fn for_relay(relay: &AllowedEndpoint) -> Self {
        if relay.endpoint.port() == DNS_SERVER_PORT {
            RelaySublayer::Dns
        } else {
            RelaySublayer::Baseline
        }
    }

    pub fn key(&self) -> Uuid {
        match *self {
            RelaySublayer::Baseline => identity::SUBLAYER_BASELINE,
            RelaySublayer::Dns => identity::SUBLAYER_DNS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    pub endpoint: AllowedEndpoint,
    pub sublayer: RelaySublayer,
}

impl From<AllowedEndpoint> for Relay {
    fn from(endpoint: AllowedEndpoint) -> Self {
        Relay {
            sublayer: RelaySublayer::for_relay(&endpoint),
            endpoint,
        }
    }
}

impl From<crate::Endpoint> for Relay {
    fn from(endpoint: crate::Endpoint) -> Self {
        Relay::from(AllowedEndpoint::from(endpoint))
    }
}

/// Permits outbound traffic to VPN relays, optionally only from the given applications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitVpnRelay {
    relays: Vec<Relay>,
}

impl PermitVpnRelay {
    pub fn new(relays: Vec<Relay>) -> Self {
        PermitVpnRelay { relays }
    }

    pub fn relays(&self) -> &[Relay] {
        &self.relays
    }

    pub fn filters(&self) -> Result<Vec<Filter>> {
        let mut keys = PoolCursor::new(identity::VPN_RELAY_POOL);
        self.relays
            .iter()
            .map(|relay| -> Result<Filter> {
                let endpoint = &relay.endpoint.endpoint;
                filter_builder(
                    keys.next(endpoint.ip())?,
                    "Permit outbound connections to VPN relay",
                    layer_for(Direction::Outbound, endpoint.ip()),
                    relay.sublayer.key(),
                )
                .description("This filter is part of a rule that permits communication with a VPN relay")
                .weight(WeightClass::Medium)
                .action(FilterAction::Permit)
                .conditions(endpoint_conditions(
                    endpoint.ip(),
                    endpoint.port(),
                    endpoint.protocol,
                    &relay.endpoint.clients,
                ))
                .build()
            })
            .collect()
    }
}
