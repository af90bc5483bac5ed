// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{Error, Result};
use uuid::Uuid;

mod action;
pub use self::action::*;

mod addr_family;
pub use self::addr_family::*;

mod condition;
pub use self::condition::*;

mod direction;
pub use self::direction::*;

mod interface;
pub use self::interface::*;

mod layer;
pub use self::layer::*;

mod proto;
pub use self::proto::*;

mod weight;
pub use self::weight::*;

/// Owner of every object this crate installs. Removing objects by provider is how the engine
/// tells our objects apart from everybody else's.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Provider {
    pub key: Uuid,
    pub name: &'static str,
    pub description: &'static str,
    /// Survives a restart of the filtering engine.
    pub persistent: bool,
}

/// Priority bucket of filters. Sublayers with a higher weight are evaluated first, so a permit in
/// a heavier sublayer is not enough on its own to let traffic through a block in another one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sublayer {
    pub key: Uuid,
    pub name: &'static str,
    pub description: &'static str,
    pub provider: Uuid,
    pub weight: u16,
    pub persistent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[derive(derive_builder::Builder)]
#[builder(setter(into))]
#[builder(build_fn(name = "build_internal"))]
pub struct Filter {
    key: Uuid,
    name: String,
    #[builder(default)]
    description: String,
    #[builder(default = "crate::identity::PROVIDER")]
    provider: Uuid,
    layer: Layer,
    sublayer: Uuid,
    #[builder(default)]
    weight: WeightClass,
    action: FilterAction,
    #[builder(default)]
    conditions: Vec<Condition>,
    #[builder(default)]
    persistent: bool,
    /// Enforced while the system boots, before the engine has loaded persistent objects.
    #[builder(default)]
    boottime: bool,
}

impl FilterBuilder {
    pub fn build(&self) -> Result<Filter> {
        let filter = self
            .build_internal()
            .map_err(|e| Error::InvalidFilter(e.to_string()))?;
        filter.validate_af()?;
        Ok(filter)
    }
}

impl Filter {
    pub fn key(&self) -> Uuid {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn provider(&self) -> Uuid {
        self.provider
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn sublayer(&self) -> Uuid {
        self.sublayer
    }

    pub fn weight(&self) -> WeightClass {
        self.weight
    }

    pub fn action(&self) -> FilterAction {
        self.action
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    pub fn boottime(&self) -> bool {
        self.boottime
    }

    /// Remote networks this filter is restricted to. Empty if any remote address matches.
    pub fn remote_addresses(&self) -> impl Iterator<Item = &ipnetwork::IpNetwork> {
        self.conditions.iter().filter_map(|condition| match condition {
            Condition::RemoteAddress(network) => Some(network),
            _ => None,
        })
    }

    /// The interface condition of this filter, if any.
    pub fn interface(&self) -> Option<&InterfaceMatch> {
        self.conditions.iter().find_map(|condition| match condition {
            Condition::Interface(interface) => Some(interface),
            _ => None,
        })
    }

    /// Every condition must be valid in the address family of the layer.
    fn validate_af(&self) -> Result<()> {
        let layer_af = self.layer.af();
        for condition in &self.conditions {
            let condition_af = condition.get_af();
            if layer_af.compatible(condition_af).is_none() {
                return Err(Error::InvalidFilter(format!(
                    "AddrFamily {} of layer {} and {} of condition {:?} are incompatible",
                    layer_af, self.layer, condition_af, condition
                )));
            }
        }
        Ok(())
    }
}
