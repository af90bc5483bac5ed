// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The structural objects that have to exist in the filtering engine before any filter can be
//! installed.

use crate::identity;
use crate::{Provider, Sublayer};

pub fn provider() -> Provider {
    Provider {
        key: identity::PROVIDER,
        name: "Mullvad VPN",
        description: "Mullvad VPN firewall integration",
        persistent: false,
    }
}

pub fn provider_persistent() -> Provider {
    Provider {
        key: identity::PROVIDER_PERSISTENT,
        name: "Mullvad VPN persistent",
        description: "Mullvad VPN firewall integration",
        persistent: true,
    }
}

/// Sublayer of all general traffic. It has the highest possible weight so it is consulted before
/// any other sublayer.
pub fn sublayer_baseline() -> Sublayer {
    Sublayer {
        key: identity::SUBLAYER_BASELINE,
        name: "Mullvad VPN baseline",
        description: "Filters that enforce a good baseline",
        provider: identity::PROVIDER,
        weight: u16::MAX,
        persistent: false,
    }
}

/// Sublayer that exclusively controls DNS traffic, evaluated just after the baseline sublayer.
pub fn sublayer_dns() -> Sublayer {
    Sublayer {
        key: identity::SUBLAYER_DNS,
        name: "Mullvad VPN DNS",
        description: "Filters that restrict DNS traffic",
        provider: identity::PROVIDER,
        weight: u16::MAX - 1,
        persistent: false,
    }
}

pub fn sublayer_persistent() -> Sublayer {
    Sublayer {
        key: identity::SUBLAYER_PERSISTENT,
        name: "Mullvad VPN persistent",
        description: "Filters that restrict traffic before the VPN service has started",
        provider: identity::PROVIDER_PERSISTENT,
        weight: u16::MAX,
        persistent: true,
    }
}
