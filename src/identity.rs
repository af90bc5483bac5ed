// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Identifier Registry. Every object this crate may ever install in the filtering engine has a
//! stable identifier declared here. An identifier that has shipped must never be reused for a
//! semantically different object: upgrades depend on being able to find and remove what older
//! versions installed.

use crate::{AddrFamily, Error, Result};
use uuid::Uuid;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// The kind of engine object an identifier belongs to. Objects are removed in reverse order of
/// this enum, since filters reference sublayers which reference providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Provider,
    Sublayer,
    Filter,
}

bitflags::bitflags! {
    /// Selects which identifiers, beyond the current session-scoped ones, a registry lookup
    /// should include.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IdentityQualifier: u32 {
        /// Identifiers used by earlier versions. Needed to clean up after an upgrade.
        const INCLUDE_DEPRECATED = 0x01;
        /// Identifiers of objects that survive a restart of the filtering engine.
        const INCLUDE_PERSISTENT = 0x02;
    }
}

identifiers!(SESSION_PROVIDERS: Provider {
    PROVIDER = 0xc736d993_9447_4982_8dd1_eee10461ef3c,
});

identifiers!(PERSISTENT_PROVIDERS: Provider {
    PROVIDER_PERSISTENT = 0x26646a94_c70a_47a3_ac66_114bacfa556a,
});

identifiers!(SESSION_SUBLAYERS: Sublayer {
    SUBLAYER_BASELINE = 0x25a0d4a1_5fd3_4d32_9252_34a7b47a7d2e,
    SUBLAYER_DNS = 0x3fdec7aa_9cf9_4f8b_980f_8aade8ba0dc6,
});

identifiers!(PERSISTENT_SUBLAYERS: Sublayer {
    SUBLAYER_PERSISTENT = 0x7f81ab43_6f94_4772_b3d2_17db757bbe3b,
});

identifiers!(SESSION_FILTERS: Filter {
    BASELINE_BLOCK_ALL_OUTBOUND_IPV4 = 0x57ae8f49_2583_4d3e_8ab7_66a9bcbc8866,
    BASELINE_BLOCK_ALL_INBOUND_IPV4 = 0xb0e82d34_2534_4b58_b6ff_7e7ae7ead7a4,
    BASELINE_BLOCK_ALL_OUTBOUND_IPV6 = 0x02fe62ff_68a1_453b_ae36_97eaf87c15dc,
    BASELINE_BLOCK_ALL_INBOUND_IPV6 = 0xc5275e0a_21b7_4f80_8866_ffea23aef600,

    BASELINE_PERMIT_LAN_OUTBOUND_IPV4 = 0x743dc4e9_052f_4215_aa4a_f9417f3d31ec,
    BASELINE_PERMIT_LAN_OUTBOUND_MULTICAST_IPV4 = 0xb0131301_4967_4ee0_adf3_36f2e13118a7,
    BASELINE_PERMIT_LAN_OUTBOUND_IPV6 = 0x031fa5de_bd10_440e_b387_41f30a52fc5d,
    BASELINE_PERMIT_LAN_OUTBOUND_MULTICAST_IPV6 = 0x70d3e5df_9d56_4242_8a69_75304d58028d,
    BASELINE_PERMIT_LAN_SERVICE_INBOUND_IPV4 = 0x8dc88a9f_a6d7_4c10_8143_f38ff4a463d6,
    BASELINE_PERMIT_LAN_SERVICE_INBOUND_IPV6 = 0xb3f7bf6d_0250_4a80_a9b8_2126e3169626,

    BASELINE_PERMIT_LOOPBACK_OUTBOUND_IPV4 = 0x4c62148b_d5a7_4981_ab93_adea54d7d191,
    BASELINE_PERMIT_LOOPBACK_INBOUND_IPV4 = 0xdf187b6e_ce45_4653_841a_f80401c9db00,
    BASELINE_PERMIT_LOOPBACK_OUTBOUND_IPV6 = 0xd9199d45_bc8d_4935_9a36_7fc52afb3cf8,
    BASELINE_PERMIT_LOOPBACK_INBOUND_IPV6 = 0xbbec26d8_7f2e_4141_bb51_bbb4c9fa7292,

    BASELINE_PERMIT_DHCP_OUTBOUND_REQUEST_IPV4 = 0x4fc8eec2_c8cb_4b6f_a9ec_4b0255e0f676,
    BASELINE_PERMIT_DHCP_INBOUND_RESPONSE_IPV4 = 0x577c6d56_ef10_4ada_8ab6_bb22c7badf42,
    BASELINE_PERMIT_DHCP_OUTBOUND_REQUEST_IPV6 = 0x5d91a7c0_a9a9_43c7_a95f_b8733c14f8d7,
    BASELINE_PERMIT_DHCP_INBOUND_RESPONSE_IPV6 = 0x5cfe4773_a8dc_4770_a0ae_b58478511d8c,
    BASELINE_PERMIT_DHCP_SERVER_INBOUND_REQUEST_IPV4 = 0xc7fac6e7_e33e_48cc_96ca_7684e1b5f134,
    BASELINE_PERMIT_DHCP_SERVER_OUTBOUND_RESPONSE_IPV4 = 0x84fa25b6_9f4f_416d_bcd5_7cb5932cd088,

    BASELINE_PERMIT_VPN_RELAY_IPV4_1 = 0x93e92e50_fa3f_45d9_b576_8ab1233269a3,
    BASELINE_PERMIT_VPN_RELAY_IPV4_2 = 0x1f484d78_f9b8_43c1_9930_883ef830431f,
    BASELINE_PERMIT_VPN_RELAY_IPV6_1 = 0x2e0d95d2_530e_4d35_9ba8_50458b971b46,
    BASELINE_PERMIT_VPN_RELAY_IPV6_2 = 0xa9893597_4fca_49bc_99a1_ed3fc44dea82,

    BASELINE_PERMIT_ENDPOINT_IPV4_1 = 0xaf5716aa_d4e4_4e3e_9e85_e53ab4479338,
    BASELINE_PERMIT_ENDPOINT_IPV6_1 = 0xc88c848f_2df9_4908_944d_de550cad325e,
    BASELINE_PERMIT_ENDPOINT_IPV4_2 = 0x1f1d87ec_6022_48c9_bdaa_224c428e30c0,
    BASELINE_PERMIT_ENDPOINT_IPV6_2 = 0xa8777d53_399b_418f_b24f_b03baeabb68e,
    BASELINE_PERMIT_ENDPOINT_IPV4_3 = 0xcfda4531_279d_4f4f_989c_93fb7c1c7aed,
    BASELINE_PERMIT_ENDPOINT_IPV6_3 = 0xece12f4d_ea16_4672_a128_43be87a2d9c9,
    BASELINE_PERMIT_ENDPOINT_IPV4_4 = 0x7cb2cba7_af0a_43c8_b86e_86405fbc6352,
    BASELINE_PERMIT_ENDPOINT_IPV6_4 = 0xa6674eda_3aa6_4937_b2dc_fae0b1ae83be,

    BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV4_1 = 0xbcece8d7_2baa_40ce_a7e9_5a4044e24883,
    BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV6_1 = 0x0dbd1d20_112e_4b56_946d_6ab3dab722c9,
    BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV4_2 = 0xdca44438_7942_4215_bd11_30dae8ee0e03,
    BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV6_2 = 0x36862faf_4ac0_4852_95a1_ff314f9f2f5b,
    BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV4_1 = 0xc593d84f_9f07_429a_9b78_ce6cb4249efc,
    BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV6_1 = 0x04a39b8d_03dc_4c93_ae62_e3d6ba4178f3,
    BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV4_2 = 0x67ee5b14_c670_47b7_b6c5_e9ee234c715e,
    BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV6_2 = 0x2c632bdb_f1ab_42c7_a7fe_91ce2df74e9f,
    BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV4_1 = 0x4a83f108_7008_4510_8ee3_900a7495caab,
    BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV6_1 = 0x652e1f33_4e01_4f27_b0b9_74912aa8f110,
    BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV4_2 = 0x0f2f41e9_6403_4a35_b9d0_d1784e400869,
    BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV6_2 = 0xd83633a3_e391_4391_aa85_8186b95dc363,
    BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV4_1 = 0x9d857d88_211d_41dc_8a4c_1bc73474173c,
    BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV6_1 = 0x32798a35_721e_4313_90ef_bc4ce42b00b3,
    BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV4_2 = 0xbd6b5856_5f51_45e9_a4eb_b18202826191,
    BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV6_2 = 0x131e52d0_502d_436f_b1a2_88a979ccbf9f,

    BASELINE_PERMIT_NDP_OUTBOUND_ROUTER_SOLICITATION = 0x755a4486_3cf5_4f5d_9308_ad1a3f4a7de4,
    BASELINE_PERMIT_NDP_INBOUND_ROUTER_ADVERTISEMENT = 0x43c954ba_3739_4762_b3dd_f6fa94b31847,
    BASELINE_PERMIT_NDP_OUTBOUND_NEIGHBOR_SOLICITATION = 0xfea40503_adc7_450c_9b66_5cb0691fdeb4,
    BASELINE_PERMIT_NDP_INBOUND_NEIGHBOR_SOLICITATION = 0x843d33cc_99cb_4e67_a1d3_bd5744efab61,
    BASELINE_PERMIT_NDP_OUTBOUND_NEIGHBOR_ADVERTISEMENT = 0x4c3f711e_d479_4fb2_81d2_1ce3a8d39128,
    BASELINE_PERMIT_NDP_INBOUND_NEIGHBOR_ADVERTISEMENT = 0x1bfba8e5_fbf5_4d81_b7e5_34b211934f7e,
    BASELINE_PERMIT_NDP_INBOUND_REDIRECT = 0xcb455186_0ed9_493c_b023_bb3810a79cf9,

    BASELINE_PERMIT_DNS_OUTBOUND_IPV4 = 0xa1259109_fc57_47f8_8fda_799903d90d39,
    BASELINE_PERMIT_DNS_OUTBOUND_IPV6 = 0xfd90a07d_a244_4faf_bd6d_26b97e9b2893,

    DNS_BLOCK_ALL_OUTBOUND_IPV4 = 0x6da3ad59_4217_42f8_a08d_016a76feb2bd,
    DNS_BLOCK_ALL_OUTBOUND_IPV6 = 0x067b590e_7845_4b87_a970_c7ae847a386a,
    DNS_PERMIT_NON_TUNNEL_OUTBOUND_IPV4 = 0x69dcb3d4_fa52_43a5_b219_80ca48af4c5c,
    DNS_PERMIT_NON_TUNNEL_OUTBOUND_IPV6 = 0xe4cbcf1f_cebc_44f9_84ca_e05a86c371ad,
    DNS_PERMIT_TUNNEL_OUTBOUND_IPV4 = 0xc0b4407b_0ece_4c0b_a333_84f68bae3e37,
    DNS_PERMIT_TUNNEL_OUTBOUND_IPV6 = 0xc59e6976_212e_4233_93c2_c51f941d7d65,
    DNS_PERMIT_LOOPBACK_OUTBOUND_IPV4 = 0xa9a29810_61a4_4331_a441_a20f51d2b45a,
    DNS_PERMIT_LOOPBACK_OUTBOUND_IPV6 = 0x3ed5ba1d_c39d_431a_8d51_85e915eba7fa,
});

identifiers!(PERSISTENT_FILTERS: Filter {
    BOOTTIME_BLOCK_ALL_OUTBOUND_IPV4 = 0xc862565b_ee75_4065_9a92_5d72a6569b28,
    BOOTTIME_BLOCK_ALL_INBOUND_IPV4 = 0x71881e3a_d74a_45ad_b983_fb5bfedecf62,
    BOOTTIME_BLOCK_ALL_OUTBOUND_IPV6 = 0x107b140f_0195_473a_b308_611b77d0600b,
    BOOTTIME_BLOCK_ALL_INBOUND_IPV6 = 0xfa8db319_85bc_458d_98ff_f9071f0d69bb,
    PERSISTENT_BLOCK_ALL_OUTBOUND_IPV4 = 0xe94f85e6_0c56_4ee5_bc63_eee0ab759a37,
    PERSISTENT_BLOCK_ALL_INBOUND_IPV4 = 0xf5c393b1_bfb6_4845_9618_968984a6a389,
    PERSISTENT_BLOCK_ALL_OUTBOUND_IPV6 = 0x3b8f4102_5cdd_41f4_9e7e_fe776bf42260,
    PERSISTENT_BLOCK_ALL_INBOUND_IPV6 = 0xf09e4128_b482_4853_9235_fdf43c1ed314,
});

/// Identifiers that were in use in previous versions. Upgrades fail to remove our sublayers if
/// they still hold filters nothing knows about, so retired identifiers go here.
const DEPRECATED: &[(ObjectKind, Uuid)] = &[];

/// Returns every registered identifier matching `qualifier`, grouped by object kind. Pure: the
/// same qualifier always yields the same registry.
pub fn detailed_registry(qualifier: IdentityQualifier) -> BTreeMap<ObjectKind, Vec<Uuid>> {
    let mut tables = Vec::new();
    if qualifier.contains(IdentityQualifier::INCLUDE_DEPRECATED) {
        tables.push(DEPRECATED);
    }
    tables.extend([SESSION_PROVIDERS, SESSION_SUBLAYERS, SESSION_FILTERS]);
    if qualifier.contains(IdentityQualifier::INCLUDE_PERSISTENT) {
        tables.extend([PERSISTENT_PROVIDERS, PERSISTENT_SUBLAYERS, PERSISTENT_FILTERS]);
    }

    let mut registry: BTreeMap<ObjectKind, Vec<Uuid>> = BTreeMap::new();
    for &(kind, key) in tables.into_iter().flatten() {
        registry.entry(kind).or_default().push(key);
    }
    registry
}

/// Returns every registered identifier matching `qualifier` as a flat set.
pub fn registry(qualifier: IdentityQualifier) -> HashSet<Uuid> {
    detailed_registry(qualifier)
        .into_values()
        .flatten()
        .collect()
}

/// Rules that can install several instances of the same logical filter draw their identifiers
/// from a fixed pool per address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    VpnRelay,
    Endpoint,
    VpnTunnelEntry,
    VpnTunnelExit,
    VpnTunnelServiceEntry,
    VpnTunnelServiceExit,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PoolKind::VpnRelay => "VPN relay",
            PoolKind::Endpoint => "allowed endpoint",
            PoolKind::VpnTunnelEntry => "entry tunnel",
            PoolKind::VpnTunnelExit => "exit tunnel",
            PoolKind::VpnTunnelServiceEntry => "entry tunnel service",
            PoolKind::VpnTunnelServiceExit => "exit tunnel service",
        }
        .fmt(f)
    }
}

/// A fixed set of identifiers for one pooled rule, keyed by address family and instance index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierPool {
    kind: PoolKind,
    ipv4: &'static [Uuid],
    ipv6: &'static [Uuid],
}

impl IdentifierPool {
    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Number of instances the pool can identify per address family.
    pub fn capacity(&self, family: AddrFamily) -> usize {
        match family {
            AddrFamily::Ipv4 => self.ipv4.len(),
            AddrFamily::Ipv6 => self.ipv6.len(),
            AddrFamily::Any => 0,
        }
    }

    /// Returns the identifier of instance `index` in `family`. Fails with `PoolExhausted` rather
    /// than handing out an identifier that belongs to something else.
    pub fn get(&self, family: AddrFamily, index: usize) -> Result<Uuid> {
        let slots = match family {
            AddrFamily::Ipv4 => self.ipv4,
            AddrFamily::Ipv6 => self.ipv6,
            AddrFamily::Any => {
                return Err(Error::InvalidArgument(
                    "Pooled identifiers require an address family",
                ))
            }
        };
        slots.get(index).copied().ok_or(Error::PoolExhausted {
            pool: self.kind,
            family,
            capacity: slots.len(),
        })
    }
}

pub const VPN_RELAY_POOL: IdentifierPool = IdentifierPool {
    kind: PoolKind::VpnRelay,
    ipv4: &[BASELINE_PERMIT_VPN_RELAY_IPV4_1, BASELINE_PERMIT_VPN_RELAY_IPV4_2],
    ipv6: &[BASELINE_PERMIT_VPN_RELAY_IPV6_1, BASELINE_PERMIT_VPN_RELAY_IPV6_2],
};

pub const ENDPOINT_POOL: IdentifierPool = IdentifierPool {
    kind: PoolKind::Endpoint,
    ipv4: &[
        BASELINE_PERMIT_ENDPOINT_IPV4_1,
        BASELINE_PERMIT_ENDPOINT_IPV4_2,
        BASELINE_PERMIT_ENDPOINT_IPV4_3,
        BASELINE_PERMIT_ENDPOINT_IPV4_4,
    ],
    ipv6: &[
        BASELINE_PERMIT_ENDPOINT_IPV6_1,
        BASELINE_PERMIT_ENDPOINT_IPV6_2,
        BASELINE_PERMIT_ENDPOINT_IPV6_3,
        BASELINE_PERMIT_ENDPOINT_IPV6_4,
    ],
};

pub const VPN_TUNNEL_ENTRY_POOL: IdentifierPool = IdentifierPool {
    kind: PoolKind::VpnTunnelEntry,
    ipv4: &[
        BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV4_1,
        BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV4_2,
    ],
    ipv6: &[
        BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV6_1,
        BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV6_2,
    ],
};

pub const VPN_TUNNEL_EXIT_POOL: IdentifierPool = IdentifierPool {
    kind: PoolKind::VpnTunnelExit,
    ipv4: &[
        BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV4_1,
        BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV4_2,
    ],
    ipv6: &[
        BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV6_1,
        BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV6_2,
    ],
};

pub const VPN_TUNNEL_SERVICE_ENTRY_POOL: IdentifierPool = IdentifierPool {
    kind: PoolKind::VpnTunnelServiceEntry,
    ipv4: &[
        BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV4_1,
        BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV4_2,
    ],
    ipv6: &[
        BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV6_1,
        BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV6_2,
    ],
};

pub const VPN_TUNNEL_SERVICE_EXIT_POOL: IdentifierPool = IdentifierPool {
    kind: PoolKind::VpnTunnelServiceExit,
    ipv4: &[
        BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV4_1,
        BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV4_2,
    ],
    ipv6: &[
        BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV6_1,
        BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV6_2,
    ],
};
