#[macro_use]
#[allow(dead_code)]
mod helper;

use crate::helper::{inspect, TUNNEL_ENTRY, TUNNEL_EXIT};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use winfw::engine::memory::Connection;
use winfw::identity;
use winfw::{
    AllowedEndpoint, AllowedTunnelTraffic, BlockedPolicyBuilder, ConnectedPolicyBuilder,
    ConnectingPolicyBuilder, Endpoint, FilterAction, FirewallController, PolicyState,
    PolicyStatus, Proto, Settings, TransportProtocol, DEFAULT_LOCK_TIMEOUT,
};

fn before_each() {}
fn after_each() {}

const RELAY_IP: Ipv4Addr = Ipv4Addr::new(185, 65, 134, 1);
const TUNNEL_DNS: Ipv4Addr = Ipv4Addr::new(10, 64, 0, 1);
const PUBLIC_DNS: Ipv4Addr = Ipv4Addr::new(9, 9, 9, 9);

fn relay() -> AllowedEndpoint {
    Endpoint::new(RELAY_IP, 51820, TransportProtocol::Udp).into()
}

fn endpoint(last: u8) -> AllowedEndpoint {
    Endpoint::new(Ipv4Addr::new(45, 83, 223, last), 443, TransportProtocol::Tcp).into()
}

test!(connecting_policy_end_to_end(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    assert_eq!(firewall.initialize(DEFAULT_LOCK_TIMEOUT), PolicyStatus::Success);
    assert_eq!(firewall.active_policy(), PolicyState::None);
    assert!(engine.filters().is_empty());

    let policy = ConnectingPolicyBuilder::default()
        .settings(Settings::new(false))
        .relays(vec![relay()])
        .entry_interface(Some(TUNNEL_ENTRY.to_owned()))
        .entry_traffic(AllowedTunnelTraffic::All)
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_connecting(policy), PolicyStatus::Success);
    assert_eq!(firewall.active_policy(), PolicyState::Connecting);

    let expected = BTreeSet::from([
        // Net blocked
        identity::BASELINE_BLOCK_ALL_OUTBOUND_IPV4,
        identity::BASELINE_BLOCK_ALL_INBOUND_IPV4,
        identity::BASELINE_BLOCK_ALL_OUTBOUND_IPV6,
        identity::BASELINE_BLOCK_ALL_INBOUND_IPV6,
        identity::BASELINE_PERMIT_LOOPBACK_OUTBOUND_IPV4,
        identity::BASELINE_PERMIT_LOOPBACK_INBOUND_IPV4,
        identity::BASELINE_PERMIT_LOOPBACK_OUTBOUND_IPV6,
        identity::BASELINE_PERMIT_LOOPBACK_INBOUND_IPV6,
        // DHCP and NDP
        identity::BASELINE_PERMIT_DHCP_OUTBOUND_REQUEST_IPV4,
        identity::BASELINE_PERMIT_DHCP_INBOUND_RESPONSE_IPV4,
        identity::BASELINE_PERMIT_DHCP_OUTBOUND_REQUEST_IPV6,
        identity::BASELINE_PERMIT_DHCP_INBOUND_RESPONSE_IPV6,
        identity::BASELINE_PERMIT_NDP_OUTBOUND_ROUTER_SOLICITATION,
        identity::BASELINE_PERMIT_NDP_INBOUND_ROUTER_ADVERTISEMENT,
        identity::BASELINE_PERMIT_NDP_OUTBOUND_NEIGHBOR_SOLICITATION,
        identity::BASELINE_PERMIT_NDP_INBOUND_NEIGHBOR_SOLICITATION,
        identity::BASELINE_PERMIT_NDP_OUTBOUND_NEIGHBOR_ADVERTISEMENT,
        identity::BASELINE_PERMIT_NDP_INBOUND_NEIGHBOR_ADVERTISEMENT,
        identity::BASELINE_PERMIT_NDP_INBOUND_REDIRECT,
        // DNS
        identity::BASELINE_PERMIT_DNS_OUTBOUND_IPV4,
        identity::BASELINE_PERMIT_DNS_OUTBOUND_IPV6,
        identity::DNS_PERMIT_LOOPBACK_OUTBOUND_IPV4,
        identity::DNS_PERMIT_LOOPBACK_OUTBOUND_IPV6,
        identity::DNS_BLOCK_ALL_OUTBOUND_IPV4,
        identity::DNS_BLOCK_ALL_OUTBOUND_IPV6,
        // Relay and entry tunnel
        identity::BASELINE_PERMIT_VPN_RELAY_IPV4_1,
        identity::BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV4_1,
        identity::BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV6_1,
        identity::BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV4_1,
        identity::BASELINE_PERMIT_VPN_TUNNEL_SERVICE_ENTRY_IPV6_1,
    ]);
    assert_eq!(inspect::filter_keys(&engine), expected);

    let relay_filters = inspect::permits_to(&engine, IpAddr::V4(RELAY_IP));
    assert_eq!(relay_filters.len(), 1);
    assert_eq!(relay_filters[0].sublayer(), identity::SUBLAYER_BASELINE);
    assert_eq!(inspect::remote_port(&relay_filters[0]), Some(51820));

    let tunnel = engine
        .filter(identity::BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV4_1)
        .unwrap();
    assert_eq!(inspect::required_interface(&tunnel), Some(TUNNEL_ENTRY));
    assert_eq!(tunnel.remote_addresses().count(), 0);
});

test!(dns_is_only_decided_by_dns_sublayer(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);

    let policy = ConnectedPolicyBuilder::default()
        .settings(Settings::new(true))
        .relays(vec![relay()])
        .entry_interface(Some(TUNNEL_ENTRY.to_owned()))
        .exit_interface(Some(TUNNEL_EXIT.to_owned()))
        .tunnel_dns_servers(vec![IpAddr::V4(TUNNEL_DNS)])
        .non_tunnel_dns_servers(vec![IpAddr::V4(PUBLIC_DNS)])
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_connected(policy), PolicyStatus::Success);

    // The baseline sublayer hands all port 53 traffic over to the DNS sublayer.
    let dns_passthrough = engine
        .filter(identity::BASELINE_PERMIT_DNS_OUTBOUND_IPV4)
        .unwrap();
    assert_eq!(inspect::remote_port(&dns_passthrough), Some(53));

    let tunnel_dns = engine.filter(identity::DNS_PERMIT_TUNNEL_OUTBOUND_IPV4).unwrap();
    assert_eq!(inspect::required_interface(&tunnel_dns), Some(TUNNEL_EXIT));
    assert!(tunnel_dns.remote_addresses().any(|net| net.ip() == IpAddr::V4(TUNNEL_DNS)));

    let public_dns = engine
        .filter(identity::DNS_PERMIT_NON_TUNNEL_OUTBOUND_IPV4)
        .unwrap();
    assert_eq!(inspect::excluded_interface(&public_dns), Some(TUNNEL_EXIT));
    assert!(public_dns.remote_addresses().any(|net| net.ip() == IpAddr::V4(PUBLIC_DNS)));

    // No IPv6 servers were given.
    assert!(engine.filter(identity::DNS_PERMIT_TUNNEL_OUTBOUND_IPV6).is_none());

    // LAN permits live in the baseline sublayer and therefore can not permit DNS on their own.
    let lan = engine.filter(identity::BASELINE_PERMIT_LAN_OUTBOUND_IPV4).unwrap();
    assert_eq!(lan.sublayer(), identity::SUBLAYER_BASELINE);
    for filter in inspect::filters_in_sublayer(&engine, identity::SUBLAYER_DNS) {
        assert_eq!(inspect::remote_port(&filter), Some(53), "{}", filter.name());
    }

    let router = Ipv4Addr::new(192, 168, 1, 1);
    for (connection, verdict) in [
        (
            Connection::outbound((TUNNEL_DNS, 53), Proto::Udp).on_interface(TUNNEL_EXIT),
            FilterAction::Permit,
        ),
        (
            Connection::outbound((PUBLIC_DNS, 53), Proto::Udp).on_interface(TUNNEL_EXIT),
            FilterAction::Block,
        ),
        (
            Connection::outbound((PUBLIC_DNS, 53), Proto::Udp).on_interface("eth0"),
            FilterAction::Permit,
        ),
        (
            Connection::outbound((router, 53), Proto::Udp).on_interface("eth0"),
            FilterAction::Block,
        ),
        (
            Connection::outbound((router, 80), Proto::Tcp).on_interface("eth0"),
            FilterAction::Permit,
        ),
        (
            Connection::outbound((Ipv4Addr::new(1, 1, 1, 1), 443), Proto::Tcp)
                .on_interface("eth0"),
            FilterAction::Block,
        ),
        (
            Connection::outbound((RELAY_IP, 51820), Proto::Udp).on_interface("eth0"),
            FilterAction::Permit,
        ),
    ] {
        assert_eq!(engine.classify(&connection), verdict, "{connection:?}");
    }
});

test!(relay_on_dns_port_goes_to_dns_sublayer(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);

    let dns_relay = AllowedEndpoint::from(Endpoint::new(RELAY_IP, 53, TransportProtocol::Udp));
    let policy = ConnectingPolicyBuilder::default()
        .settings(Settings::new(false))
        .relays(vec![dns_relay])
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_connecting(policy), PolicyStatus::Success);

    let relay = engine.filter(identity::BASELINE_PERMIT_VPN_RELAY_IPV4_1).unwrap();
    assert_eq!(relay.sublayer(), identity::SUBLAYER_DNS);
});

test!(tunnel_traffic_is_scoped_to_endpoints(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);

    let gateway = Endpoint::new(Ipv4Addr::new(10, 64, 0, 1), 51820, TransportProtocol::Udp);
    let gateway6 = Endpoint::new(
        Ipv6Addr::new(0xfc00, 0xbbbb, 0xbbbb, 0xbb01, 0, 0, 0, 1),
        51820,
        TransportProtocol::Udp,
    );
    let policy = ConnectingPolicyBuilder::default()
        .settings(Settings::new(false))
        .relays(vec![relay()])
        .entry_interface(Some(TUNNEL_ENTRY.to_owned()))
        .entry_traffic(AllowedTunnelTraffic::One(gateway))
        .exit_interface(Some(TUNNEL_EXIT.to_owned()))
        .exit_traffic(AllowedTunnelTraffic::Two(gateway, gateway6))
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_connecting(policy), PolicyStatus::Success);

    let entry = engine
        .filter(identity::BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV4_1)
        .unwrap();
    assert_eq!(inspect::required_interface(&entry), Some(TUNNEL_ENTRY));
    assert_eq!(inspect::remote_port(&entry), Some(51820));
    assert!(engine
        .filter(identity::BASELINE_PERMIT_VPN_TUNNEL_ENTRY_OUTBOUND_IPV6_1)
        .is_none());

    // The second endpoint takes the second slot of its family's pool.
    let exit6 = engine
        .filter(identity::BASELINE_PERMIT_VPN_TUNNEL_EXIT_OUTBOUND_IPV6_2)
        .unwrap();
    assert_eq!(inspect::required_interface(&exit6), Some(TUNNEL_EXIT));
    assert!(exit6.remote_addresses().any(|net| net.ip() == gateway6.ip()));
});

test!(empty_interface_alias_is_absent(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);

    let policy = ConnectingPolicyBuilder::default()
        .settings(Settings::new(false))
        .entry_interface(Some(String::new()))
        .entry_traffic(AllowedTunnelTraffic::All)
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_connecting(policy), PolicyStatus::Success);
    assert!(engine
        .filters()
        .iter()
        .all(|filter| filter.interface().is_none()));
});

test!(exceeding_endpoint_pool_leaves_state_unchanged(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);

    let four = BlockedPolicyBuilder::default()
        .settings(Settings::new(false))
        .allowed_endpoints((1..=4).map(endpoint).collect::<Vec<_>>())
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_blocked(four), PolicyStatus::Success);
    assert!(engine
        .filter(identity::BASELINE_PERMIT_ENDPOINT_IPV4_4)
        .is_some());

    let before = inspect::filter_keys(&engine);
    let commits = engine.commits();

    let five = ConnectingPolicyBuilder::default()
        .settings(Settings::new(true))
        .allowed_endpoints((1..=5).map(endpoint).collect::<Vec<_>>())
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_connecting(five), PolicyStatus::GeneralFailure);
    assert_eq!(firewall.active_policy(), PolicyState::Blocked);
    assert_eq!(inspect::filter_keys(&engine), before);
    assert_eq!(engine.commits(), commits);
});

test!(third_relay_of_a_family_is_refused(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);

    let relays = (1..=3)
        .map(|last| Endpoint::new(Ipv4Addr::new(185, 65, 134, last), 51820, TransportProtocol::Udp))
        .map(AllowedEndpoint::from)
        .collect::<Vec<_>>();
    let policy = ConnectingPolicyBuilder::default()
        .settings(Settings::new(false))
        .relays(relays)
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_connecting(policy), PolicyStatus::GeneralFailure);
    assert_eq!(firewall.active_policy(), PolicyState::None);
    assert!(engine.filters().is_empty());
});

test!(applying_a_policy_twice_is_idempotent(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);

    let policy = ConnectedPolicyBuilder::default()
        .settings(Settings::new(true))
        .relays(vec![relay()])
        .exit_interface(Some(TUNNEL_EXIT.to_owned()))
        .tunnel_dns_servers(vec![IpAddr::V4(TUNNEL_DNS)])
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_connected(policy.clone()), PolicyStatus::Success);
    let first = engine.filters();
    assert_eq!(firewall.apply_policy_connected(policy), PolicyStatus::Success);
    assert_eq!(engine.filters(), first);
});

test!(switching_policies_replaces_filters(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);

    let connecting = ConnectingPolicyBuilder::default()
        .settings(Settings::new(false))
        .relays(vec![relay()])
        .build()
        .unwrap();
    firewall.apply_policy_connecting(connecting);
    assert!(engine.filter(identity::BASELINE_PERMIT_VPN_RELAY_IPV4_1).is_some());

    let blocked = BlockedPolicyBuilder::default()
        .settings(Settings::new(false))
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_blocked(blocked), PolicyStatus::Success);
    assert_eq!(firewall.active_policy(), PolicyState::Blocked);
    assert!(engine.filter(identity::BASELINE_PERMIT_VPN_RELAY_IPV4_1).is_none());
    assert!(engine.filter(identity::BASELINE_BLOCK_ALL_OUTBOUND_IPV4).is_some());
});

test!(reset_reverts_to_structural_objects(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);
    let structural = engine.object_keys();

    let blocked = BlockedPolicyBuilder::default()
        .settings(Settings::new(true))
        .build()
        .unwrap();
    firewall.apply_policy_blocked(blocked);
    assert!(!engine.filters().is_empty());

    assert_eq!(firewall.reset(), PolicyStatus::Success);
    assert_eq!(firewall.active_policy(), PolicyState::None);
    assert!(engine.filters().is_empty());
    assert_eq!(engine.object_keys(), structural);
    assert!(structural.contains(&identity::SUBLAYER_DNS));
});
