// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::engine::FilterEngine;
use crate::rules::baseline::{self, TunnelMarker};
use crate::rules::{dns, multi};
use crate::{
    objects, AllowedEndpoint, AllowedTunnelTraffic, Checkpoint, Error, InterfaceAlias,
    ObjectPurger, Result, Rule, Ruleset, SessionController, Transaction,
};

use std::fmt;
use std::net::IpAddr;

/// The policy currently enforced by a [`PolicyContext`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyState {
    /// Only the structural objects are installed. No traffic is filtered.
    #[default]
    None,
    Blocked,
    Connecting,
    Connected,
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PolicyState::None => "none",
            PolicyState::Blocked => "blocked",
            PolicyState::Connecting => "connecting",
            PolicyState::Connected => "connected",
        }
        .fmt(f)
    }
}

/// Toggles that include or exclude fixed sets of rules in every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(derive_builder::Builder)]
#[builder(setter(into))]
#[builder(build_fn(name = "build_internal"))]
pub struct Settings {
    /// Permit DHCP and NDP, so the host can configure its network interfaces.
    #[builder(default = "true")]
    pub permit_dhcp: bool,
    /// Permit traffic to and from private networks.
    #[builder(default)]
    pub permit_lan: bool,
}

impl Settings {
    /// Settings that always permit DHCP.
    pub fn new(permit_lan: bool) -> Self {
        Settings {
            permit_dhcp: true,
            permit_lan,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(false)
    }
}

impl SettingsBuilder {
    pub fn build(&self) -> Result<Settings> {
        self.build_internal()
            .map_err(|e| Error::InvalidPolicy(e.to_string()))
    }
}

/// Everything is blocked except what `settings` and `allowed_endpoints` permit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(derive_builder::Builder)]
#[builder(setter(into))]
#[builder(build_fn(name = "build_internal"))]
pub struct BlockedPolicy {
    pub settings: Settings,
    #[builder(default)]
    pub allowed_endpoints: Vec<AllowedEndpoint>,
}

impl BlockedPolicyBuilder {
    pub fn build(&self) -> Result<BlockedPolicy> {
        self.build_internal()
            .map_err(|e| Error::InvalidPolicy(e.to_string()))
    }
}

/// A tunnel is being established. Traffic to the relays is permitted, and tunnel interfaces
/// that already exist carry the traffic their selectors allow.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(derive_builder::Builder)]
#[builder(setter(into))]
#[builder(build_fn(name = "build_internal"))]
pub struct ConnectingPolicy {
    pub settings: Settings,
    #[builder(default)]
    pub relays: Vec<AllowedEndpoint>,
    /// Alias of the entry tunnel interface. Empty aliases count as absent.
    #[builder(default)]
    pub entry_interface: Option<String>,
    #[builder(default)]
    pub entry_traffic: AllowedTunnelTraffic,
    /// Alias of the exit tunnel interface. Empty aliases count as absent.
    #[builder(default)]
    pub exit_interface: Option<String>,
    #[builder(default)]
    pub exit_traffic: AllowedTunnelTraffic,
    #[builder(default)]
    pub allowed_endpoints: Vec<AllowedEndpoint>,
    /// Resolvers reachable outside the tunnel while connecting.
    #[builder(default)]
    pub non_tunnel_dns_servers: Vec<IpAddr>,
}

impl ConnectingPolicyBuilder {
    pub fn build(&self) -> Result<ConnectingPolicy> {
        self.build_internal()
            .map_err(|e| Error::InvalidPolicy(e.to_string()))
    }
}

/// The tunnel is up. All traffic on the tunnel interfaces is permitted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(derive_builder::Builder)]
#[builder(setter(into))]
#[builder(build_fn(name = "build_internal"))]
pub struct ConnectedPolicy {
    pub settings: Settings,
    #[builder(default)]
    pub relays: Vec<AllowedEndpoint>,
    #[builder(default)]
    pub entry_interface: Option<String>,
    #[builder(default)]
    pub exit_interface: Option<String>,
    #[builder(default)]
    pub allowed_endpoints: Vec<AllowedEndpoint>,
    /// Resolvers reached through the exit tunnel.
    #[builder(default)]
    pub tunnel_dns_servers: Vec<IpAddr>,
    /// Resolvers reached outside the exit tunnel.
    #[builder(default)]
    pub non_tunnel_dns_servers: Vec<IpAddr>,
}

impl ConnectedPolicyBuilder {
    pub fn build(&self) -> Result<ConnectedPolicy> {
        self.build_internal()
            .map_err(|e| Error::InvalidPolicy(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    Blocked(BlockedPolicy),
    Connecting(ConnectingPolicy),
    Connected(ConnectedPolicy),
}

impl Policy {
    /// The state a context is in once this policy has been applied.
    pub fn state(&self) -> PolicyState {
        match self {
            Policy::Blocked(_) => PolicyState::Blocked,
            Policy::Connecting(_) => PolicyState::Connecting,
            Policy::Connected(_) => PolicyState::Connected,
        }
    }

    /// The rules enforcing this policy, in the order they are applied.
    pub fn ruleset(&self) -> Ruleset {
        match self {
            Policy::Blocked(policy) => compose_blocked(policy),
            Policy::Connecting(policy) => compose_connecting(policy),
            Policy::Connected(policy) => compose_connected(policy),
        }
    }
}

fn net_blocked_rules(ruleset: &mut Ruleset) {
    ruleset.push(baseline::BlockAll.into());
    ruleset.push(baseline::PermitLoopback.into());
}

fn settings_rules(settings: &Settings, ruleset: &mut Ruleset) {
    if settings.permit_dhcp {
        ruleset.push(baseline::PermitDhcp.into());
        ruleset.push(baseline::PermitNdp.into());
    }
    if settings.permit_lan {
        ruleset.push(baseline::PermitLan.into());
        ruleset.push(baseline::PermitLanService.into());
        ruleset.push(baseline::PermitDhcpServer::ipv4_only().into());
    }

    // DNS is decided by the DNS sublayer alone.
    ruleset.push(baseline::PermitDns.into());
    ruleset.push(dns::PermitLoopback.into());
    ruleset.push(dns::BlockAll.into());
}

fn relay_rules(relays: &[AllowedEndpoint], ruleset: &mut Ruleset) {
    let relays = relays.iter().cloned().map(multi::Relay::from).collect();
    ruleset.push(multi::PermitVpnRelay::new(relays).into());
}

fn allowed_endpoint_rules(endpoints: &[AllowedEndpoint], ruleset: &mut Ruleset) {
    if !endpoints.is_empty() {
        ruleset.push(baseline::PermitEndpoint::new(endpoints.to_vec()).into());
    }
}

fn tunnel_rules(
    interface: &InterfaceAlias,
    traffic: &AllowedTunnelTraffic,
    marker: TunnelMarker,
    ruleset: &mut Ruleset,
) {
    ruleset.extend(
        baseline::PermitVpnTunnel::new(interface.clone(), traffic, marker).map(Rule::from),
    );
    ruleset.extend(
        baseline::PermitVpnTunnelService::new(interface.clone(), traffic, marker).map(Rule::from),
    );
}

fn interface_alias(alias: &Option<String>) -> Option<InterfaceAlias> {
    InterfaceAlias::optional(alias.as_deref())
}

/// Rules of the blocked policy.
pub fn compose_blocked(policy: &BlockedPolicy) -> Ruleset {
    let mut ruleset = Ruleset::new();
    net_blocked_rules(&mut ruleset);
    settings_rules(&policy.settings, &mut ruleset);
    allowed_endpoint_rules(&policy.allowed_endpoints, &mut ruleset);
    ruleset
}

/// Rules of the connecting policy.
pub fn compose_connecting(policy: &ConnectingPolicy) -> Ruleset {
    let entry_interface = interface_alias(&policy.entry_interface);
    let exit_interface = interface_alias(&policy.exit_interface);

    let mut ruleset = Ruleset::new();
    net_blocked_rules(&mut ruleset);
    settings_rules(&policy.settings, &mut ruleset);
    relay_rules(&policy.relays, &mut ruleset);
    allowed_endpoint_rules(&policy.allowed_endpoints, &mut ruleset);

    if !policy.non_tunnel_dns_servers.is_empty() {
        ruleset.push(
            dns::PermitNonTunnel::new(exit_interface.clone(), policy.non_tunnel_dns_servers.clone())
                .into(),
        );
    }
    if let Some(entry) = &entry_interface {
        tunnel_rules(entry, &policy.entry_traffic, TunnelMarker::Entry, &mut ruleset);
    }
    if let Some(exit) = &exit_interface {
        tunnel_rules(exit, &policy.exit_traffic, TunnelMarker::Exit, &mut ruleset);
    }
    ruleset
}

/// Rules of the connected policy.
pub fn compose_connected(policy: &ConnectedPolicy) -> Ruleset {
    let entry_interface = interface_alias(&policy.entry_interface);
    let exit_interface = interface_alias(&policy.exit_interface);

    let mut ruleset = Ruleset::new();
    net_blocked_rules(&mut ruleset);
    settings_rules(&policy.settings, &mut ruleset);
    relay_rules(&policy.relays, &mut ruleset);
    allowed_endpoint_rules(&policy.allowed_endpoints, &mut ruleset);

    if let Some(exit) = &exit_interface {
        if !policy.tunnel_dns_servers.is_empty() {
            ruleset.push(
                dns::PermitTunnel::new(exit.clone(), policy.tunnel_dns_servers.clone()).into(),
            );
        }
        if !policy.non_tunnel_dns_servers.is_empty() {
            ruleset.push(
                dns::PermitNonTunnel::new(
                    Some(exit.clone()),
                    policy.non_tunnel_dns_servers.clone(),
                )
                .into(),
            );
        }
        tunnel_rules(exit, &AllowedTunnelTraffic::All, TunnelMarker::Exit, &mut ruleset);
    }
    if let Some(entry) = &entry_interface {
        tunnel_rules(entry, &AllowedTunnelTraffic::All, TunnelMarker::Entry, &mut ruleset);
    }
    ruleset
}

/// Installs and swaps policies in the filtering engine, tracking which one is active.
///
/// The context installs the structural objects once, when it is created, and remembers that
/// point in the session's change log. Every policy change first reverts to that point and then
/// installs the complete new ruleset, all in one transaction.
pub struct PolicyContext<E: FilterEngine> {
    session: SessionController<E>,
    baseline: Checkpoint,
    active_policy: PolicyState,
}

impl<E: FilterEngine> PolicyContext<E> {
    /// Purges every object of ours the engine holds, then installs the structural objects.
    pub fn new(session: E) -> Result<Self> {
        let mut session = SessionController::new(session);
        session.execute_transaction(Self::install_structural)?;
        let baseline = session.checkpoint();
        Ok(PolicyContext {
            session,
            baseline,
            active_policy: PolicyState::None,
        })
    }

    /// Like [`PolicyContext::new`], but also applies the blocked policy in the same transaction.
    /// The baseline checkpoint is still taken before any filter is installed.
    pub fn new_blocked(session: E, policy: &BlockedPolicy) -> Result<Self> {
        let mut session = SessionController::new(session);
        let ruleset = compose_blocked(policy);
        let baseline = session.execute_transaction(|transaction| {
            Self::install_structural(transaction)?;
            let baseline = transaction.peek_checkpoint();
            Self::install_ruleset(transaction, &ruleset)?;
            Ok(baseline)
        })?;
        Ok(PolicyContext {
            session,
            baseline,
            active_policy: PolicyState::Blocked,
        })
    }

    pub fn apply_policy_blocked(&mut self, policy: &BlockedPolicy) -> Result<()> {
        self.apply(PolicyState::Blocked, &compose_blocked(policy))
    }

    pub fn apply_policy_connecting(&mut self, policy: &ConnectingPolicy) -> Result<()> {
        self.apply(PolicyState::Connecting, &compose_connecting(policy))
    }

    pub fn apply_policy_connected(&mut self, policy: &ConnectedPolicy) -> Result<()> {
        self.apply(PolicyState::Connected, &compose_connected(policy))
    }

    pub fn apply_policy(&mut self, policy: &Policy) -> Result<()> {
        self.apply(policy.state(), &policy.ruleset())
    }

    /// Removes every filter, leaving only the structural objects.
    pub fn reset(&mut self) -> Result<()> {
        let baseline = self.baseline;
        self.session
            .execute_transaction(|transaction| transaction.revert(baseline))?;
        self.active_policy = PolicyState::None;
        Ok(())
    }

    pub fn active_policy(&self) -> PolicyState {
        self.active_policy
    }

    pub fn session(&self) -> &SessionController<E> {
        &self.session
    }

    fn apply(&mut self, state: PolicyState, ruleset: &Ruleset) -> Result<()> {
        log::debug!("Applying {state} policy with {} rules", ruleset.len());
        let baseline = self.baseline;
        self.session.execute_transaction(|transaction| {
            transaction.revert(baseline)?;
            Self::install_ruleset(transaction, ruleset)
        })?;
        self.active_policy = state;
        Ok(())
    }

    fn install_structural(transaction: &mut Transaction<'_, E>) -> Result<()> {
        ObjectPurger::remove_all(transaction)?;
        transaction.add_provider(&objects::provider())?;
        transaction.add_sublayer(&objects::sublayer_baseline())?;
        transaction.add_sublayer(&objects::sublayer_dns())
    }

    fn install_ruleset(transaction: &mut Transaction<'_, E>, ruleset: &Ruleset) -> Result<()> {
        for rule in ruleset {
            rule.apply(&mut *transaction).map_err(|error| {
                log::error!("Failed to apply {}: {error}", rule.name());
                error
            })?;
        }
        Ok(())
    }
}
