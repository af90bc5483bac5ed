// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::engine::{FilterEngine, SessionFactory};
use crate::rules::persistent;
use crate::{
    objects, AllowedEndpoint, BlockedPolicy, ConnectedPolicy, ConnectingPolicy, Error,
    ObjectPurger, PolicyContext, PolicyState, PurgeScope, Result, Rule, SessionController,
    DEFAULT_LOCK_TIMEOUT, DEINITIALIZE_TIMEOUT,
};

use log::Level;

use std::any::Any;
use std::mem;
use std::net::IpAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Outcome of a firewall command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyStatus {
    Success,
    /// Any failure other than a lock timeout, including malformed input.
    GeneralFailure,
    /// The engine write lock could not be acquired in time. Nothing was changed, so the command
    /// may be retried.
    LockTimeout,
}

impl From<&Error> for PolicyStatus {
    fn from(error: &Error) -> Self {
        if error.is_lock_timeout() {
            PolicyStatus::LockTimeout
        } else {
            PolicyStatus::GeneralFailure
        }
    }
}

impl<T> From<&Result<T>> for PolicyStatus {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => PolicyStatus::Success,
            Err(error) => PolicyStatus::from(error),
        }
    }
}

/// What to leave behind when the firewall is deinitialized.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupPolicy {
    /// Keep blocking all traffic with persistent filters, if the blocked policy is active.
    /// Falls back to [`CleanupPolicy::Reset`] when any other policy is active. If the persistent
    /// filters can not be installed, nothing is removed and the failure is reported.
    ContinueBlocking,
    /// Remove every object of ours from the engine.
    #[default]
    Reset,
}

/// Receives the diagnostics of the controller instead of the `log` facade.
pub type LogSink = Box<dyn Fn(Level, &str) + Send>;

enum ControllerState<E: FilterEngine> {
    Uninitialized,
    Active(PolicyContext<E>),
}

/// The entry point of the library. Owns at most one [`PolicyContext`] and turns every failure,
/// panics included, into a [`PolicyStatus`].
pub struct FirewallController<F: SessionFactory> {
    factory: F,
    state: ControllerState<F::Session>,
    log_sink: Option<LogSink>,
}

impl<F: SessionFactory> FirewallController<F> {
    pub fn new(factory: F) -> Self {
        FirewallController {
            factory,
            state: ControllerState::Uninitialized,
            log_sink: None,
        }
    }

    pub fn with_log_sink(factory: F, log_sink: LogSink) -> Self {
        FirewallController {
            log_sink: Some(log_sink),
            ..Self::new(factory)
        }
    }

    pub fn set_log_sink(&mut self, log_sink: Option<LogSink>) {
        self.log_sink = log_sink;
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, ControllerState::Active(_))
    }

    /// The policy currently enforced, or `PolicyState::None` if not initialized.
    pub fn active_policy(&self) -> PolicyState {
        match &self.state {
            ControllerState::Active(context) => context.active_policy(),
            ControllerState::Uninitialized => PolicyState::None,
        }
    }

    /// Opens an engine session and installs the structural objects, without filtering anything.
    pub fn initialize(&mut self, timeout: Duration) -> PolicyStatus {
        self.guarded("Initialize", |controller| {
            controller.ensure_uninitialized()?;
            let session = controller.factory.open_session(timeout)?;
            controller.state = ControllerState::Active(PolicyContext::new(session)?);
            Ok(())
        })
    }

    /// Like [`FirewallController::initialize`], but the blocked policy is in effect from the
    /// moment the structural objects are.
    pub fn initialize_blocked(&mut self, timeout: Duration, policy: BlockedPolicy) -> PolicyStatus {
        self.guarded("Initialize blocked", |controller| {
            controller.ensure_uninitialized()?;
            controller.dump_endpoints("Allowed endpoint", &policy.allowed_endpoints);
            let session = controller.factory.open_session(timeout)?;
            let context = PolicyContext::new_blocked(session, &policy)?;
            controller.state = ControllerState::Active(context);
            Ok(())
        })
    }

    pub fn apply_policy_connecting(&mut self, policy: ConnectingPolicy) -> PolicyStatus {
        self.guarded("Apply connecting policy", |controller| {
            controller.dump_endpoints("Relay", &policy.relays);
            controller.dump_interface("Entry tunnel interface", &policy.entry_interface);
            controller.dump_interface("Exit tunnel interface", &policy.exit_interface);
            controller.dump_endpoints("Allowed endpoint", &policy.allowed_endpoints);
            controller.dump_dns_servers("Non-tunnel DNS server", &policy.non_tunnel_dns_servers);
            controller.context()?.apply_policy_connecting(&policy)
        })
    }

    pub fn apply_policy_connected(&mut self, policy: ConnectedPolicy) -> PolicyStatus {
        self.guarded("Apply connected policy", |controller| {
            controller.dump_endpoints("Relay", &policy.relays);
            controller.dump_interface("Entry tunnel interface", &policy.entry_interface);
            controller.dump_interface("Exit tunnel interface", &policy.exit_interface);
            controller.dump_endpoints("Allowed endpoint", &policy.allowed_endpoints);
            controller.dump_dns_servers("Tunnel DNS server", &policy.tunnel_dns_servers);
            controller.dump_dns_servers("Non-tunnel DNS server", &policy.non_tunnel_dns_servers);
            controller.context()?.apply_policy_connected(&policy)
        })
    }

    pub fn apply_policy_blocked(&mut self, policy: BlockedPolicy) -> PolicyStatus {
        self.guarded("Apply blocked policy", |controller| {
            controller.dump_endpoints("Allowed endpoint", &policy.allowed_endpoints);
            controller.context()?.apply_policy_blocked(&policy)
        })
    }

    /// Removes the active policy. When not initialized, every object of ours is purged from the
    /// engine instead, which also removes persistent filters left by an earlier process.
    pub fn reset(&mut self) -> PolicyStatus {
        self.guarded("Reset", |controller| controller.reset_internal())
    }

    /// Closes the session. Succeeds trivially if the firewall is not initialized.
    pub fn deinitialize(&mut self, cleanup: CleanupPolicy) -> PolicyStatus {
        self.guarded("Deinitialize", |controller| {
            let context = match mem::replace(&mut controller.state, ControllerState::Uninitialized)
            {
                ControllerState::Active(context) => context,
                ControllerState::Uninitialized => return Ok(()),
            };
            let active_policy = context.active_policy();
            // Closes the session, releasing the engine before a new one is opened.
            drop(context);

            if cleanup == CleanupPolicy::ContinueBlocking && active_policy == PolicyState::Blocked {
                // A failed install leaves the session's blocking filters in place.
                return controller.install_persistent_block();
            }
            controller.purge(DEINITIALIZE_TIMEOUT)
        })
    }

    fn install_persistent_block(&self) -> Result<()> {
        let mut session = SessionController::new(self.factory.open_session(DEINITIALIZE_TIMEOUT)?);
        session.execute_transaction(|transaction| {
            ObjectPurger::remove_non_persistent(transaction)?;
            transaction.add_provider(&objects::provider_persistent())?;
            transaction.add_sublayer(&objects::sublayer_persistent())?;
            Rule::from(persistent::BlockAll).apply(&mut *transaction)
        })
    }

    fn reset_internal(&mut self) -> Result<()> {
        match &mut self.state {
            ControllerState::Active(context) => context.reset(),
            ControllerState::Uninitialized => self.purge(DEFAULT_LOCK_TIMEOUT),
        }
    }

    fn purge(&self, timeout: Duration) -> Result<()> {
        let mut session = SessionController::new(self.factory.open_session(timeout)?);
        ObjectPurger::execute(&mut session, PurgeScope::All)
    }

    fn ensure_uninitialized(&self) -> Result<()> {
        match self.state {
            ControllerState::Active(_) => Err(Error::AlreadyInitialized),
            ControllerState::Uninitialized => Ok(()),
        }
    }

    fn context(&mut self) -> Result<&mut PolicyContext<F::Session>> {
        match &mut self.state {
            ControllerState::Active(context) => Ok(context),
            ControllerState::Uninitialized => Err(Error::NotInitialized),
        }
    }

    /// Runs one command, reporting its error or panic through the log sink.
    fn guarded<O>(&mut self, command: &str, operation: O) -> PolicyStatus
    where
        O: FnOnce(&mut Self) -> Result<()>,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| operation(&mut *self))) {
            Ok(result) => {
                if let Err(error) = &result {
                    sink_log!(self.log_sink.as_ref(), Level::Error, "{command}: {error}");
                }
                PolicyStatus::from(&result)
            }
            Err(payload) => {
                sink_log!(
                    self.log_sink.as_ref(),
                    Level::Error,
                    "{command}: {}",
                    panic_message(payload.as_ref())
                );
                PolicyStatus::GeneralFailure
            }
        }
    }

    fn dump_endpoints(&self, description: &str, endpoints: &[AllowedEndpoint]) {
        if endpoints.is_empty() {
            sink_log!(self.log_sink.as_ref(), Level::Debug, "{description}s: none");
        }
        for endpoint in endpoints {
            sink_log!(self.log_sink.as_ref(), Level::Debug, "{description}: {endpoint}");
        }
    }

    fn dump_interface(&self, description: &str, alias: &Option<String>) {
        match alias.as_deref() {
            Some(alias) if !alias.is_empty() => {
                sink_log!(self.log_sink.as_ref(), Level::Debug, "{description}: {alias}")
            }
            _ => sink_log!(self.log_sink.as_ref(), Level::Debug, "{description}: none"),
        }
    }

    fn dump_dns_servers(&self, description: &str, servers: &[IpAddr]) {
        for server in servers {
            sink_log!(self.log_sink.as_ref(), Level::Debug, "{description}: {server}");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "Unhandled panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemoryEngine;
    use crate::engine::EngineError;
    use crate::{identity, Settings};

    use std::sync::{Arc, Mutex};

    fn blocked_policy() -> BlockedPolicy {
        BlockedPolicy {
            settings: Settings::new(false),
            allowed_endpoints: Vec::new(),
        }
    }

    #[test]
    fn status_from_error() {
        let timeout = Error::from(EngineError::LockTimeout(DEFAULT_LOCK_TIMEOUT));
        assert_eq!(PolicyStatus::from(&timeout), PolicyStatus::LockTimeout);
        assert_eq!(
            PolicyStatus::from(&Error::NotInitialized),
            PolicyStatus::GeneralFailure
        );
    }

    #[test]
    fn double_initialize_fails() {
        let mut firewall = FirewallController::new(MemoryEngine::new());
        assert_eq!(firewall.initialize(DEFAULT_LOCK_TIMEOUT), PolicyStatus::Success);
        assert_eq!(
            firewall.initialize(DEFAULT_LOCK_TIMEOUT),
            PolicyStatus::GeneralFailure
        );
        assert!(firewall.is_initialized());
    }

    #[test]
    fn apply_without_initialize_fails() {
        let mut firewall = FirewallController::new(MemoryEngine::new());
        assert_eq!(
            firewall.apply_policy_blocked(blocked_policy()),
            PolicyStatus::GeneralFailure
        );
    }

    #[test]
    fn errors_reach_the_log_sink() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink_messages = messages.clone();
        let sink: LogSink = Box::new(move |level, message| {
            sink_messages
                .lock()
                .unwrap()
                .push((level, message.to_owned()));
        });

        let mut firewall = FirewallController::with_log_sink(MemoryEngine::new(), sink);
        firewall.apply_policy_blocked(blocked_policy());

        let messages = messages.lock().unwrap();
        assert!(messages
            .iter()
            .any(|(level, message)| *level == Level::Error && message.contains("not initialized")));
    }

    #[test]
    fn initialize_blocked_sets_state() {
        let engine = MemoryEngine::new();
        let mut firewall = FirewallController::new(engine.clone());
        assert_eq!(
            firewall.initialize_blocked(DEFAULT_LOCK_TIMEOUT, blocked_policy()),
            PolicyStatus::Success
        );
        assert_eq!(firewall.active_policy(), PolicyState::Blocked);
        assert!(engine
            .filter(identity::BASELINE_BLOCK_ALL_OUTBOUND_IPV4)
            .is_some());
    }

    #[test]
    fn reset_without_context_purges() {
        let engine = MemoryEngine::new();
        let mut firewall = FirewallController::new(engine.clone());
        firewall.initialize_blocked(DEFAULT_LOCK_TIMEOUT, blocked_policy());
        firewall.deinitialize(CleanupPolicy::ContinueBlocking);
        assert!(engine.filter(identity::PERSISTENT_BLOCK_ALL_OUTBOUND_IPV4).is_some());

        assert_eq!(firewall.reset(), PolicyStatus::Success);
        assert!(engine.object_keys().is_empty());
    }

    #[test]
    fn deinitialize_when_uninitialized() {
        let mut firewall = FirewallController::new(MemoryEngine::new());
        assert_eq!(
            firewall.deinitialize(CleanupPolicy::Reset),
            PolicyStatus::Success
        );
    }

    #[test]
    fn panic_message_downcasts() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 1");
    }
}
