#[macro_use]
#[allow(dead_code)]
mod helper;

use crate::helper::{inspect, TUNNEL_EXIT};
use assert_matches::assert_matches;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use winfw::engine::memory::{MemoryEngine, MemorySession};
use winfw::engine::{EngineError, FilterEngine, SessionFactory};
use winfw::identity::{self, ObjectKind};
use winfw::{
    AllowedEndpoint, BlockedPolicyBuilder, ConnectedPolicyBuilder, Endpoint, Error, Filter,
    FirewallController, PolicyContext, PolicyState, PolicyStatus, Provider, Settings, Sublayer,
    TransportProtocol, DEFAULT_LOCK_TIMEOUT,
};

const SHORT_TIMEOUT: Duration = Duration::from_millis(50);

fn before_each() {}
fn after_each() {}

fn connected_policy() -> winfw::ConnectedPolicy {
    ConnectedPolicyBuilder::default()
        .settings(Settings::new(true))
        .relays(vec![AllowedEndpoint::from(Endpoint::new(
            Ipv4Addr::new(185, 65, 134, 1),
            51820,
            TransportProtocol::Udp,
        ))])
        .exit_interface(Some(TUNNEL_EXIT.to_owned()))
        .tunnel_dns_servers(vec![IpAddr::V4(Ipv4Addr::new(10, 64, 0, 1))])
        .build()
        .unwrap()
}

/// Opens memory sessions that panic once, while adding `fault`, after being armed.
struct FaultyEngine {
    engine: MemoryEngine,
    fault: Uuid,
    armed: Arc<AtomicBool>,
}

struct FaultySession {
    inner: MemorySession,
    fault: Uuid,
    armed: Arc<AtomicBool>,
}

impl SessionFactory for FaultyEngine {
    type Session = FaultySession;

    fn open_session(&self, timeout: Duration) -> Result<FaultySession, EngineError> {
        Ok(FaultySession {
            inner: self.engine.open_session(timeout)?,
            fault: self.fault,
            armed: self.armed.clone(),
        })
    }
}

impl FilterEngine for FaultySession {
    fn begin_transaction(&mut self) -> Result<(), EngineError> {
        self.inner.begin_transaction()
    }

    fn commit_transaction(&mut self) -> Result<(), EngineError> {
        self.inner.commit_transaction()
    }

    fn abort_transaction(&mut self) -> Result<(), EngineError> {
        self.inner.abort_transaction()
    }

    fn add_provider(&mut self, provider: &Provider) -> Result<(), EngineError> {
        self.inner.add_provider(provider)
    }

    fn add_sublayer(&mut self, sublayer: &Sublayer) -> Result<(), EngineError> {
        self.inner.add_sublayer(sublayer)
    }

    fn add_filter(&mut self, filter: &Filter) -> Result<(), EngineError> {
        if filter.key() == self.fault && self.armed.swap(false, Ordering::SeqCst) {
            panic!("engine fault");
        }
        self.inner.add_filter(filter)
    }

    fn remove_object(&mut self, kind: ObjectKind, key: Uuid) -> Result<(), EngineError> {
        self.inner.remove_object(kind, key)
    }
}

test!(rejected_filter_aborts_whole_policy(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);
    let blocked = BlockedPolicyBuilder::default()
        .settings(Settings::new(false))
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_blocked(blocked), PolicyStatus::Success);

    let before = engine.filters();
    let commits = engine.commits();

    // One of the last filters of the ruleset.
    engine.reject(identity::BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV6_1);
    assert_eq!(
        firewall.apply_policy_connected(connected_policy()),
        PolicyStatus::GeneralFailure
    );
    assert_eq!(engine.filters(), before);
    assert_eq!(engine.commits(), commits);
    assert_eq!(firewall.active_policy(), PolicyState::Blocked);

    engine.clear_rejections();
    assert_eq!(firewall.apply_policy_connected(connected_policy()), PolicyStatus::Success);
    assert_eq!(firewall.active_policy(), PolicyState::Connected);
});

test!(unknown_interface_aborts_policy(engine) {
    let mut firewall = FirewallController::new(engine.clone());
    firewall.initialize(DEFAULT_LOCK_TIMEOUT);

    engine.remove_interface(TUNNEL_EXIT);
    assert_eq!(
        firewall.apply_policy_connected(connected_policy()),
        PolicyStatus::GeneralFailure
    );
    assert!(engine.filters().is_empty());
});

test!(lock_timeout_is_reported(engine) {
    let mut firewall = FirewallController::new(engine.clone());

    let guard = engine.hold_write_lock().unwrap();
    assert_eq!(firewall.initialize(SHORT_TIMEOUT), PolicyStatus::LockTimeout);
    assert!(!firewall.is_initialized());
    drop(guard);

    assert_eq!(firewall.initialize(SHORT_TIMEOUT), PolicyStatus::Success);

    let guard = engine.hold_write_lock().unwrap();
    assert_eq!(
        firewall.apply_policy_connected(connected_policy()),
        PolicyStatus::LockTimeout
    );
    assert_eq!(firewall.active_policy(), PolicyState::None);
    drop(guard);

    // Nothing changed, so the same command can be retried.
    assert_eq!(firewall.apply_policy_connected(connected_policy()), PolicyStatus::Success);
});

test!(initialize_purges_leftovers(engine) {
    let mut stale = FirewallController::new(engine.clone());
    stale.initialize(DEFAULT_LOCK_TIMEOUT);
    stale.apply_policy_connected(connected_policy());
    // Simulates a process that died without deinitializing.
    std::mem::forget(stale);

    let mut firewall = FirewallController::new(engine.clone());
    assert_eq!(firewall.initialize(DEFAULT_LOCK_TIMEOUT), PolicyStatus::Success);
    assert!(engine.filters().is_empty());
    assert_eq!(engine.providers().len(), 1);
    assert_eq!(engine.sublayers().len(), 2);
});

test!(context_reports_errors(engine) {
    let session = engine.open_session(DEFAULT_LOCK_TIMEOUT).unwrap();
    let mut context = PolicyContext::new(session).unwrap();

    engine.reject(identity::DNS_BLOCK_ALL_OUTBOUND_IPV4);
    let blocked = BlockedPolicyBuilder::default()
        .settings(Settings::new(false))
        .build()
        .unwrap();
    assert_matches!(
        context.apply_policy_blocked(&blocked),
        Err(Error::Engine(EngineError::Rejected(key))) if key == identity::DNS_BLOCK_ALL_OUTBOUND_IPV4
    );
    assert_eq!(context.active_policy(), PolicyState::None);
    assert!(inspect::filter_keys(&engine).is_empty());
});

test!(panicking_engine_does_not_wedge_the_firewall(engine) {
    let armed = Arc::new(AtomicBool::new(false));
    let mut firewall = FirewallController::new(FaultyEngine {
        engine: engine.clone(),
        fault: identity::BASELINE_PERMIT_VPN_TUNNEL_SERVICE_EXIT_IPV4_1,
        armed: armed.clone(),
    });
    assert_eq!(firewall.initialize(SHORT_TIMEOUT), PolicyStatus::Success);
    let blocked = BlockedPolicyBuilder::default()
        .settings(Settings::new(false))
        .build()
        .unwrap();
    assert_eq!(firewall.apply_policy_blocked(blocked), PolicyStatus::Success);
    let before = engine.filters();

    armed.store(true, Ordering::SeqCst);
    assert_eq!(
        firewall.apply_policy_connected(connected_policy()),
        PolicyStatus::GeneralFailure
    );
    assert!(!armed.load(Ordering::SeqCst));
    assert_eq!(engine.filters(), before);
    assert_eq!(firewall.active_policy(), PolicyState::Blocked);
    // Other writers are not locked out.
    assert!(engine.hold_write_lock().is_some());

    assert_eq!(firewall.apply_policy_connected(connected_policy()), PolicyStatus::Success);
    assert_eq!(firewall.active_policy(), PolicyState::Connected);
    assert_eq!(firewall.reset(), PolicyStatus::Success);
    assert!(engine.filters().is_empty());
});
