// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An in-process filtering engine. It enforces the same object relationships, transaction
//! semantics and write lock as a real engine, but never touches live traffic.

use super::{EngineError, FilterEngine, SessionFactory};
use crate::identity::ObjectKind;
use crate::{
    AddrFamily, Condition, Direction, Filter, FilterAction, Layer, MatchType, Proto, Provider,
    Sublayer,
};
use uuid::Uuid;

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::mem;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A connection attempt, described by the fields filter conditions match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub direction: Direction,
    pub remote: SocketAddr,
    /// IP protocol number.
    pub protocol: u8,
    /// Local port, or the ICMP type for ICMP traffic.
    pub local_port: u16,
    pub interface: Option<String>,
    pub application: Option<PathBuf>,
    pub loopback: bool,
}

impl Connection {
    pub fn outbound(remote: impl Into<SocketAddr>, protocol: Proto) -> Self {
        Connection {
            direction: Direction::Outbound,
            remote: remote.into(),
            protocol: u8::from(protocol),
            local_port: 0,
            interface: None,
            application: None,
            loopback: false,
        }
    }

    pub fn inbound(remote: impl Into<SocketAddr>, protocol: Proto) -> Self {
        Connection {
            direction: Direction::Inbound,
            ..Self::outbound(remote, protocol)
        }
    }

    pub fn on_interface(mut self, alias: impl Into<String>) -> Self {
        self.interface = Some(alias.into());
        self
    }

    pub fn from_application(mut self, path: impl Into<PathBuf>) -> Self {
        self.application = Some(path.into());
        self
    }

    pub fn on_loopback(mut self) -> Self {
        self.loopback = true;
        self
    }

    fn layer(&self) -> Option<Layer> {
        Layer::new(self.direction, AddrFamily::from(self.remote.ip()))
    }

    fn matches(&self, condition: &Condition) -> bool {
        match condition {
            Condition::RemoteAddress(network) => network.contains(self.remote.ip()),
            Condition::RemotePort(port) => *port == self.remote.port(),
            Condition::LocalPort(port) => *port == self.local_port,
            Condition::Protocol(proto) => u8::from(*proto) == self.protocol,
            Condition::Application(path) => self.application.as_ref() == Some(path),
            Condition::Interface(interface) => {
                let on_interface = self.interface.as_deref() == Some(interface.alias.as_ref());
                match interface.match_type {
                    MatchType::Equal => on_interface,
                    MatchType::NotEqual => !on_interface,
                }
            }
            Condition::IcmpType(icmp_type) => u16::from(*icmp_type) == self.local_port,
            Condition::Loopback => self.loopback,
        }
    }

    /// Conditions on the same field are alternatives, conditions on different fields must all
    /// hold.
    fn matches_filter(&self, filter: &Filter) -> bool {
        let conditions = filter.conditions();
        conditions.iter().all(|condition| {
            conditions
                .iter()
                .filter(|other| mem::discriminant(*other) == mem::discriminant(condition))
                .any(|other| self.matches(other))
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Objects {
    providers: BTreeMap<Uuid, Provider>,
    sublayers: BTreeMap<Uuid, Sublayer>,
    filters: BTreeMap<Uuid, Filter>,
}

impl Objects {
    fn add_provider(&mut self, provider: &Provider) -> Result<(), EngineError> {
        self.ensure_unique(provider.key)?;
        self.providers.insert(provider.key, provider.clone());
        Ok(())
    }

    fn add_sublayer(&mut self, sublayer: &Sublayer) -> Result<(), EngineError> {
        self.ensure_unique(sublayer.key)?;
        if !self.providers.contains_key(&sublayer.provider) {
            return Err(EngineError::MissingProvider(sublayer.provider));
        }
        self.sublayers.insert(sublayer.key, sublayer.clone());
        Ok(())
    }

    fn add_filter(&mut self, filter: &Filter) -> Result<(), EngineError> {
        self.ensure_unique(filter.key())?;
        if !self.providers.contains_key(&filter.provider()) {
            return Err(EngineError::MissingProvider(filter.provider()));
        }
        if !self.sublayers.contains_key(&filter.sublayer()) {
            return Err(EngineError::MissingSublayer(filter.sublayer()));
        }
        self.filters.insert(filter.key(), filter.clone());
        Ok(())
    }

    fn remove(&mut self, kind: ObjectKind, key: Uuid) -> Result<(), EngineError> {
        let removed = match kind {
            ObjectKind::Filter => self.filters.remove(&key).is_some(),
            ObjectKind::Sublayer => {
                if self.filters.values().any(|filter| filter.sublayer() == key) {
                    return Err(EngineError::ObjectInUse(key));
                }
                self.sublayers.remove(&key).is_some()
            }
            ObjectKind::Provider => {
                let referenced = self.sublayers.values().any(|s| s.provider == key)
                    || self.filters.values().any(|filter| filter.provider() == key);
                if referenced {
                    return Err(EngineError::ObjectInUse(key));
                }
                self.providers.remove(&key).is_some()
            }
        };
        if removed {
            Ok(())
        } else {
            Err(EngineError::NotFound(key))
        }
    }

    fn ensure_unique(&self, key: Uuid) -> Result<(), EngineError> {
        if self.providers.contains_key(&key)
            || self.sublayers.contains_key(&key)
            || self.filters.contains_key(&key)
        {
            return Err(EngineError::AlreadyExists(key));
        }
        Ok(())
    }

    /// Each sublayer's verdict is its heaviest matching filter, where a block wins over a permit
    /// of the same weight. A block from any sublayer blocks the connection. Traffic nothing
    /// matches is permitted.
    fn classify(&self, connection: &Connection) -> FilterAction {
        let Some(layer) = connection.layer() else {
            return FilterAction::Permit;
        };
        let mut sublayers: Vec<&Sublayer> = self.sublayers.values().collect();
        sublayers.sort_by_key(|sublayer| Reverse(sublayer.weight));

        let blocked = sublayers.iter().any(|sublayer| {
            self.filters
                .values()
                .filter(|filter| filter.sublayer() == sublayer.key && filter.layer() == layer)
                .filter(|filter| connection.matches_filter(filter))
                .max_by_key(|filter| {
                    (
                        u8::from(filter.weight()),
                        filter.action() == FilterAction::Block,
                    )
                })
                .is_some_and(|filter| filter.action() == FilterAction::Block)
        });
        if blocked {
            FilterAction::Block
        } else {
            FilterAction::Permit
        }
    }

    fn keys(&self) -> HashSet<Uuid> {
        self.providers
            .keys()
            .chain(self.sublayers.keys())
            .chain(self.filters.keys())
            .copied()
            .collect()
    }
}

#[derive(Debug, Default)]
struct State {
    committed: Objects,
    write_locked: bool,
    interfaces: HashSet<String>,
    rejected: HashSet<Uuid>,
    commits: usize,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    lock_released: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release_write_lock(&self) {
        self.lock().write_locked = false;
        self.lock_released.notify_all();
    }
}

/// Handle to an in-process filtering engine. Clones share the same engine.
#[derive(Debug, Default, Clone)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes an interface known to the engine, so filters can refer to it by alias.
    pub fn add_interface(&self, alias: impl Into<String>) {
        self.shared.lock().interfaces.insert(alias.into());
    }

    pub fn remove_interface(&self, alias: &str) {
        self.shared.lock().interfaces.remove(alias);
    }

    /// Makes the engine refuse to add the object with `key` from now on.
    pub fn reject(&self, key: Uuid) {
        self.shared.lock().rejected.insert(key);
    }

    pub fn clear_rejections(&self) {
        self.shared.lock().rejected.clear();
    }

    /// Takes the engine write lock on behalf of another process. Sessions waiting for it time
    /// out until the returned guard is dropped.
    pub fn hold_write_lock(&self) -> Option<WriteLockGuard> {
        let mut state = self.shared.lock();
        if state.write_locked {
            return None;
        }
        state.write_locked = true;
        Some(WriteLockGuard {
            shared: self.shared.clone(),
        })
    }

    /// Simulates a restart of the engine. Only persistent objects survive.
    pub fn restart(&self) {
        let mut state = self.shared.lock();
        let objects = &mut state.committed;
        objects.filters.retain(|_, filter| filter.persistent());
        objects.sublayers.retain(|_, sublayer| sublayer.persistent);
        objects.providers.retain(|_, provider| provider.persistent);
    }

    /// Keys of every committed object.
    pub fn object_keys(&self) -> HashSet<Uuid> {
        self.shared.lock().committed.keys()
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.shared.lock().committed.providers.values().cloned().collect()
    }

    pub fn sublayers(&self) -> Vec<Sublayer> {
        self.shared.lock().committed.sublayers.values().cloned().collect()
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.shared.lock().committed.filters.values().cloned().collect()
    }

    pub fn filter(&self, key: Uuid) -> Option<Filter> {
        self.shared.lock().committed.filters.get(&key).cloned()
    }

    /// Decides `connection` against the committed filters.
    pub fn classify(&self, connection: &Connection) -> FilterAction {
        self.shared.lock().committed.classify(connection)
    }

    /// Number of transactions committed so far.
    pub fn commits(&self) -> usize {
        self.shared.lock().commits
    }
}

impl SessionFactory for MemoryEngine {
    type Session = MemorySession;

    fn open_session(&self, timeout: Duration) -> Result<MemorySession, EngineError> {
        Ok(MemorySession {
            shared: self.shared.clone(),
            timeout,
            transaction: None,
        })
    }
}

/// Releases the engine write lock taken by [`MemoryEngine::hold_write_lock`] when dropped.
#[derive(Debug)]
pub struct WriteLockGuard {
    shared: Arc<Shared>,
}

impl Drop for WriteLockGuard {
    fn drop(&mut self) {
        self.shared.release_write_lock();
    }
}

/// A session with a [`MemoryEngine`]. Changes are made to a private copy of the engine's objects
/// and swapped in on commit.
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<Shared>,
    timeout: Duration,
    transaction: Option<Objects>,
}

impl MemorySession {
    fn working_copy(&mut self) -> Result<&mut Objects, EngineError> {
        self.transaction.as_mut().ok_or(EngineError::NoTransaction)
    }

    fn check_rejected(&self, key: Uuid) -> Result<(), EngineError> {
        if self.shared.lock().rejected.contains(&key) {
            return Err(EngineError::Rejected(key));
        }
        Ok(())
    }
}

impl FilterEngine for MemorySession {
    fn begin_transaction(&mut self) -> Result<(), EngineError> {
        if self.transaction.is_some() {
            return Err(EngineError::TransactionInProgress);
        }
        let state = self.shared.lock();
        let (mut state, _) = self
            .shared
            .lock_released
            .wait_timeout_while(state, self.timeout, |state| state.write_locked)
            .unwrap_or_else(PoisonError::into_inner);
        if state.write_locked {
            return Err(EngineError::LockTimeout(self.timeout));
        }
        state.write_locked = true;
        self.transaction = Some(state.committed.clone());
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), EngineError> {
        let objects = self.transaction.take().ok_or(EngineError::NoTransaction)?;
        {
            let mut state = self.shared.lock();
            state.committed = objects;
            state.commits += 1;
        }
        self.shared.release_write_lock();
        Ok(())
    }

    fn abort_transaction(&mut self) -> Result<(), EngineError> {
        self.transaction.take().ok_or(EngineError::NoTransaction)?;
        self.shared.release_write_lock();
        Ok(())
    }

    fn add_provider(&mut self, provider: &Provider) -> Result<(), EngineError> {
        self.check_rejected(provider.key)?;
        self.working_copy()?.add_provider(provider)
    }

    fn add_sublayer(&mut self, sublayer: &Sublayer) -> Result<(), EngineError> {
        self.check_rejected(sublayer.key)?;
        self.working_copy()?.add_sublayer(sublayer)
    }

    fn add_filter(&mut self, filter: &Filter) -> Result<(), EngineError> {
        self.check_rejected(filter.key())?;
        if let Some(interface) = filter.interface() {
            let alias = interface.alias.as_ref();
            if !self.shared.lock().interfaces.contains(alias) {
                return Err(EngineError::UnknownInterface(alias.to_owned()));
            }
        }
        self.working_copy()?.add_filter(filter)
    }

    fn remove_object(&mut self, kind: ObjectKind, key: Uuid) -> Result<(), EngineError> {
        self.working_copy()?.remove(kind, key)
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if self.transaction.take().is_some() {
            self.shared.release_write_lock();
        }
    }
}
