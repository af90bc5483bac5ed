// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The filtering engine this crate drives. The engine owns the live objects and provides
//! transactions over them; everything above it only talks to the engine through [`FilterEngine`].

use crate::identity::ObjectKind;
use crate::{Filter, Provider, Sublayer};
use uuid::Uuid;

use std::time::Duration;

pub mod memory;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Timed out after {0:?} waiting for the engine write lock")]
    LockTimeout(Duration),
    #[error("Object {0} already exists")]
    AlreadyExists(Uuid),
    #[error("Object {0} does not exist")]
    NotFound(Uuid),
    #[error("Object {0} is referenced by other objects")]
    ObjectInUse(Uuid),
    #[error("Provider {0} does not exist")]
    MissingProvider(Uuid),
    #[error("Sublayer {0} does not exist")]
    MissingSublayer(Uuid),
    #[error("No interface with alias \"{0}\"")]
    UnknownInterface(String),
    #[error("The engine rejected object {0}")]
    Rejected(Uuid),
    #[error("No transaction in progress")]
    NoTransaction,
    #[error("A transaction is already in progress")]
    TransactionInProgress,
}

/// A session with the filtering engine. Objects can only be added or removed inside a
/// transaction, and a transaction holds the engine wide write lock until it is committed or
/// aborted.
pub trait FilterEngine {
    /// Starts a transaction. Blocks for at most the session's timeout while waiting for the
    /// write lock, then fails with [`EngineError::LockTimeout`].
    fn begin_transaction(&mut self) -> Result<(), EngineError>;

    /// Makes every change since `begin_transaction` visible at once.
    fn commit_transaction(&mut self) -> Result<(), EngineError>;

    /// Discards every change since `begin_transaction`.
    fn abort_transaction(&mut self) -> Result<(), EngineError>;

    fn add_provider(&mut self, provider: &Provider) -> Result<(), EngineError>;

    fn add_sublayer(&mut self, sublayer: &Sublayer) -> Result<(), EngineError>;

    fn add_filter(&mut self, filter: &Filter) -> Result<(), EngineError>;

    fn remove_object(&mut self, kind: ObjectKind, key: Uuid) -> Result<(), EngineError>;
}

/// Opens sessions with a filtering engine.
pub trait SessionFactory {
    type Session: FilterEngine;

    /// Opens a new session. `timeout` bounds every wait for the engine write lock made through
    /// the session.
    fn open_session(&self, timeout: Duration) -> Result<Self::Session, EngineError>;
}
