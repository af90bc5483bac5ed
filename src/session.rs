// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::engine::{EngineError, FilterEngine};
use crate::identity::ObjectKind;
use crate::{Error, Filter, Provider, Result, Sublayer};
use scopeguard::ScopeGuard;
use uuid::Uuid;

/// Something rules can install their filters into.
pub trait ObjectInstaller {
    fn add_filter(&mut self, filter: Filter) -> Result<()>;
}

/// Collects filters without installing them anywhere.
impl ObjectInstaller for Vec<Filter> {
    fn add_filter(&mut self, filter: Filter) -> Result<()> {
        self.push(filter);
        Ok(())
    }
}

/// Marker into a session's change log. Reverting to it removes everything added after it was
/// taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checkpoint(usize);

/// Owns a session with the filtering engine and remembers every object added through it, in
/// order. The engine is only ever changed inside [`SessionController::execute_transaction`].
#[derive(Debug)]
pub struct SessionController<E: FilterEngine> {
    engine: E,
    changes: Vec<(ObjectKind, Uuid)>,
}

impl<E: FilterEngine> SessionController<E> {
    pub fn new(engine: E) -> Self {
        SessionController {
            engine,
            changes: Vec::new(),
        }
    }

    /// Runs `operation` inside an engine transaction. The transaction is committed if
    /// `operation` succeeds and aborted if it, or the commit, fails or panics. Either way the
    /// engine ends up with all or none of the changes.
    pub fn execute_transaction<T, F>(&mut self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_, E>) -> Result<T>,
    {
        self.engine.begin_transaction()?;
        let changes_before = self.changes.clone();

        // Rolls back on every way out except a successful commit, unwinding included.
        let mut controller = scopeguard::guard(self, move |controller| {
            controller.changes = changes_before;
            controller.abort();
        });
        let value = operation(&mut Transaction {
            controller: &mut **controller,
        })?;
        controller.engine.commit_transaction()?;

        ScopeGuard::into_inner(controller);
        Ok(value)
    }

    fn abort(&mut self) {
        if let Err(error) = self.engine.abort_transaction() {
            // A failed commit has already ended the transaction.
            if error != EngineError::NoTransaction {
                log::error!("Failed to abort transaction: {error}");
            }
        }
    }

    /// Marks the current end of the change log.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.changes.len())
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }
}

/// An ongoing engine transaction. Handed to the operation run by
/// [`SessionController::execute_transaction`].
pub struct Transaction<'a, E: FilterEngine> {
    controller: &'a mut SessionController<E>,
}

impl<E: FilterEngine> Transaction<'_, E> {
    /// Adds a provider. A provider that already exists is left alone and is not recorded, so
    /// reverting never removes it.
    pub fn add_provider(&mut self, provider: &Provider) -> Result<()> {
        match self.controller.engine.add_provider(provider) {
            Ok(()) => {
                self.record(ObjectKind::Provider, provider.key);
                Ok(())
            }
            Err(EngineError::AlreadyExists(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Adds a sublayer. Existing sublayers are treated like existing providers.
    pub fn add_sublayer(&mut self, sublayer: &Sublayer) -> Result<()> {
        match self.controller.engine.add_sublayer(sublayer) {
            Ok(()) => {
                self.record(ObjectKind::Sublayer, sublayer.key);
                Ok(())
            }
            Err(EngineError::AlreadyExists(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Removes any object, whether or not it was added through this session.
    pub fn remove_object(&mut self, kind: ObjectKind, key: Uuid) -> Result<()> {
        self.controller.engine.remove_object(kind, key)?;
        self.controller.changes.retain(|&change| change != (kind, key));
        Ok(())
    }

    /// Marks the current end of the change log, including changes made in this transaction.
    pub fn peek_checkpoint(&self) -> Checkpoint {
        self.controller.checkpoint()
    }

    /// Removes every object added after `checkpoint`, most recent first.
    pub fn revert(&mut self, checkpoint: Checkpoint) -> Result<()> {
        let Checkpoint(target) = checkpoint;
        if target > self.controller.changes.len() {
            return Err(Error::InvalidCheckpoint);
        }
        while self.controller.changes.len() > target {
            if let Some(&(kind, key)) = self.controller.changes.last() {
                self.controller.engine.remove_object(kind, key)?;
                self.controller.changes.pop();
            }
        }
        Ok(())
    }

    fn record(&mut self, kind: ObjectKind, key: Uuid) {
        self.controller.changes.push((kind, key));
    }
}

impl<E: FilterEngine> ObjectInstaller for Transaction<'_, E> {
    fn add_filter(&mut self, filter: Filter) -> Result<()> {
        self.controller.engine.add_filter(&filter)?;
        self.record(ObjectKind::Filter, filter.key());
        Ok(())
    }
}
