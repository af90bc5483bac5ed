// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::engine::{EngineError, FilterEngine};
use crate::identity::{self, IdentityQualifier};
use crate::{Result, SessionController, Transaction};

/// Which registered objects a purge removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurgeScope {
    /// Every object ever registered, including those of earlier versions and persistent ones.
    All,
    /// Every registered object that does not survive an engine restart.
    NonPersistent,
}

impl PurgeScope {
    fn qualifier(&self) -> IdentityQualifier {
        match *self {
            PurgeScope::All => IdentityQualifier::all(),
            PurgeScope::NonPersistent => IdentityQualifier::INCLUDE_DEPRECATED,
        }
    }
}

/// Bulk removal of the objects listed in the identifier registry.
pub struct ObjectPurger;

impl ObjectPurger {
    /// Removes every registered object, including persistent ones.
    pub fn remove_all<E: FilterEngine>(transaction: &mut Transaction<'_, E>) -> Result<()> {
        Self::remove(transaction, PurgeScope::All)
    }

    /// Removes every registered object that is not persistent.
    pub fn remove_non_persistent<E: FilterEngine>(
        transaction: &mut Transaction<'_, E>,
    ) -> Result<()> {
        Self::remove(transaction, PurgeScope::NonPersistent)
    }

    /// Runs one purge in a transaction of its own.
    pub fn execute<E: FilterEngine>(
        session: &mut SessionController<E>,
        scope: PurgeScope,
    ) -> Result<()> {
        session.execute_transaction(|transaction| Self::remove(transaction, scope))
    }

    /// Filters go first, then the sublayers they were in, then the providers. Objects that do
    /// not exist are skipped.
    fn remove<E: FilterEngine>(
        transaction: &mut Transaction<'_, E>,
        scope: PurgeScope,
    ) -> Result<()> {
        let registry = identity::detailed_registry(scope.qualifier());
        for (kind, keys) in registry.into_iter().rev() {
            for key in keys {
                match transaction.remove_object(kind, key) {
                    Ok(()) => log::trace!("Removed {kind:?} {key}"),
                    Err(crate::Error::Engine(EngineError::NotFound(_))) => (),
                    Err(error) => return Err(error),
                }
            }
        }
        Ok(())
    }
}
