// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Library for composing VPN firewall policies and applying them atomically to a transactional
//! filtering engine.
//!
//! A policy describes which traffic a VPN client may send and receive in one of its connection
//! states: blocked, connecting or connected. The library turns a policy into an ordered set of
//! rules, each of which expands to one or more engine filters, and swaps the complete set into the
//! engine inside a single transaction. Either every filter of the new policy is in place when the
//! transaction commits, or the engine is left exactly as it was.
//!
//! The filters live in two sublayers owned by this library's provider. The baseline sublayer
//! blocks everything except what the active policy permits. The DNS sublayer separately blocks
//! all DNS traffic except to the resolvers the policy names, so that permitting LAN or relay
//! traffic never implicitly permits DNS queries leaving the tunnel.
//!
//! # Usage
//!
//! ```
//! use std::net::Ipv4Addr;
//! use winfw::{
//!     engine::memory::MemoryEngine, AllowedEndpoint, AllowedTunnelTraffic, ConnectingPolicyBuilder,
//!     Endpoint, FirewallController, PolicyStatus, Settings, TransportProtocol,
//!     DEFAULT_LOCK_TIMEOUT,
//! };
//!
//! let engine = MemoryEngine::new();
//! engine.add_interface("wg0");
//!
//! let mut firewall = FirewallController::new(engine.clone());
//! assert_eq!(firewall.initialize(DEFAULT_LOCK_TIMEOUT), PolicyStatus::Success);
//!
//! let relay = Endpoint::new(Ipv4Addr::new(1, 2, 3, 4), 51820, TransportProtocol::Udp);
//! let policy = ConnectingPolicyBuilder::default()
//!     .settings(Settings::new(false))
//!     .relays(vec![AllowedEndpoint::from(relay)])
//!     .entry_interface(Some("wg0".to_owned()))
//!     .entry_traffic(AllowedTunnelTraffic::All)
//!     .build()
//!     .unwrap();
//! assert_eq!(firewall.apply_policy_connecting(policy), PolicyStatus::Success);
//! assert!(!engine.filters().is_empty());
//! ```

#[macro_use]
mod macros;

pub mod net;
pub use crate::net::*;

mod filter;
pub use crate::filter::*;

pub mod identity;

pub mod objects;

pub mod engine;
use crate::engine::EngineError;

mod session;
pub use crate::session::*;

pub mod rules;
pub use crate::rules::{Rule, Ruleset};

mod purger;
pub use crate::purger::*;

mod policy;
pub use crate::policy::*;

mod controller;
pub use crate::controller::*;

use crate::identity::PoolKind;

use std::time::Duration;

/// How long to wait for the engine write lock, unless the caller says otherwise.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the engine write lock while installing persistent blocking filters on
/// shutdown.
pub const DEINITIALIZE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Incompatible values in filter: {0}")]
    InvalidFilter(String),

    #[error("Incomplete policy: {0}")]
    InvalidPolicy(String),

    #[error("Exceeded the {capacity} {family} identifiers of the {pool} pool")]
    PoolExhausted {
        pool: PoolKind,
        family: AddrFamily,
        capacity: usize,
    },

    #[error("Filtering engine operation failed: {0}")]
    Engine(#[from] EngineError),

    #[error("Firewall is already initialized")]
    AlreadyInitialized,

    #[error("Firewall is not initialized")]
    NotInitialized,

    #[error("Checkpoint is ahead of the session's change log")]
    InvalidCheckpoint,
}

impl Error {
    /// Returns true if the engine write lock could not be acquired in time. The operation did
    /// not change anything and may be retried.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Error::Engine(EngineError::LockTimeout(_)))
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;
