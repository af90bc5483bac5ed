use std::collections::BTreeSet;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use uuid::Uuid;
use winfw::engine::memory::MemoryEngine;
use winfw::{Condition, Filter, FilterAction, MatchType};

/// Keys of the committed filters, ordered so they compare easily.
pub fn filter_keys(engine: &MemoryEngine) -> BTreeSet<Uuid> {
    engine.filters().iter().map(Filter::key).collect()
}

pub fn filters_in_sublayer(engine: &MemoryEngine, sublayer: Uuid) -> Vec<Filter> {
    engine
        .filters()
        .into_iter()
        .filter(|filter| filter.sublayer() == sublayer)
        .collect()
}

/// Permitting filters that match `ip` as their remote address.
pub fn permits_to(engine: &MemoryEngine, ip: IpAddr) -> Vec<Filter> {
    engine
        .filters()
        .into_iter()
        .filter(|filter| filter.action() == FilterAction::Permit)
        .filter(|filter| filter.remote_addresses().any(|net| *net == IpNetwork::from(ip)))
        .collect()
}

pub fn remote_port(filter: &Filter) -> Option<u16> {
    filter.conditions().iter().find_map(|condition| match condition {
        Condition::RemotePort(port) => Some(*port),
        _ => None,
    })
}

/// Alias the filter is scoped to, if it requires a match rather than an exclusion.
pub fn required_interface(filter: &Filter) -> Option<&str> {
    filter
        .interface()
        .filter(|interface| interface.match_type == MatchType::Equal)
        .map(|interface| interface.alias.as_ref())
}

pub fn excluded_interface(filter: &Filter) -> Option<&str> {
    filter
        .interface()
        .filter(|interface| interface.match_type == MatchType::NotEqual)
        .map(|interface| interface.alias.as_ref())
}
