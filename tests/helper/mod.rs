pub use scopeguard;

pub mod inspect;

use winfw::engine::memory::MemoryEngine;
use winfw::identity::{self, IdentityQualifier};

pub const TUNNEL_ENTRY: &str = "wg-entry";
pub const TUNNEL_EXIT: &str = "wg-exit";

/// An engine that knows about both tunnel interfaces.
pub fn new_engine() -> MemoryEngine {
    let engine = MemoryEngine::new();
    engine.add_interface(TUNNEL_ENTRY);
    engine.add_interface(TUNNEL_EXIT);
    engine
}

/// Every object left in the engine must be one the firewall knows how to purge.
pub fn assert_registered_objects_only(engine: &MemoryEngine) {
    if std::thread::panicking() {
        return;
    }
    let registry = identity::registry(IdentityQualifier::all());
    let unknown: Vec<_> = engine.object_keys().difference(&registry).copied().collect();
    assert!(unknown.is_empty(), "Unregistered objects in engine: {unknown:?}");
}

#[macro_export]
macro_rules! test {
    ($name:ident($engine:ident) $block:block) => {
        #[test]
        fn $name() {
            let $engine = helper::new_engine();

            let checked_engine = $engine.clone();
            let _guard1 = helper::scopeguard::guard((), move |_| {
                helper::assert_registered_objects_only(&checked_engine)
            });
            let _guard2 = helper::scopeguard::guard((), |_| after_each());

            before_each();
            $block;
        }
    };
}
