// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Macro for declaring a group of stable object identifiers of one kind. Every identifier becomes
/// a public `Uuid` constant and the group is collected into a `(ObjectKind, Uuid)` table, so a
/// constant can not be declared without also being registered.
macro_rules! identifiers {
    ($table:ident: $kind:ident { $($(#[$attr:meta])* $name:ident = $value:literal,)* }) => {
        $(
            $(#[$attr])*
            pub const $name: ::uuid::Uuid = ::uuid::Uuid::from_u128($value);
        )*

        const $table: &[($crate::identity::ObjectKind, ::uuid::Uuid)] = &[
            $(($crate::identity::ObjectKind::$kind, $name),)*
        ];
    };
}

/// Macro for logging through the sink injected at the boundary, falling back to the `log` facade
/// when no sink is set.
macro_rules! sink_log {
    ($sink:expr, $level:expr, $($arg:tt)+) => {
        match $sink {
            Some(sink) => sink($level, &format!($($arg)+)),
            None => log::log!($level, $($arg)+),
        }
    };
}
