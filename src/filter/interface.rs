// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{Error, Result};

use std::fmt;

/// Name of a network interface as the filtering engine knows it. Aliases are live attributes of
/// the interface, so the engine resolves them at the time a filter is added.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceAlias(String);

impl InterfaceAlias {
    pub fn new(alias: impl AsRef<str>) -> Result<Self> {
        let alias = alias.as_ref();
        if alias.is_empty() {
            return Err(Error::InvalidArgument("Empty interface alias"));
        }
        Ok(InterfaceAlias(alias.to_owned()))
    }

    /// Treats an empty alias as absent.
    pub fn optional(alias: Option<&str>) -> Option<Self> {
        alias.and_then(|alias| Self::new(alias).ok())
    }
}

impl AsRef<str> for InterfaceAlias {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl fmt::Display for InterfaceAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    Equal,
    NotEqual,
}

/// Matches traffic by the interface it passes through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceMatch {
    pub alias: InterfaceAlias,
    pub match_type: MatchType,
}

impl InterfaceMatch {
    pub fn equal(alias: InterfaceAlias) -> Self {
        InterfaceMatch {
            alias,
            match_type: MatchType::Equal,
        }
    }

    pub fn not_equal(alias: InterfaceAlias) -> Self {
        InterfaceMatch {
            alias,
            match_type: MatchType::NotEqual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_alias_is_rejected() {
        assert_matches!(InterfaceAlias::new(""), Err(Error::InvalidArgument(_)));
        assert_eq!(InterfaceAlias::optional(Some("")), None);
        assert_eq!(InterfaceAlias::optional(None), None);
        assert_eq!(
            InterfaceAlias::optional(Some("wg0")).map(|alias| alias.to_string()),
            Some("wg0".to_owned())
        );
    }
}
