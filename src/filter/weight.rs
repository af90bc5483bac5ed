// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Relative priority of a filter within its sublayer. Overlapping filters with a higher weight
/// are evaluated first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeightClass {
    #[default]
    Min,
    Medium,
    Max,
}

impl From<WeightClass> for u8 {
    /// Weight as understood by the filtering engine. The engine orders weights from 0 to 15.
    fn from(weight: WeightClass) -> Self {
        match weight {
            WeightClass::Min => 0,
            WeightClass::Medium => 8,
            WeightClass::Max => 15,
        }
    }
}
