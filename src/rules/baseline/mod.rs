// Copyright 2025 Mullvad VPN AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Rules installed in the baseline sublayer, which controls all traffic except DNS.

mod block_all;
pub use self::block_all::*;

mod permit_dhcp;
pub use self::permit_dhcp::*;

mod permit_dns;
pub use self::permit_dns::*;

mod permit_endpoint;
pub use self::permit_endpoint::*;

mod permit_lan;
pub use self::permit_lan::*;

mod permit_loopback;
pub use self::permit_loopback::*;

mod permit_ndp;
pub use self::permit_ndp::*;

mod permit_vpn_tunnel;
pub use self::permit_vpn_tunnel::*;
