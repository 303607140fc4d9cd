// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validated value types.
//!
//! - [`RelayId`] - Relay bank channel number (1-65535)

mod relay_id;

pub use relay_id::RelayId;
