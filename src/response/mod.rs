// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsing of relay bank replies.
//!
//! Replies are single text lines. [`LampListResponse`] decodes the channel
//! listing and [`LampAck`] validates the answer to a set-relay request.

mod lamp_ack;
mod lamp_list;

pub use lamp_ack::LampAck;
pub use lamp_list::{LampListResponse, RelayLampStatus, RelayReading};
