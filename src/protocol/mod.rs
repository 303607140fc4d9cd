// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backends that physically switch lamps.
//!
//! # Backends
//!
//! - [`RelayClient`]: a relay bank reachable over a one-line-per-connection
//!   TCP protocol. The client owns the connection and serializes access.
//! - [`RemoteBus`]: a messaging collaborator that forwards named commands to
//!   another subsystem and delivers the keywords it publishes. Implemented by
//!   the application.

mod relay;
mod remote;

pub use relay::{RelayClient, RelayConfig};
pub use remote::{KeywordCallback, KeywordSignal, KeywordValue, RemoteBus, RemoteReply};
