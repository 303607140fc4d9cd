// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keyword subscriptions for remote subsystems.
//!
//! Remote lamps learn about their state from keywords that their subsystem
//! publishes. [`KeywordRegistry`] is a ready-made fan-out table that
//! [`RemoteBus`](crate::protocol::RemoteBus) implementations can use to hand
//! each published value to the callbacks that asked for it.

mod keyword_registry;

pub use keyword_registry::{KeywordRegistry, SubscriptionId};
