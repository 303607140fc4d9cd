// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lamp events.
//!
//! A [`LampsController`](crate::controller::LampsController) publishes a
//! [`LampEvent`] on its [`EventBus`] whenever a lamp is added or changes
//! state, whether the change came from a command, a backend refresh, a
//! keyword update or a finished warm-up.

mod event_bus;
mod lamp_event;

pub use event_bus::EventBus;
pub use lamp_event::LampEvent;
