// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lamp event types.

use crate::state::LampState;

/// Events published by a [`LampsController`](crate::controller::LampsController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LampEvent {
    /// A lamp was added to the controller.
    LampAdded {
        /// Display name of the lamp.
        lamp: String,
        /// `true` if the relay bank reported the lamp and it was not configured.
        discovered: bool,
    },

    /// A lamp moved to a different state.
    StateChanged {
        /// Display name of the lamp.
        lamp: String,
        /// State before the transition.
        previous: LampState,
        /// State after the transition.
        current: LampState,
    },
}

impl LampEvent {
    /// Creates a `LampAdded` event.
    #[must_use]
    pub fn lamp_added(lamp: impl Into<String>, discovered: bool) -> Self {
        Self::LampAdded {
            lamp: lamp.into(),
            discovered,
        }
    }

    /// Creates a `StateChanged` event.
    #[must_use]
    pub fn state_changed(lamp: impl Into<String>, previous: LampState, current: LampState) -> Self {
        Self::StateChanged {
            lamp: lamp.into(),
            previous,
            current,
        }
    }

    /// Returns the display name of the lamp the event is about.
    #[must_use]
    pub fn lamp(&self) -> &str {
        match self {
            Self::LampAdded { lamp, .. } | Self::StateChanged { lamp, .. } => lamp,
        }
    }
}
