// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Options and results of controller operations.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::state::LampState;

/// Options for [`LampsController::set_state`](super::LampsController::set_state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetStateOptions {
    /// Warm-up time to use instead of the lamp's default.
    pub warm_up: Option<Duration>,
    /// Refresh all lamps from their backends before deciding.
    pub refresh_first: bool,
}

impl SetStateOptions {
    /// Default options: refresh first, default warm-up.
    #[must_use]
    pub fn new() -> Self {
        Self {
            warm_up: None,
            refresh_first: true,
        }
    }

    /// Overrides the warm-up time.
    #[must_use]
    pub fn with_warm_up(mut self, warm_up: Duration) -> Self {
        self.warm_up = Some(warm_up);
        self
    }

    /// Skips the refresh and decides on cached state.
    #[must_use]
    pub fn without_refresh(mut self) -> Self {
        self.refresh_first = false;
        self
    }
}

impl Default for SetStateOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// What [`LampsController::set_state`](super::LampsController::set_state) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The lamp was already in the requested state; nothing was sent.
    Unchanged,
    /// The backend acknowledged the command.
    Applied,
    /// The command was applied to a lamp whose state was `UNKNOWN`.
    AppliedFromUnknown,
}

impl SetOutcome {
    /// Returns `true` if a command was sent.
    #[must_use]
    pub fn is_applied(self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    /// Returns `true` if the lamp state was uncertain when commanded.
    #[must_use]
    pub fn was_uncertain(self) -> bool {
        matches!(self, Self::AppliedFromUnknown)
    }
}

/// Lamp states gathered by [`LampsController::status`](super::LampsController::status).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// State of every lamp by display name.
    pub lamps: BTreeMap<String, LampState>,
    /// Why the refresh failed, if the states are cached ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<String>,
}

impl StatusReport {
    /// Returns `true` if the states were refreshed from the backends.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.stale.is_none()
    }

    /// Names of lamps whose state is `UNKNOWN`.
    #[must_use]
    pub fn unknown(&self) -> Vec<&str> {
        self.lamps
            .iter()
            .filter(|(_, state)| state.intersects(LampState::UNKNOWN))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
