// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay bank requests.

use std::fmt;

use crate::types::RelayId;

/// A request understood by the relay bank.
///
/// # Examples
///
/// ```
/// use calib_lamps::command::RelayCommand;
/// use calib_lamps::types::RelayId;
///
/// assert_eq!(RelayCommand::GetLamps.to_string(), "getlamps");
///
/// let cmd = RelayCommand::set(RelayId::new(2).unwrap(), true);
/// assert_eq!(cmd.to_string(), "lamp 2 1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    /// List every relay channel as `TAG=digit` pairs.
    GetLamps,
    /// Switch one relay.
    SetLamp {
        /// The relay to switch.
        relay: RelayId,
        /// `true` to energize the relay.
        on: bool,
    },
}

impl RelayCommand {
    /// Creates a set-relay request.
    #[must_use]
    pub const fn set(relay: RelayId, on: bool) -> Self {
        Self::SetLamp { relay, on }
    }

    /// Renders the request line, without terminator.
    #[must_use]
    pub fn line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetLamps => f.write_str("getlamps"),
            Self::SetLamp { relay, on } => write!(f, "lamp {relay} {}", u8::from(*on)),
        }
    }
}
