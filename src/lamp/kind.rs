// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backend-specific lamp data.

use std::fmt;
use std::sync::Weak;

use parking_lot::Mutex;

use crate::protocol::RemoteBus;
use crate::types::RelayId;

/// The backend that switches a lamp.
#[derive(Debug)]
pub enum LampKind {
    /// Wired to a relay bank channel.
    Relay(RelayLamp),
    /// Switched by another subsystem.
    Remote(RemoteLamp),
}

impl LampKind {
    /// Creates a relay-backed kind.
    #[must_use]
    pub fn relay(tag: impl Into<String>, relay: Option<RelayId>) -> Self {
        Self::Relay(RelayLamp::new(tag, relay))
    }

    /// Short name of the backend, as used in configuration.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Relay(_) => "relay",
            Self::Remote(_) => "remote",
        }
    }

    /// Returns the relay data for relay lamps.
    #[must_use]
    pub fn as_relay(&self) -> Option<&RelayLamp> {
        match self {
            Self::Relay(relay) => Some(relay),
            Self::Remote(_) => None,
        }
    }

    /// Returns the remote data for remote lamps.
    #[must_use]
    pub fn as_remote(&self) -> Option<&RemoteLamp> {
        match self {
            Self::Remote(remote) => Some(remote),
            Self::Relay(_) => None,
        }
    }
}

/// A lamp on a relay bank channel.
///
/// The relay number can be unknown until the relay bank lists the lamp.
#[derive(Debug)]
pub struct RelayLamp {
    tag: String,
    relay: Mutex<Option<RelayId>>,
}

impl RelayLamp {
    /// Creates relay lamp data.
    #[must_use]
    pub fn new(tag: impl Into<String>, relay: Option<RelayId>) -> Self {
        Self {
            tag: tag.into(),
            relay: Mutex::new(relay),
        }
    }

    /// Identifier the relay bank uses for this lamp.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Relay number, if known.
    #[must_use]
    pub fn relay(&self) -> Option<RelayId> {
        *self.relay.lock()
    }

    /// Records the relay number unless one is already known.
    ///
    /// Returns `true` if the number was recorded.
    pub fn assign_relay(&self, relay: RelayId) -> bool {
        let mut current = self.relay.lock();
        if current.is_some() {
            return false;
        }
        *current = Some(relay);
        true
    }
}

/// A lamp switched through commands to a remote subsystem.
pub struct RemoteLamp {
    pub(super) subsystem: String,
    pub(super) command_on: String,
    pub(super) command_off: String,
    pub(super) command_status: String,
    pub(super) status_keyword: String,
    pub(super) invalid_marker: String,
    pub(super) bus: Option<Weak<dyn RemoteBus>>,
}

impl RemoteLamp {
    /// Value subsystems publish when they do not know a lamp's state.
    pub const DEFAULT_INVALID_MARKER: &'static str = "?";

    /// Creates remote lamp data without a messaging connection.
    #[must_use]
    pub fn new(
        subsystem: impl Into<String>,
        command_on: impl Into<String>,
        command_off: impl Into<String>,
        command_status: impl Into<String>,
        status_keyword: impl Into<String>,
    ) -> Self {
        Self {
            subsystem: subsystem.into(),
            command_on: command_on.into(),
            command_off: command_off.into(),
            command_status: command_status.into(),
            status_keyword: status_keyword.into(),
            invalid_marker: Self::DEFAULT_INVALID_MARKER.to_string(),
            bus: None,
        }
    }

    /// Sets the value that marks the keyword as invalid.
    #[must_use]
    pub fn with_invalid_marker(mut self, marker: impl Into<String>) -> Self {
        self.invalid_marker = marker.into();
        self
    }

    /// Attaches the messaging connection used to send commands.
    #[must_use]
    pub fn with_bus(mut self, bus: Weak<dyn RemoteBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Subsystem that switches the lamp.
    #[must_use]
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    /// Command that turns the lamp on.
    #[must_use]
    pub fn command_on(&self) -> &str {
        &self.command_on
    }

    /// Command that turns the lamp off.
    #[must_use]
    pub fn command_off(&self) -> &str {
        &self.command_off
    }

    /// Command that makes the subsystem report the lamp state.
    #[must_use]
    pub fn command_status(&self) -> &str {
        &self.command_status
    }

    /// Keyword carrying the lamp state.
    #[must_use]
    pub fn status_keyword(&self) -> &str {
        &self.status_keyword
    }

    /// Value that marks the keyword as invalid.
    #[must_use]
    pub fn invalid_marker(&self) -> &str {
        &self.invalid_marker
    }
}

impl fmt::Debug for RemoteLamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLamp")
            .field("subsystem", &self.subsystem)
            .field("command_on", &self.command_on)
            .field("command_off", &self.command_off)
            .field("command_status", &self.command_status)
            .field("status_keyword", &self.status_keyword)
            .field("connected", &self.bus.as_ref().is_some_and(|bus| bus.strong_count() > 0))
            .finish_non_exhaustive()
    }
}
