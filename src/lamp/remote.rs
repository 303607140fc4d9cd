// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote subsystem operations for lamps.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::RemoteError;
use crate::protocol::{KeywordSignal, KeywordValue, RemoteBus, RemoteReply};
use crate::state::LampState;
use crate::subscription::SubscriptionId;

use super::{Lamp, RemoteLamp};

/// A keyword value addressed to one lamp.
#[derive(Debug, Clone)]
pub(crate) struct KeywordUpdate {
    pub lamp: String,
    pub value: KeywordValue,
}

impl Lamp {
    fn remote(&self) -> Result<&RemoteLamp, RemoteError> {
        self.kind()
            .as_remote()
            .ok_or_else(|| RemoteError::Transport(format!("lamp {:?} is not remote", self.name())))
    }

    /// Upgrades the bus handle, forcing the lamp to `UNKNOWN` if it is gone.
    fn remote_bus(&self, remote: &RemoteLamp) -> Result<Arc<dyn RemoteBus>, RemoteError> {
        match remote.bus.as_ref().and_then(std::sync::Weak::upgrade) {
            Some(bus) => Ok(bus),
            None => {
                self.force_unknown("no messaging connection");
                Err(RemoteError::Unavailable {
                    lamp: self.name().to_string(),
                })
            }
        }
    }

    /// Sends `command` and checks that the subsystem accepted it.
    ///
    /// Any failure forces the lamp to `UNKNOWN`.
    async fn send_remote(&self, remote: &RemoteLamp, command: &str) -> Result<RemoteReply, RemoteError> {
        let bus = self.remote_bus(remote)?;
        tracing::debug!(lamp = %self.name(), subsystem = %remote.subsystem, command, "Sending command");

        let error = match bus.send_command(&remote.subsystem, command).await {
            Ok(reply) if reply.succeeded => return Ok(reply),
            Ok(_) => RemoteError::CommandFailed {
                subsystem: remote.subsystem.clone(),
                command: command.to_string(),
            },
            Err(e) => e,
        };

        self.force_unknown(&error.to_string());
        Err(error)
    }

    /// Applies a value of the lamp's status keyword.
    ///
    /// On and off values switch the lamp through [`request_on`] and
    /// [`request_off`]. Anything else forces it to `UNKNOWN`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidValue`] if the value is not an on/off
    /// signal, or `RemoteError::Transport` if the lamp is not remote.
    ///
    /// [`request_on`]: Lamp::request_on
    /// [`request_off`]: Lamp::request_off
    pub fn apply_keyword(&self, value: &KeywordValue) -> Result<LampState, RemoteError> {
        let remote = self.remote()?;
        match KeywordSignal::interpret(value, &remote.invalid_marker) {
            KeywordSignal::On => Ok(self.request_on(None)),
            KeywordSignal::Off => Ok(self.request_off()),
            KeywordSignal::Invalid => {
                self.force_unknown("invalid keyword value");
                Err(RemoteError::InvalidValue {
                    lamp: self.name().to_string(),
                    value: value.to_string(),
                })
            }
        }
    }

    /// Asks the subsystem for the lamp state.
    ///
    /// A status value carried by the reply is applied right away; otherwise
    /// the state arrives through the keyword subscription.
    pub(crate) async fn update_remote(&self) -> Result<(), RemoteError> {
        let remote = self.remote()?;
        let _commands = self.lock_commands().await;
        let reply = self.send_remote(remote, &remote.command_status).await?;

        if let Some(value) = reply.value(&remote.status_keyword) {
            self.apply_keyword(value)?;
        }
        Ok(())
    }

    /// Sends the on or off command.
    ///
    /// The caller holds [`lock_commands`](Lamp::lock_commands) until it has
    /// applied the outcome. The local state is not touched on success.
    /// Returns the status value the subsystem sent back with its
    /// acknowledgement, if any, so the caller can apply it after its own
    /// transition.
    pub(crate) async fn command_remote(&self, on: bool) -> Result<Option<KeywordValue>, RemoteError> {
        let remote = self.remote()?;
        let command = if on { &remote.command_on } else { &remote.command_off };
        let mut reply = self.send_remote(remote, command).await?;
        Ok(reply.values.remove(&remote.status_keyword))
    }

    /// Subscribes to the status keyword, forwarding values into `sink`.
    ///
    /// Returns `None` if the lamp is not remote or has no bus.
    pub(crate) fn subscribe_remote(
        &self,
        sink: mpsc::UnboundedSender<KeywordUpdate>,
    ) -> Option<SubscriptionId> {
        let remote = self.kind().as_remote()?;
        let bus = remote.bus.as_ref()?.upgrade()?;
        let lamp = self.key();

        let id = bus.subscribe(
            &remote.subsystem,
            &remote.status_keyword,
            Arc::new(move |value: KeywordValue| {
                let update = KeywordUpdate {
                    lamp: lamp.clone(),
                    value,
                };
                if sink.send(update).is_err() {
                    tracing::trace!(lamp = %lamp, "Keyword update dropped, controller gone");
                }
            }),
        );
        tracing::debug!(lamp = %self.name(), subscription = %id, "Subscribed to status keyword");
        Some(id)
    }
}
