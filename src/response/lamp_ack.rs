// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Confirmation of a set-relay request.

use crate::error::RelayError;

/// Reply to [`RelayCommand::SetLamp`](crate::command::RelayCommand::SetLamp).
///
/// The relay bank answers with the lamps that are lit after the change, so a
/// lamp's tag appearing in the reply means it is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LampAck {
    lit: bool,
    reply: String,
}

impl LampAck {
    /// Interprets `reply` for the lamp identified by `tag`.
    #[must_use]
    pub fn new(reply: impl Into<String>, tag: &str) -> Self {
        let reply = reply.into();
        let lit = mentions_tag(&reply, tag);
        Self { lit, reply }
    }

    /// Checks that the reply agrees with the requested relay state.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::ProtocolMismatch` when the tag is missing after
    /// an on request, or present after an off request.
    pub fn confirm(reply: impl Into<String>, tag: &str, on: bool) -> Result<Self, RelayError> {
        let ack = Self::new(reply, tag);
        if ack.lit == on {
            Ok(ack)
        } else {
            Err(RelayError::ProtocolMismatch { reply: ack.reply })
        }
    }

    /// Returns `true` if the reply reports the lamp as lit.
    #[must_use]
    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Returns the raw reply text.
    #[must_use]
    pub fn reply(&self) -> &str {
        &self.reply
    }
}

/// Whole-word match so that `Ne` is not found inside `HeNe`.
fn mentions_tag(reply: &str, tag: &str) -> bool {
    reply
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word == tag)
}
