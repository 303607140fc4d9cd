// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point-in-time view of a lamp.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::LampState;
use crate::types::RelayId;

use super::{Lamp, LampKind};

/// Serializable copy of a lamp's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LampSnapshot {
    /// Display name.
    pub name: String,
    /// `"relay"` or `"remote"`.
    pub mode: &'static str,
    /// State when the snapshot was taken.
    pub state: LampState,
    /// When the lamp started warming up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_time: Option<DateTime<Utc>>,
    /// Default warm-up time in seconds.
    pub warm_up_time: f64,
    /// Warm-up progress in percent, for lamps that are lit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warm_up_progress: Option<f64>,
    /// Relay bank tag, for relay lamps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Relay number, for relay lamps that have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayId>,
    /// Switching subsystem, for remote lamps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsystem: Option<String>,
}

impl LampSnapshot {
    pub(super) fn new(
        lamp: &Lamp,
        state: LampState,
        on_time: Option<DateTime<Utc>>,
        warm_up_progress: Option<f64>,
    ) -> Self {
        let (tag, relay, subsystem) = match lamp.kind() {
            LampKind::Relay(relay) => (Some(relay.tag().to_string()), relay.relay(), None),
            LampKind::Remote(remote) => (None, None, Some(remote.subsystem().to_string())),
        };

        Self {
            name: lamp.name().to_string(),
            mode: lamp.kind().mode(),
            state,
            on_time,
            warm_up_time: lamp.warm_up_time().as_secs_f64(),
            warm_up_progress,
            tag,
            relay,
            subsystem,
        }
    }
}
