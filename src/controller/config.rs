// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controller and lamp configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result, ValueError};
use crate::lamp::{LampKind, RemoteLamp};
use crate::protocol::RelayConfig;
use crate::types::RelayId;

/// Static configuration of a [`LampsController`](super::LampsController).
///
/// # Examples
///
/// ```
/// use calib_lamps::controller::ControllerConfig;
///
/// let config = ControllerConfig::from_json_str(r#"{
///     "relay": { "host": "10.1.1.20", "port": 5000 },
///     "lamps": {
///         "HeNe": { "mode": "m2", "warm_up_time": 30 },
///         "Flat": {
///             "mode": "actor",
///             "subsystem": "ffs",
///             "command_on": "lamp on",
///             "command_off": "lamp off",
///             "command_status": "lamp status",
///             "status_keyword": "lampState"
///         }
///     }
/// }"#).unwrap();
///
/// assert_eq!(config.lamps.len(), 2);
/// assert_eq!(config.relay.unwrap().port(), 5000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Relay bank connection, if any lamps are wired to one.
    #[serde(default)]
    pub relay: Option<RelayConfig>,
    /// Lamps by display name.
    #[serde(default)]
    pub lamps: BTreeMap<String, LampConfig>,
}

impl ControllerConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not a valid configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the relay bank connection.
    #[must_use]
    pub fn with_relay(mut self, relay: RelayConfig) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Adds a lamp.
    #[must_use]
    pub fn with_lamp(mut self, name: impl Into<String>, lamp: LampConfig) -> Self {
        self.lamps.insert(name.into(), lamp);
        self
    }
}

/// Configuration of one lamp.
///
/// `mode` selects the backend: `"relay"` (or `"m2"`) for a relay bank
/// channel, `"remote"` (or `"actor"`) for a lamp switched by another
/// subsystem. Relay lamps default their tag to the lamp name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LampConfig {
    /// Backend selector.
    pub mode: String,
    /// Warm-up time in seconds.
    #[serde(default)]
    pub warm_up_time: f64,
    /// Relay bank tag.
    #[serde(default, alias = "m2_name")]
    pub tag: Option<String>,
    /// Relay number, if known in advance.
    #[serde(default)]
    pub relay: Option<u32>,
    /// Subsystem that switches a remote lamp.
    #[serde(default, alias = "actor_name")]
    pub subsystem: Option<String>,
    /// Remote command that turns the lamp on.
    #[serde(default)]
    pub command_on: Option<String>,
    /// Remote command that turns the lamp off.
    #[serde(default)]
    pub command_off: Option<String>,
    /// Remote command that reports the lamp state.
    #[serde(default)]
    pub command_status: Option<String>,
    /// Keyword carrying the remote lamp state.
    #[serde(default)]
    pub status_keyword: Option<String>,
    /// Keyword value meaning "state not known".
    #[serde(default)]
    pub invalid_marker: Option<String>,
}

impl LampConfig {
    fn with_mode(mode: &str) -> Self {
        Self {
            mode: mode.to_string(),
            warm_up_time: 0.0,
            tag: None,
            relay: None,
            subsystem: None,
            command_on: None,
            command_off: None,
            command_status: None,
            status_keyword: None,
            invalid_marker: None,
        }
    }

    /// Creates a relay lamp configuration.
    #[must_use]
    pub fn relay(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::with_mode("relay")
        }
    }

    /// Creates a remote lamp configuration.
    #[must_use]
    pub fn remote(
        subsystem: impl Into<String>,
        command_on: impl Into<String>,
        command_off: impl Into<String>,
        command_status: impl Into<String>,
        status_keyword: impl Into<String>,
    ) -> Self {
        Self {
            subsystem: Some(subsystem.into()),
            command_on: Some(command_on.into()),
            command_off: Some(command_off.into()),
            command_status: Some(command_status.into()),
            status_keyword: Some(status_keyword.into()),
            ..Self::with_mode("remote")
        }
    }

    /// Sets the warm-up time.
    #[must_use]
    pub fn with_warm_up(mut self, warm_up: Duration) -> Self {
        self.warm_up_time = warm_up.as_secs_f64();
        self
    }

    /// Sets the relay number.
    #[must_use]
    pub fn with_relay(mut self, relay: u32) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Sets the invalid keyword marker.
    #[must_use]
    pub fn with_invalid_marker(mut self, marker: impl Into<String>) -> Self {
        self.invalid_marker = Some(marker.into());
        self
    }

    /// Validated warm-up time.
    pub(crate) fn warm_up(&self, name: &str) -> Result<Duration> {
        Duration::try_from_secs_f64(self.warm_up_time).map_err(|_| {
            Error::InvalidConfiguration(format!(
                "lamp {name:?}: {}",
                ValueError::InvalidWarmUp(self.warm_up_time)
            ))
        })
    }

    /// Builds the backend data for a lamp called `name`.
    ///
    /// Remote lamps come back without a bus; the controller attaches it.
    pub(crate) fn kind(&self, name: &str) -> Result<LampKind> {
        match self.mode.to_lowercase().as_str() {
            "relay" | "m2" => {
                let relay = self.relay.map(RelayId::new).transpose()?;
                let tag = self.tag.as_deref().unwrap_or(name);
                Ok(LampKind::relay(tag, relay))
            }
            "remote" | "actor" => {
                let field = |value: &Option<String>, what: &str| {
                    value.clone().ok_or_else(|| {
                        Error::InvalidConfiguration(format!("remote lamp {name:?} is missing {what}"))
                    })
                };
                let mut remote = RemoteLamp::new(
                    field(&self.subsystem, "subsystem")?,
                    field(&self.command_on, "command_on")?,
                    field(&self.command_off, "command_off")?,
                    field(&self.command_status, "command_status")?,
                    field(&self.status_keyword, "status_keyword")?,
                );
                if let Some(marker) = &self.invalid_marker {
                    remote = remote.with_invalid_marker(marker.clone());
                }
                Ok(LampKind::Remote(remote))
            }
            _ => Err(Error::InvalidVariant(self.mode.clone())),
        }
    }
}
