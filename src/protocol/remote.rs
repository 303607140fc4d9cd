// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Messaging interface to remote subsystems.
//!
//! Lamps that are switched by another subsystem are driven through a
//! [`RemoteBus`]: a request/response channel for named commands plus a
//! publish/subscribe channel for status keywords. The library does not ship
//! a transport; the application provides one.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::RemoteError;
use crate::subscription::SubscriptionId;

/// A keyword value published by a remote subsystem.
pub type KeywordValue = Value;

/// Callback invoked with every new value of a subscribed keyword.
///
/// Callbacks may be invoked from any thread and must not block.
pub type KeywordCallback = Arc<dyn Fn(KeywordValue) + Send + Sync>;

/// Outcome of a command sent to a remote subsystem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteReply {
    /// Whether the subsystem reported success.
    pub succeeded: bool,
    /// Keywords the subsystem returned with its reply.
    pub values: Map<String, Value>,
}

impl RemoteReply {
    /// A successful reply without values.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            succeeded: true,
            values: Map::new(),
        }
    }

    /// A failed reply.
    #[must_use]
    pub fn failed() -> Self {
        Self::default()
    }

    /// Adds a keyword value to the reply.
    #[must_use]
    pub fn with_value(mut self, keyword: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(keyword.into(), value.into());
        self
    }

    /// Returns the value of `keyword` if the reply carries it.
    #[must_use]
    pub fn value(&self, keyword: &str) -> Option<&Value> {
        self.values.get(keyword)
    }
}

/// Messaging collaborator used by remote lamps.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use calib_lamps::protocol::{KeywordCallback, RemoteBus, RemoteReply};
/// use calib_lamps::subscription::{KeywordRegistry, SubscriptionId};
/// use calib_lamps::RemoteError;
///
/// struct Loopback {
///     keywords: KeywordRegistry,
/// }
///
/// #[async_trait]
/// impl RemoteBus for Loopback {
///     async fn send_command(&self, _subsystem: &str, _command: &str) -> Result<RemoteReply, RemoteError> {
///         Ok(RemoteReply::ok())
///     }
///
///     fn subscribe(&self, subsystem: &str, keyword: &str, callback: KeywordCallback) -> SubscriptionId {
///         self.keywords.register(subsystem, keyword, callback)
///     }
/// }
/// ```
#[async_trait]
pub trait RemoteBus: Send + Sync {
    /// Sends `command` to `subsystem` and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Transport` if the command could not be
    /// delivered. A delivered command that the subsystem rejects is reported
    /// through [`RemoteReply::succeeded`].
    async fn send_command(&self, subsystem: &str, command: &str)
    -> Result<RemoteReply, RemoteError>;

    /// Registers `callback` for updates of `keyword` published by `subsystem`.
    fn subscribe(&self, subsystem: &str, keyword: &str, callback: KeywordCallback)
    -> SubscriptionId;
}

/// How a keyword value maps onto the lamp state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordSignal {
    /// The subsystem reports the lamp on.
    On,
    /// The subsystem reports the lamp off.
    Off,
    /// The value is absent, flagged invalid, or not an on/off signal.
    Invalid,
}

impl KeywordSignal {
    /// Interprets a keyword value.
    ///
    /// Booleans, integers and the usual textual spellings of on/off are
    /// recognized. `invalid_marker` is the value the subsystem publishes when
    /// it does not know the state itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use calib_lamps::protocol::KeywordSignal;
    /// use serde_json::json;
    ///
    /// assert_eq!(KeywordSignal::interpret(&json!(true), "?"), KeywordSignal::On);
    /// assert_eq!(KeywordSignal::interpret(&json!(0), "?"), KeywordSignal::Off);
    /// assert_eq!(KeywordSignal::interpret(&json!("Off"), "?"), KeywordSignal::Off);
    /// assert_eq!(KeywordSignal::interpret(&json!("?"), "?"), KeywordSignal::Invalid);
    /// ```
    #[must_use]
    pub fn interpret(value: &KeywordValue, invalid_marker: &str) -> Self {
        match value {
            Value::Bool(on) => Self::from_bool(*on),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::from_bool(i != 0),
                None => Self::Invalid,
            },
            Value::String(s) => Self::from_text(s, invalid_marker),
            Value::Array(items) if items.len() == 1 => Self::interpret(&items[0], invalid_marker),
            _ => Self::Invalid,
        }
    }

    fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    fn from_text(text: &str, invalid_marker: &str) -> Self {
        let text = text.trim();
        if text.eq_ignore_ascii_case(invalid_marker) {
            return Self::Invalid;
        }

        match text.to_ascii_lowercase().as_str() {
            "on" | "true" | "t" | "yes" | "1" => Self::On,
            "off" | "false" | "f" | "no" | "0" => Self::Off,
            _ => Self::Invalid,
        }
    }
}
