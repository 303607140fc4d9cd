// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `calib_lamps` library.
//!
//! Failures are grouped by concern: the relay bank transport, the remote
//! subsystem messaging, value validation, and controller-level errors such as
//! unknown lamps or bad configuration.

use thiserror::Error;

use crate::state::LampState;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Relay bank transport or protocol failure.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    /// Remote subsystem command or status failure.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A value failed validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The lamp name is not known to the controller.
    #[error("unknown lamp {0:?}")]
    UnknownLamp(String),

    /// A relay lamp has no relay number assigned yet.
    #[error("missing relay number for lamp {0:?}")]
    MissingAddress(String),

    /// A lamp was configured with an unrecognized backend mode.
    #[error("invalid lamp mode {0:?}, expected \"relay\" or \"remote\"")]
    InvalidVariant(String),

    /// The configuration is inconsistent or incomplete.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A relay lamp was commanded but no relay bank is configured.
    #[error("no relay controller configured")]
    NoRelayBackend,

    /// A lamp did not reach ON within the warm-up deadline.
    #[error("lamp {0:?} timed out warming up")]
    WarmUpTimeout(String),

    /// A lamp left the warm-up sequence without reaching ON.
    #[error("lamp {lamp:?} stopped warming up, state is {state}")]
    WarmUpInterrupted {
        /// Display name of the lamp.
        lamp: String,
        /// The state the lamp ended up in.
        state: LampState,
    },

    /// Configuration text could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Errors talking to the relay bank.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The TCP connection could not be established in time.
    #[error("timed out connecting to relay controller at {address} after {timeout_ms} ms")]
    ConnectTimeout {
        /// `host:port` of the relay bank.
        address: String,
        /// The connect timeout that elapsed.
        timeout_ms: u64,
    },

    /// No reply line arrived in time.
    #[error("timed out waiting for reply to {command:?} after {timeout_ms} ms")]
    ReplyTimeout {
        /// The request that went unanswered.
        command: String,
        /// The reply timeout that elapsed.
        timeout_ms: u64,
    },

    /// The reply contradicts the requested relay state.
    #[error("invalid reply {reply:?}")]
    ProtocolMismatch {
        /// The raw reply text.
        reply: String,
    },

    /// The peer closed the connection before replying.
    #[error("connection closed before a reply was received")]
    ConnectionClosed,

    /// Socket level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from lamps driven by a remote subsystem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The subsystem reported the command as failed.
    #[error("command {command:?} to {subsystem} failed")]
    CommandFailed {
        /// Subsystem the command was sent to.
        subsystem: String,
        /// The command text.
        command: String,
    },

    /// The subsystem published a value that is not an on/off signal.
    #[error("invalid state {value} for lamp {lamp:?}")]
    InvalidValue {
        /// Display name of the lamp.
        lamp: String,
        /// The offending keyword value, JSON encoded.
        value: String,
    },

    /// The messaging collaborator is gone.
    #[error("no messaging connection available to command lamp {lamp:?}")]
    Unavailable {
        /// Display name of the lamp.
        lamp: String,
    },

    /// The messaging collaborator failed to deliver the command.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// Relay numbers start at 1.
    #[error("relay number {0} is out of range [1, 65535]")]
    InvalidRelayId(u32),

    /// An unrecognized lamp state name.
    #[error("invalid lamp state: {0}")]
    InvalidLampState(String),

    /// Warm-up times must be finite and non-negative.
    #[error("invalid warm-up time {0} s")]
    InvalidWarmUp(f64),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` for failures of the relay transport or protocol.
    #[must_use]
    pub fn is_relay(&self) -> bool {
        matches!(self, Self::Relay(_))
    }
}
