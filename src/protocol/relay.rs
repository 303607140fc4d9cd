// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TCP line protocol client for the relay bank.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::command::RelayCommand;
use crate::error::RelayError;
use crate::response::{LampAck, LampListResponse};
use crate::types::RelayId;

// ============================================================================
// RelayConfig
// ============================================================================

/// Connection parameters for the relay bank.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use calib_lamps::protocol::RelayConfig;
///
/// let config = RelayConfig::new("10.1.1.20", 5000)
///     .with_reply_timeout(Duration::from_secs(1));
///
/// assert_eq!(config.address(), "10.1.1.20:5000");
/// assert_eq!(config.connect_timeout(), RelayConfig::DEFAULT_CONNECT_TIMEOUT);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelayConfig {
    host: String,
    port: u16,
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    connect_timeout: Duration,
    #[serde(default = "default_reply_timeout", with = "duration_secs")]
    reply_timeout: Duration,
    #[serde(default = "default_terminator")]
    terminator: String,
}

fn default_connect_timeout() -> Duration {
    RelayConfig::DEFAULT_CONNECT_TIMEOUT
}

fn default_reply_timeout() -> Duration {
    RelayConfig::DEFAULT_REPLY_TIMEOUT
}

fn default_terminator() -> String {
    RelayConfig::DEFAULT_TERMINATOR.to_string()
}

impl RelayConfig {
    /// Default time allowed to open the TCP connection.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default time allowed for the reply line to arrive.
    pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(3);
    /// Default request terminator.
    pub const DEFAULT_TERMINATOR: &'static str = "\n";

    /// Creates a configuration with default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            reply_timeout: Self::DEFAULT_REPLY_TIMEOUT,
            terminator: Self::DEFAULT_TERMINATOR.to_string(),
        }
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reply timeout.
    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sets the text appended to every request.
    #[must_use]
    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the reply timeout.
    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// Returns the request terminator.
    #[must_use]
    pub fn terminator(&self) -> &str {
        &self.terminator
    }

    /// Creates a client from this configuration.
    #[must_use]
    pub fn into_client(self) -> RelayClient {
        RelayClient::new(self)
    }
}

/// Durations written as (fractional) seconds in configuration files.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, de::Error as _};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

// ============================================================================
// RelayClient
// ============================================================================

/// Client for the relay bank.
///
/// Every request opens a fresh TCP connection, writes one line, reads one
/// line back and closes the connection again. A mutex keeps at most one
/// exchange in flight, so concurrent callers queue up instead of
/// interleaving on the wire.
///
/// # Examples
///
/// ```no_run
/// use calib_lamps::protocol::{RelayClient, RelayConfig};
///
/// # async fn example() -> Result<(), calib_lamps::RelayError> {
/// let client = RelayClient::new(RelayConfig::new("10.1.1.20", 5000));
/// for lamp in client.query_all_lamp_states().await? {
///     println!("{} on relay {}: {:?}", lamp.tag, lamp.relay, lamp.reading());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RelayClient {
    config: RelayConfig,
    connection: Mutex<Option<BufReader<TcpStream>>>,
}

impl RelayClient {
    /// Creates a client. No connection is opened until the first request.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Sends one request line and returns the trimmed reply line.
    ///
    /// The connection is torn down before returning, whether the exchange
    /// succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::ConnectTimeout` or `RelayError::Io` if the
    /// connection cannot be opened, `RelayError::ReplyTimeout` if no reply
    /// arrives in time, and `RelayError::ConnectionClosed` if the peer hangs
    /// up without replying.
    pub async fn send_command(&self, command: &str) -> Result<String, RelayError> {
        let mut connection = self.connection.lock().await;

        // Left over only if a previous caller was cancelled mid-exchange.
        if let Some(stale) = connection.take() {
            disconnect(stale).await;
        }

        let stream = connection.insert(self.connect().await?);
        let result = self.exchange(stream, command).await;

        if let Some(stream) = connection.take() {
            disconnect(stream).await;
        }

        result
    }

    /// Lists every assigned relay channel with its raw status digit.
    ///
    /// # Errors
    ///
    /// Returns any transport error from [`send_command`](Self::send_command).
    pub async fn query_all_lamp_states(&self) -> Result<LampListResponse, RelayError> {
        let reply = self.send_command(&RelayCommand::GetLamps.line()).await?;
        Ok(LampListResponse::parse(&reply))
    }

    /// Switches a relay and checks the confirmation names the lamp correctly.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::ProtocolMismatch` if the reply contradicts the
    /// request, or any transport error.
    pub async fn command_lamp(
        &self,
        relay: RelayId,
        tag: &str,
        on: bool,
    ) -> Result<LampAck, RelayError> {
        let reply = self
            .send_command(&RelayCommand::set(relay, on).line())
            .await?;
        LampAck::confirm(reply, tag, on)
    }

    async fn connect(&self) -> Result<BufReader<TcpStream>, RelayError> {
        let address = self.config.address();
        let timeout = self.config.connect_timeout;

        tracing::debug!(%address, "Connecting to relay controller");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| RelayError::ConnectTimeout {
                address: address.clone(),
                timeout_ms: millis(timeout),
            })??;

        Ok(BufReader::new(stream))
    }

    async fn exchange(
        &self,
        stream: &mut BufReader<TcpStream>,
        command: &str,
    ) -> Result<String, RelayError> {
        tracing::debug!(command, "Sending relay command");

        let line = format!("{command}{}", self.config.terminator);
        stream.get_mut().write_all(line.as_bytes()).await?;
        stream.get_mut().flush().await?;

        let timeout = self.config.reply_timeout;
        let mut reply = String::new();
        let read = tokio::time::timeout(timeout, stream.read_line(&mut reply))
            .await
            .map_err(|_| RelayError::ReplyTimeout {
                command: command.to_string(),
                timeout_ms: millis(timeout),
            })??;

        if read == 0 {
            return Err(RelayError::ConnectionClosed);
        }

        let reply = reply.trim().to_string();
        tracing::debug!(command, reply = %reply, "Relay reply");
        Ok(reply)
    }
}

async fn disconnect(mut stream: BufReader<TcpStream>) {
    if let Err(e) = stream.get_mut().shutdown().await {
        tracing::debug!(error = %e, "Ignoring error closing relay connection");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
