// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fake backends shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use calib_lamps::protocol::{KeywordCallback, KeywordValue, RemoteBus, RemoteReply};
use calib_lamps::subscription::{KeywordRegistry, SubscriptionId};
use calib_lamps::{RelayConfig, RemoteError};
use parking_lot::Mutex;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

// ============================================================================
// Relay bank
// ============================================================================

/// How the fake relay bank answers one request.
pub enum Reply {
    /// Send this line back.
    Line(String),
    /// Hang up without replying.
    Close,
    /// Never reply.
    Silent,
}

type Responder = Arc<dyn Fn(&str) -> Reply + Send + Sync>;

#[derive(Default)]
struct Traffic {
    requests: Mutex<Vec<String>>,
    connections: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// TCP server speaking the relay bank line protocol.
pub struct FakeRelay {
    addr: SocketAddr,
    traffic: Arc<Traffic>,
    server: JoinHandle<()>,
}

impl FakeRelay {
    /// Starts a server that answers every request with `respond`.
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let traffic = Arc::new(Traffic::default());
        let respond: Responder = Arc::new(respond);

        let server = tokio::spawn({
            let traffic = Arc::clone(&traffic);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    traffic.connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, Arc::clone(&traffic), Arc::clone(&respond)));
                }
            }
        });

        Self {
            addr,
            traffic,
            server,
        }
    }

    /// Starts a server backed by a simulated relay bank.
    pub async fn with_bank(bank: &Arc<RelayBank>) -> Self {
        let bank = Arc::clone(bank);
        Self::start(move |request| bank.respond(request)).await
    }

    /// Client configuration pointing at this server.
    pub fn config(&self) -> RelayConfig {
        RelayConfig::new("127.0.0.1", self.addr.port())
            .with_connect_timeout(Duration::from_secs(1))
            .with_reply_timeout(Duration::from_millis(300))
    }

    /// Raw request lines received so far, terminators included.
    pub fn raw_requests(&self) -> Vec<String> {
        self.traffic.requests.lock().clone()
    }

    /// Request lines received so far, without terminators.
    pub fn requests(&self) -> Vec<String> {
        self.raw_requests()
            .into_iter()
            .map(|line| line.trim_end().to_string())
            .collect()
    }

    /// Number of TCP connections accepted.
    pub fn connections(&self) -> usize {
        self.traffic.connections.load(Ordering::SeqCst)
    }

    /// Highest number of requests handled at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.traffic.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for FakeRelay {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn serve(stream: TcpStream, traffic: Arc<Traffic>, respond: Responder) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
        return;
    }
    traffic.requests.lock().push(line.clone());

    let active = traffic.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    traffic.max_in_flight.fetch_max(active, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let reply = respond(line.trim_end());
    traffic.in_flight.fetch_sub(1, Ordering::SeqCst);

    match reply {
        Reply::Line(text) => {
            let _ = reader.get_mut().write_all(format!("{text}\n").as_bytes()).await;
            let _ = reader.get_mut().flush().await;
            // Wait for the client to hang up.
            let mut rest = String::new();
            let _ = reader.read_line(&mut rest).await;
        }
        Reply::Close => {}
        Reply::Silent => tokio::time::sleep(Duration::from_secs(10)).await,
    }
}

/// Simulated relay bank with one status digit per channel.
pub struct RelayBank {
    channels: Mutex<Vec<(String, u8)>>,
    broken: Mutex<HashSet<usize>>,
}

impl RelayBank {
    pub fn new(channels: &[(&str, u8)]) -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(
                channels
                    .iter()
                    .map(|(tag, status)| ((*tag).to_string(), *status))
                    .collect(),
            ),
            broken: Mutex::new(HashSet::new()),
        })
    }

    /// Makes the relay ignore commands and send a contradicting reply.
    pub fn break_relay(&self, relay: usize) {
        self.broken.lock().insert(relay);
    }

    /// Current status digit of the channel with `tag`.
    pub fn status(&self, tag: &str) -> Option<u8> {
        self.channels
            .lock()
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, status)| *status)
    }

    pub fn set_status(&self, tag: &str, status: u8) {
        if let Some(channel) = self.channels.lock().iter_mut().find(|(t, _)| t == tag) {
            channel.1 = status;
        }
    }

    fn respond(&self, request: &str) -> Reply {
        let words: Vec<&str> = request.split_whitespace().collect();
        match words.as_slice() {
            ["getlamps"] => Reply::Line(
                self.channels
                    .lock()
                    .iter()
                    .map(|(tag, status)| format!("{tag}={status}"))
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            ["lamp", relay, value] => {
                let (Ok(relay), Ok(value)) = (relay.parse::<usize>(), value.parse::<u8>()) else {
                    return Reply::Line("error".into());
                };
                let mut channels = self.channels.lock();
                let Some((tag, status)) = relay.checked_sub(1).and_then(|i| channels.get_mut(i)) else {
                    return Reply::Line("error".into());
                };

                if self.broken.lock().contains(&relay) {
                    return Reply::Line(if value == 1 { "ok".into() } else { format!("{tag} stuck") });
                }

                *status = value;
                Reply::Line(if value == 1 { format!("{tag} on") } else { "ok".into() })
            }
            _ => Reply::Line("error".into()),
        }
    }
}

// ============================================================================
// Remote subsystem
// ============================================================================

pub const SUBSYSTEM: &str = "ffs";
pub const STATUS_KEYWORD: &str = "lampState";

/// A subsystem that switches one lamp and publishes its state.
#[derive(Default)]
pub struct FakeSubsystem {
    keywords: KeywordRegistry,
    sent: Mutex<Vec<String>>,
    lit: Mutex<Option<bool>>,
    failing: AtomicBool,
    reply_with_status: AtomicBool,
}

impl FakeSubsystem {
    pub fn new(lit: Option<bool>) -> Arc<Self> {
        let subsystem = Self::default();
        *subsystem.lit.lock() = lit;
        Arc::new(subsystem)
    }

    /// Makes every command fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes status commands carry the state in their reply.
    pub fn set_reply_with_status(&self, enabled: bool) {
        self.reply_with_status.store(enabled, Ordering::SeqCst);
    }

    /// Changes the lamp state behind the controller's back and publishes it.
    pub fn set_lit(&self, lit: Option<bool>) {
        *self.lit.lock() = lit;
        self.publish();
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn subscriptions(&self) -> usize {
        self.keywords.len()
    }

    fn value(&self) -> KeywordValue {
        match *self.lit.lock() {
            Some(true) => json!("on"),
            Some(false) => json!("off"),
            None => json!("?"),
        }
    }

    fn publish(&self) {
        self.keywords.dispatch(SUBSYSTEM, STATUS_KEYWORD, &self.value());
    }
}

#[async_trait]
impl RemoteBus for FakeSubsystem {
    async fn send_command(&self, subsystem: &str, command: &str) -> Result<RemoteReply, RemoteError> {
        self.sent.lock().push(command.to_string());
        if subsystem != SUBSYSTEM {
            return Err(RemoteError::Transport(format!("no route to {subsystem}")));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Ok(RemoteReply::failed());
        }

        match command {
            "lamp on" => {
                *self.lit.lock() = Some(true);
            }
            "lamp off" => {
                *self.lit.lock() = Some(false);
            }
            "lamp status" => {
                if self.reply_with_status.load(Ordering::SeqCst) {
                    return Ok(RemoteReply::ok().with_value(STATUS_KEYWORD, self.value()));
                }
            }
            _ => return Ok(RemoteReply::failed()),
        }

        self.publish();
        Ok(RemoteReply::ok())
    }

    fn subscribe(&self, subsystem: &str, keyword: &str, callback: KeywordCallback) -> SubscriptionId {
        self.keywords.register(subsystem, keyword, callback)
    }
}

/// Remote lamp configuration matching [`FakeSubsystem`].
pub fn remote_lamp_config() -> calib_lamps::LampConfig {
    calib_lamps::LampConfig::remote(SUBSYSTEM, "lamp on", "lamp off", "lamp status", STATUS_KEYWORD)
}
