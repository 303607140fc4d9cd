// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controller for a set of calibration lamps.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::event::{EventBus, LampEvent};
use crate::lamp::{KeywordUpdate, Lamp, LampKind, LampSnapshot};
use crate::protocol::{RelayClient, RelayConfig, RemoteBus};
use crate::response::{RelayLampStatus, RelayReading};
use crate::state::LampState;

use super::config::{ControllerConfig, LampConfig};
use super::outcome::{SetOutcome, SetStateOptions, StatusReport};

type LampMap = BTreeMap<String, Lamp>;

/// Extra time granted on top of the warm-up before giving up on a lamp.
pub const WARM_UP_GRACE: Duration = Duration::from_secs(5);

/// Owns the lamps and drives them through their backends.
///
/// Lamps are keyed by their lowercased name. Relay lamps share one
/// [`RelayClient`]; remote lamps talk to their subsystem through a
/// [`RemoteBus`] supplied by the application.
///
/// # Examples
///
/// ```no_run
/// use calib_lamps::controller::{ControllerConfig, LampConfig, LampsController};
/// use calib_lamps::protocol::RelayConfig;
///
/// #[tokio::main]
/// async fn main() -> calib_lamps::Result<()> {
///     let config = ControllerConfig::new()
///         .with_relay(RelayConfig::new("10.1.1.20", 5000))
///         .with_lamp("HeNe", LampConfig::relay("HeNe"));
///     let controller = LampsController::from_config(config, None)?;
///
///     // Learn the relay numbers and current states.
///     controller.update().await?;
///
///     controller.turn_on_and_wait("hene", None).await?;
///     println!("{controller}");
///     Ok(())
/// }
/// ```
pub struct LampsController {
    lamps: Arc<RwLock<LampMap>>,
    relay: Option<RelayClient>,
    bus: Option<Arc<dyn RemoteBus>>,
    event_bus: EventBus,
    keyword_tx: mpsc::UnboundedSender<KeywordUpdate>,
    keyword_rx: Mutex<Option<mpsc::UnboundedReceiver<KeywordUpdate>>>,
    keyword_pump: Mutex<Option<JoinHandle<()>>>,
}

impl LampsController {
    /// Creates a controller without lamps or backends.
    #[must_use]
    pub fn new() -> Self {
        Self::with_event_bus(EventBus::new())
    }

    /// Creates a controller with a custom event channel capacity.
    #[must_use]
    pub fn with_capacity(event_capacity: usize) -> Self {
        Self::with_event_bus(EventBus::with_capacity(event_capacity))
    }

    fn with_event_bus(event_bus: EventBus) -> Self {
        let (keyword_tx, keyword_rx) = mpsc::unbounded_channel();
        Self {
            lamps: Arc::new(RwLock::new(BTreeMap::new())),
            relay: None,
            bus: None,
            event_bus,
            keyword_tx,
            keyword_rx: Mutex::new(Some(keyword_rx)),
            keyword_pump: Mutex::new(None),
        }
    }

    /// Connects relay lamps to the relay bank described by `config`.
    #[must_use]
    pub fn with_relay(mut self, config: RelayConfig) -> Self {
        self.relay = Some(RelayClient::new(config));
        self
    }

    /// Sets the messaging connection used by remote lamps.
    ///
    /// Must be set before remote lamps are added. Lamps only keep a weak
    /// handle; the controller keeps the bus alive.
    #[must_use]
    pub fn with_remote_bus(mut self, bus: Arc<dyn RemoteBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds a controller and adds every configured lamp.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`add_lamp`](Self::add_lamp).
    pub fn from_config(config: ControllerConfig, bus: Option<Arc<dyn RemoteBus>>) -> Result<Self> {
        let mut controller = Self::new();
        if let Some(relay) = config.relay {
            controller = controller.with_relay(relay);
        }
        if let Some(bus) = bus {
            controller = controller.with_remote_bus(bus);
        }
        for (name, lamp) in &config.lamps {
            controller.add_lamp(name, lamp)?;
        }
        Ok(controller)
    }

    // =========================================================================
    // Lamp collection
    // =========================================================================

    /// Adds a lamp.
    ///
    /// Remote lamps subscribe to their status keyword right away. Keyword
    /// values are applied by a background task. When the lamp is added
    /// outside a Tokio runtime, values queue until the controller is next
    /// used from inside one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVariant`] for an unknown mode,
    /// [`Error::InvalidConfiguration`] for a name already in use or
    /// incomplete settings, and [`Error::Value`] for a bad relay number.
    pub fn add_lamp(&self, name: &str, config: &LampConfig) -> Result<Lamp> {
        let warm_up = config.warm_up(name)?;
        let kind = match config.kind(name)? {
            LampKind::Remote(remote) => match &self.bus {
                Some(bus) => LampKind::Remote(remote.with_bus(Arc::downgrade(bus))),
                None => {
                    tracing::warn!(lamp = %name, "Remote lamp added without a messaging connection");
                    LampKind::Remote(remote)
                }
            },
            relay => relay,
        };

        let lamp = Lamp::with_event_bus(name, warm_up, kind, self.event_bus.clone());
        self.insert(lamp, false)
    }

    fn insert(&self, lamp: Lamp, discovered: bool) -> Result<Lamp> {
        match self.lamps.write().entry(lamp.key()) {
            Entry::Occupied(_) => {
                return Err(Error::InvalidConfiguration(format!(
                    "duplicate lamp name {:?}",
                    lamp.name()
                )));
            }
            Entry::Vacant(entry) => {
                entry.insert(lamp.clone());
            }
        }

        if lamp.subscribe_remote(self.keyword_tx.clone()).is_some() {
            self.start_keyword_pump();
        }

        tracing::debug!(lamp = %lamp.name(), mode = lamp.kind().mode(), discovered, "Lamp added");
        self.event_bus.publish(LampEvent::lamp_added(lamp.name(), discovered));
        Ok(lamp)
    }

    /// Looks up a lamp by name, case-insensitively.
    #[must_use]
    pub fn lamp(&self, name: &str) -> Option<Lamp> {
        self.lamps.read().get(&name.to_lowercase()).cloned()
    }

    fn require(&self, name: &str) -> Result<Lamp> {
        self.lamp(name)
            .ok_or_else(|| Error::UnknownLamp(name.to_string()))
    }

    /// All lamps, ordered by key.
    #[must_use]
    pub fn lamps(&self) -> Vec<Lamp> {
        self.lamps.read().values().cloned().collect()
    }

    /// Current state of every lamp by display name, without refreshing.
    #[must_use]
    pub fn states(&self) -> BTreeMap<String, LampState> {
        self.lamps
            .read()
            .values()
            .map(|lamp| (lamp.name().to_string(), lamp.state()))
            .collect()
    }

    /// Serializable view of every lamp, ordered by key.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LampSnapshot> {
        self.lamps().iter().map(Lamp::snapshot).collect()
    }

    /// Number of lamps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lamps.read().len()
    }

    /// Returns `true` if there are no lamps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lamps.read().is_empty()
    }

    /// The relay bank client, if configured.
    #[must_use]
    pub fn relay(&self) -> Option<&RelayClient> {
        self.relay.as_ref()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes to lamp events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LampEvent> {
        self.event_bus.subscribe()
    }

    /// Returns the number of active event subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.event_bus.subscriber_count()
    }

    /// Spawns the task applying keyword values, unless it already runs.
    fn start_keyword_pump(&self) {
        let mut receiver = self.keyword_rx.lock();
        if receiver.is_none() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No Tokio runtime yet, keyword updates are queued");
            return;
        };

        if let Some(rx) = receiver.take() {
            let lamps = Arc::downgrade(&self.lamps);
            *self.keyword_pump.lock() = Some(runtime.spawn(pump_keywords(lamps, rx)));
        }
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Refreshes every lamp from its backend.
    ///
    /// The relay bank and the remote lamps are queried concurrently. Relay
    /// channels that no configured lamp claims are added as new lamps. A
    /// remote lamp that fails to report ends up `UNKNOWN` without failing the
    /// whole refresh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Relay`] if the relay bank could not be queried. All
    /// relay lamps are then `UNKNOWN`.
    pub async fn update(&self) -> Result<()> {
        self.start_keyword_pump();

        let remote_lamps: Vec<Lamp> = self
            .lamps()
            .into_iter()
            .filter(|lamp| lamp.kind().as_remote().is_some())
            .collect();

        let remote_updates = join_all(remote_lamps.iter().map(|lamp| async move {
            if let Err(e) = lamp.update_remote().await {
                tracing::warn!(lamp = %lamp.name(), error = %e, "Failed updating lamp");
            }
        }));

        let (relay, _) = tokio::join!(self.update_relay(), remote_updates);
        relay
    }

    async fn update_relay(&self) -> Result<()> {
        let Some(relay) = &self.relay else {
            return Ok(());
        };

        let list = match relay.query_all_lamp_states().await {
            Ok(list) => list,
            Err(e) => {
                let reason = format!("relay query failed: {e}");
                for lamp in self.lamps() {
                    if lamp.kind().as_relay().is_some() {
                        lamp.force_unknown(&reason);
                    }
                }
                return Err(e.into());
            }
        };

        for status in list {
            let Some(lamp) = self.relay_lamp_for(&status) else {
                continue;
            };
            let _commands = lamp.lock_commands().await;
            match status.reading() {
                RelayReading::Off => {
                    lamp.request_off();
                }
                RelayReading::On => {
                    lamp.request_on(None);
                }
                RelayReading::Invalid(digit) => {
                    lamp.request_off();
                    lamp.force_unknown(&format!("relay reported status {digit}"));
                }
            }
        }

        Ok(())
    }

    /// Finds the lamp for a relay channel, adding one if none claims it.
    fn relay_lamp_for(&self, status: &RelayLampStatus) -> Option<Lamp> {
        let known = self
            .lamps
            .read()
            .values()
            .find(|lamp| {
                lamp.kind()
                    .as_relay()
                    .is_some_and(|relay| relay.tag() == status.tag)
            })
            .cloned();

        let lamp = match known {
            Some(lamp) => lamp,
            None => {
                let lamp = Lamp::with_event_bus(
                    &status.tag,
                    Duration::ZERO,
                    LampKind::relay(&status.tag, Some(status.relay)),
                    self.event_bus.clone(),
                );
                match self.insert(lamp, true) {
                    Ok(lamp) => {
                        tracing::info!(lamp = %status.tag, relay = %status.relay, "Discovered lamp");
                        lamp
                    }
                    Err(e) => {
                        tracing::warn!(tag = %status.tag, error = %e, "Cannot add discovered lamp");
                        return None;
                    }
                }
            }
        };

        if let Some(relay) = lamp.kind().as_relay()
            && relay.assign_relay(status.relay)
        {
            tracing::debug!(lamp = %lamp.name(), relay = %status.relay, "Relay number learned");
        }

        Some(lamp)
    }

    // =========================================================================
    // Switching
    // =========================================================================

    /// Switches a lamp on or off.
    ///
    /// With `refresh_first` the decision uses fresh backend state. Lamps
    /// already in the requested state are left alone; `WARMING` counts as on.
    /// A lamp in `UNKNOWN` is commanded anyway and the outcome says so. The
    /// local state only changes after the backend acknowledged the command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownLamp`] for a name the controller does not
    /// know, any refresh error, [`Error::NoRelayBackend`] or
    /// [`Error::MissingAddress`] for relay lamps that cannot be addressed,
    /// and the backend error if the command failed.
    pub async fn set_state(&self, name: &str, on: bool, options: SetStateOptions) -> Result<SetOutcome> {
        let lamp = self.require(name)?;
        self.start_keyword_pump();

        if options.refresh_first {
            self.update().await?;
        }

        // Keyword values pushed while the command is in flight wait until
        // this transition is applied.
        let _commands = lamp.lock_commands().await;
        let state = lamp.state();
        if (on && state.is_lit()) || (!on && state == LampState::OFF) {
            tracing::debug!(lamp = %lamp.name(), %state, "Lamp already in requested state");
            return Ok(SetOutcome::Unchanged);
        }

        let uncertain = state.intersects(LampState::UNKNOWN);
        if uncertain {
            tracing::warn!(lamp = %lamp.name(), on, "Commanding lamp in unknown state");
        }

        let ack = match lamp.kind() {
            LampKind::Relay(relay_lamp) => {
                let client = self.relay.as_ref().ok_or(Error::NoRelayBackend)?;
                let relay = relay_lamp
                    .relay()
                    .ok_or_else(|| Error::MissingAddress(lamp.name().to_string()))?;
                client.command_lamp(relay, relay_lamp.tag(), on).await?;
                None
            }
            LampKind::Remote(_) => lamp.command_remote(on).await?,
        };

        if on {
            lamp.request_on(options.warm_up);
        } else {
            lamp.request_off();
        }

        if let Some(value) = ack
            && let Err(e) = lamp.apply_keyword(&value)
        {
            tracing::warn!(lamp = %lamp.name(), error = %e, "Acknowledgement carried an invalid state");
        }

        Ok(if uncertain {
            SetOutcome::AppliedFromUnknown
        } else {
            SetOutcome::Applied
        })
    }

    /// Turns a lamp on, refreshing first.
    ///
    /// # Errors
    ///
    /// See [`set_state`](Self::set_state).
    pub async fn turn_on(&self, name: &str, warm_up: Option<Duration>) -> Result<SetOutcome> {
        let options = SetStateOptions {
            warm_up,
            ..SetStateOptions::new()
        };
        self.set_state(name, true, options).await
    }

    /// Turns a lamp off, refreshing first.
    ///
    /// # Errors
    ///
    /// See [`set_state`](Self::set_state).
    pub async fn turn_off(&self, name: &str) -> Result<SetOutcome> {
        self.set_state(name, false, SetStateOptions::new()).await
    }

    /// Turns a lamp on and waits for it to warm up.
    ///
    /// Waits for the warm-up time plus [`WARM_UP_GRACE`].
    ///
    /// # Errors
    ///
    /// Returns any error from [`set_state`](Self::set_state), or the errors
    /// of [`Lamp::wait_until_on`].
    pub async fn turn_on_and_wait(&self, name: &str, warm_up: Option<Duration>) -> Result<SetOutcome> {
        let lamp = self.require(name)?;
        let outcome = self.turn_on(name, warm_up).await?;

        let deadline = warm_up.unwrap_or_else(|| lamp.warm_up_time()) + WARM_UP_GRACE;
        lamp.wait_until_on(deadline).await?;
        Ok(outcome)
    }

    /// Turns every lamp off.
    ///
    /// Refreshes once, then commands all lamps concurrently. A failed
    /// refresh is logged and the lamps are commanded anyway. Each lamp's
    /// result is reported under its display name; one failure does not stop
    /// the others.
    pub async fn turn_off_all(&self) -> BTreeMap<String, Result<SetOutcome>> {
        if let Err(e) = self.update().await {
            tracing::warn!(error = %e, "Refresh failed, switching all lamps off anyway");
        }

        let lamps = self.lamps();
        let results = join_all(lamps.iter().map(|lamp| async move {
            let result = self
                .set_state(lamp.name(), false, SetStateOptions::new().without_refresh())
                .await;
            if let Err(e) = &result {
                tracing::warn!(lamp = %lamp.name(), error = %e, "Failed to turn lamp off");
            }
            (lamp.name().to_string(), result)
        }))
        .await;

        results.into_iter().collect()
    }

    /// Refreshes and reports the state of every lamp.
    ///
    /// If the refresh fails the cached states are reported and
    /// [`StatusReport::stale`] carries the reason.
    pub async fn status(&self) -> StatusReport {
        self.start_keyword_pump();
        let stale = match self.update().await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Refresh failed, reporting cached states");
                Some(e.to_string())
            }
        };

        StatusReport {
            lamps: self.states(),
            stale,
        }
    }
}

impl Default for LampsController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LampsController {
    fn drop(&mut self) {
        if let Some(pump) = self.keyword_pump.get_mut().take() {
            pump.abort();
        }
    }
}

impl fmt::Debug for LampsController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LampsController")
            .field("lamps", &self.lamps.read().keys().collect::<Vec<_>>())
            .field("relay", &self.relay.as_ref().map(|r| r.config().address()))
            .field("remote_bus", &self.bus.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for LampsController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lamps = self.lamps.read();
        let states: Vec<String> = lamps
            .iter()
            .map(|(key, lamp)| format!("{key}={}", lamp.state()))
            .collect();
        write!(f, "<LampsController ({})>", states.join(", "))
    }
}

/// Applies keyword values pushed by remote subsystems, one at a time.
async fn pump_keywords(lamps: Weak<RwLock<LampMap>>, mut rx: mpsc::UnboundedReceiver<KeywordUpdate>) {
    while let Some(update) = rx.recv().await {
        let Some(map) = lamps.upgrade() else {
            break;
        };
        let lamp = map.read().get(&update.lamp).cloned();

        match lamp {
            Some(lamp) => {
                let _commands = lamp.lock_commands().await;
                if let Err(e) = lamp.apply_keyword(&update.value) {
                    tracing::warn!(lamp = %lamp.name(), error = %e, "Ignoring keyword value");
                }
            }
            None => tracing::trace!(lamp = %update.lamp, "Keyword for unknown lamp"),
        }
    }
    tracing::debug!("Keyword pump stopped");
}
