// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Individual calibration lamps.
//!
//! A [`Lamp`] tracks the state of one lamp and runs its warm-up timer. The
//! transitions are local bookkeeping only: switching the hardware is the job
//! of the [`LampsController`](crate::controller::LampsController), which
//! calls [`Lamp::request_on`] or [`Lamp::request_off`] once the backend
//! acknowledged a command.
//!
//! # State machine
//!
//! | From      | `request_on`          | `request_off` | `force_unknown` |
//! |-----------|-----------------------|---------------|-----------------|
//! | `OFF`     | `WARMING`, timer runs | -             | `UNKNOWN`       |
//! | `WARMING` | -                     | `OFF`         | `UNKNOWN`       |
//! | `ON`      | -                     | `OFF`         | `UNKNOWN`       |
//! | `UNKNOWN` | `ON`                  | `OFF`         | -               |
//!
//! The timer moves `WARMING` to `ON` once the warm-up time has elapsed.
//! Leaving `WARMING` any other way cancels it.

mod kind;
mod remote;
mod snapshot;
mod warm_up;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::event::{EventBus, LampEvent};
use crate::state::LampState;

pub use kind::{LampKind, RelayLamp, RemoteLamp};
pub(crate) use remote::KeywordUpdate;
pub use snapshot::LampSnapshot;
use warm_up::WarmUpTimer;

/// Mutable part of a lamp, guarded by a single lock.
#[derive(Debug)]
struct LampStatus {
    state: LampState,
    on_time: Option<DateTime<Utc>>,
    warm_up: Option<WarmUpTimer>,
    generation: u64,
}

impl LampStatus {
    fn progress(&self) -> Option<f64> {
        if self.state == LampState::ON {
            return Some(100.0);
        }
        self.warm_up.as_ref().map(WarmUpTimer::progress)
    }
}

pub(crate) struct LampInner {
    name: String,
    warm_up_time: Duration,
    kind: LampKind,
    status: Mutex<LampStatus>,
    state_tx: watch::Sender<LampState>,
    events: EventBus,
    /// Held while a backend command is in flight and while backend reports
    /// are applied, so the two never interleave.
    commands: tokio::sync::Mutex<()>,
}

/// A calibration lamp.
///
/// `Lamp` is a cheap handle: clones share the same state.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use calib_lamps::lamp::{Lamp, LampKind};
/// use calib_lamps::state::LampState;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let lamp = Lamp::new("Ne", Duration::from_secs(30), LampKind::relay("Ne", None));
/// assert_eq!(lamp.state(), LampState::UNKNOWN);
///
/// lamp.request_off();
/// lamp.request_on(None);
/// assert_eq!(lamp.state(), LampState::WARMING);
/// assert!(lamp.on_time().is_some());
/// # }
/// ```
#[derive(Clone)]
pub struct Lamp {
    inner: Arc<LampInner>,
}

impl Lamp {
    /// Creates a lamp in the `UNKNOWN` state.
    #[must_use]
    pub fn new(name: impl Into<String>, warm_up_time: Duration, kind: LampKind) -> Self {
        Self::with_event_bus(name, warm_up_time, kind, EventBus::new())
    }

    /// Creates a lamp that publishes its transitions on `events`.
    #[must_use]
    pub fn with_event_bus(
        name: impl Into<String>,
        warm_up_time: Duration,
        kind: LampKind,
        events: EventBus,
    ) -> Self {
        let (state_tx, _) = watch::channel(LampState::UNKNOWN);
        Self {
            inner: Arc::new(LampInner {
                name: name.into(),
                warm_up_time,
                kind,
                status: Mutex::new(LampStatus {
                    state: LampState::UNKNOWN,
                    on_time: None,
                    warm_up: None,
                    generation: 0,
                }),
                state_tx,
                events,
                commands: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Display name of the lamp.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Lookup key of the lamp. Names are matched case-insensitively.
    #[must_use]
    pub fn key(&self) -> String {
        self.inner.name.to_lowercase()
    }

    /// Default warm-up time.
    #[must_use]
    pub fn warm_up_time(&self) -> Duration {
        self.inner.warm_up_time
    }

    /// The backend that switches this lamp.
    #[must_use]
    pub fn kind(&self) -> &LampKind {
        &self.inner.kind
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LampState {
        self.inner.status.lock().state
    }

    /// When the current warm-up started, if the lamp was turned on from `OFF`.
    #[must_use]
    pub fn on_time(&self) -> Option<DateTime<Utc>> {
        self.inner.status.lock().on_time
    }

    /// Returns `true` if a warm-up timer is running.
    #[must_use]
    pub fn is_warming_up(&self) -> bool {
        self.inner.status.lock().warm_up.is_some()
    }

    /// Warm-up progress in percent.
    ///
    /// Returns `Some(100.0)` for a lamp that is `ON`, the elapsed share of
    /// the warm-up for a lamp that is `WARMING`, and `None` otherwise.
    #[must_use]
    pub fn warm_up_progress(&self) -> Option<f64> {
        self.inner.status.lock().progress()
    }

    /// Returns a receiver that observes every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<LampState> {
        self.inner.state_tx.subscribe()
    }

    /// Waits for exclusive use of the lamp's backend.
    pub(crate) async fn lock_commands(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.commands.lock().await
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Records that the lamp was switched on.
    ///
    /// From `OFF` the lamp starts warming up for `warm_up` (or its default
    /// warm-up time) and `on_time` is set. From `UNKNOWN` it goes straight to
    /// `ON`, since how long it has been lit is not known. A lamp that is
    /// already `WARMING` or `ON` is left alone.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn request_on(&self, warm_up: Option<Duration>) -> LampState {
        let mut status = self.inner.status.lock();
        let previous = status.state;

        if previous.is_lit() {
            return previous;
        }

        if previous.intersects(LampState::UNKNOWN) {
            status.state = LampState::ON;
        } else {
            let duration = warm_up.unwrap_or(self.inner.warm_up_time);
            status.generation += 1;
            if let Some(stale) = status.warm_up.take() {
                stale.cancel();
            }
            status.warm_up = Some(WarmUpTimer::start(
                Arc::downgrade(&self.inner),
                status.generation,
                duration,
            ));
            status.state = LampState::WARMING;
            status.on_time = Some(Utc::now());
            tracing::debug!(lamp = %self.inner.name, ?duration, "Warm-up started");
        }

        self.commit(status, previous)
    }

    /// Records that the lamp was switched off.
    ///
    /// Cancels a pending warm-up and clears `on_time`.
    pub fn request_off(&self) -> LampState {
        let mut status = self.inner.status.lock();
        let previous = status.state;

        if let Some(timer) = status.warm_up.take() {
            timer.cancel();
        }
        status.on_time = None;
        status.state = LampState::OFF;

        self.commit(status, previous)
    }

    /// Marks the state as not known.
    ///
    /// Cancels a pending warm-up. `on_time` is kept.
    pub fn force_unknown(&self, reason: &str) -> LampState {
        let mut status = self.inner.status.lock();
        let previous = status.state;

        if let Some(timer) = status.warm_up.take() {
            timer.cancel();
        }
        status.state = LampState::UNKNOWN;

        if previous != LampState::UNKNOWN {
            tracing::warn!(lamp = %self.inner.name, %previous, reason, "Lamp state unknown");
        }
        self.commit(status, previous)
    }

    /// Completes the warm-up started with `generation`, if still current.
    fn finish_warm_up(&self, generation: u64) {
        let mut status = self.inner.status.lock();
        let current = status
            .warm_up
            .as_ref()
            .is_some_and(|timer| timer.generation() == generation);
        if !current || status.state != LampState::WARMING {
            tracing::trace!(lamp = %self.inner.name, generation, "Stale warm-up timer ignored");
            return;
        }

        status.warm_up = None;
        status.state = LampState::ON;

        tracing::info!(lamp = %self.inner.name, "Lamp warmed up");
        self.commit(status, LampState::WARMING);
    }

    /// Publishes the transition from `previous` and releases the lock.
    ///
    /// Publishing happens before the guard is dropped so watchers and event
    /// subscribers see transitions in the order they were applied.
    fn commit(&self, status: MutexGuard<'_, LampStatus>, previous: LampState) -> LampState {
        let current = status.state;
        if previous != current {
            tracing::debug!(lamp = %self.inner.name, %previous, %current, "Lamp state changed");
            self.inner.state_tx.send_replace(current);
            self.inner
                .events
                .publish(LampEvent::state_changed(&self.inner.name, previous, current));
        }
        drop(status);
        current
    }

    // =========================================================================
    // Waiting
    // =========================================================================

    /// Waits until the lamp is `ON`.
    ///
    /// Returns immediately for a lamp that is already `ON`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WarmUpInterrupted`] if the lamp is or becomes `OFF`
    /// or `UNKNOWN` while waiting; its state is left as is. Returns
    /// [`Error::WarmUpTimeout`] if the lamp is still warming up after
    /// `timeout`; the lamp is then forced to `UNKNOWN`.
    pub async fn wait_until_on(&self, timeout: Duration) -> Result<()> {
        let mut state_rx = self.watch_state();

        let waited = tokio::time::timeout(timeout, async {
            loop {
                let state = *state_rx.borrow_and_update();
                if state == LampState::ON {
                    return Ok(());
                }
                if !state.contains(LampState::WARMING) || state_rx.changed().await.is_err() {
                    return Err(Error::WarmUpInterrupted {
                        lamp: self.inner.name.clone(),
                        state: self.state(),
                    });
                }
            }
        })
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => {
                self.force_unknown("timed out warming up");
                Err(Error::WarmUpTimeout(self.inner.name.clone()))
            }
        }
    }

    /// Returns a serializable view of the lamp.
    #[must_use]
    pub fn snapshot(&self) -> LampSnapshot {
        let (state, on_time, progress) = {
            let status = self.inner.status.lock();
            (status.state, status.on_time, status.progress())
        };
        LampSnapshot::new(self, state, on_time, progress)
    }
}

impl fmt::Debug for Lamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.inner.status.lock();
        f.debug_struct("Lamp")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("state", &status.state)
            .field("on_time", &status.on_time)
            .field("warm_up", &status.warm_up)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Lamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.inner.name, self.state())
    }
}
