// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Warm-up timer.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{Lamp, LampInner};

/// Pending WARMING to ON transition.
///
/// Each timer carries the generation it was started with. When it fires it
/// only completes the transition if the lamp still holds a timer of the same
/// generation, so a timer that lost a race with [`cancel`](Self::cancel)
/// cannot turn a lamp on after it was switched off.
pub(super) struct WarmUpTimer {
    generation: u64,
    started: Instant,
    duration: Duration,
    handle: JoinHandle<()>,
}

impl WarmUpTimer {
    /// Spawns the timer task.
    ///
    /// Must be called from within a Tokio runtime.
    pub(super) fn start(lamp: Weak<LampInner>, generation: u64, duration: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = lamp.upgrade() {
                Lamp { inner }.finish_warm_up(generation);
            }
        });

        Self {
            generation,
            started: Instant::now(),
            duration,
            handle,
        }
    }

    pub(super) fn generation(&self) -> u64 {
        self.generation
    }

    /// Percentage of the warm-up that has elapsed, capped at 100.
    pub(super) fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 100.0;
        }
        let ratio = self.started.elapsed().as_secs_f64() / self.duration.as_secs_f64();
        (ratio * 100.0).min(100.0)
    }

    pub(super) fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.started.elapsed())
    }

    pub(super) fn cancel(self) {
        self.handle.abort();
    }
}

impl std::fmt::Debug for WarmUpTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmUpTimer")
            .field("generation", &self.generation)
            .field("duration", &self.duration)
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}
