// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting lamp events.

use tokio::sync::broadcast;

use super::LampEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcasts lamp events to any number of subscribers.
///
/// Backed by a tokio broadcast channel with a fixed capacity (default 256).
/// A subscriber that falls behind loses the oldest events and gets
/// `RecvError::Lagged` on its next receive. Clones share the channel.
///
/// # Examples
///
/// ```
/// use calib_lamps::event::{EventBus, LampEvent};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(LampEvent::lamp_added("HeNe", false));
/// assert_eq!(rx.try_recv().unwrap().lamp(), "HeNe");
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LampEvent>,
}

impl EventBus {
    /// Creates an event bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an event bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Returns a receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LampEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event. Returns the number of receivers it reached.
    pub fn publish(&self, event: LampEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(lamp = event.lamp(), "No event subscribers");
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
