// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keyword callback registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::protocol::{KeywordCallback, KeywordValue};

/// Unique identifier for a keyword subscription.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use calib_lamps::subscription::KeywordRegistry;
/// use calib_lamps::protocol::KeywordValue;
///
/// let registry = KeywordRegistry::new();
/// let id = registry.register("lamps", "hene", Arc::new(|_: KeywordValue| {}));
/// assert!(registry.unregister(id));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a subscription ID with the given value.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type KeywordKey = (String, String);

/// Routes keyword values published by remote subsystems to subscribers.
///
/// [`RemoteBus`](crate::protocol::RemoteBus) implementations can keep one of
/// these, register callbacks from `subscribe`, and call
/// [`dispatch`](Self::dispatch) whenever the transport delivers a keyword.
/// Subsystem and keyword names are matched case-insensitively.
pub struct KeywordRegistry {
    next_id: AtomicU64,
    callbacks: RwLock<HashMap<KeywordKey, HashMap<SubscriptionId, KeywordCallback>>>,
}

impl KeywordRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(HashMap::new()),
        }
    }

    fn key(subsystem: &str, keyword: &str) -> KeywordKey {
        (subsystem.to_lowercase(), keyword.to_lowercase())
    }

    /// Registers a callback for `keyword` published by `subsystem`.
    pub fn register(
        &self,
        subsystem: &str,
        keyword: &str,
        callback: KeywordCallback,
    ) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .write()
            .entry(Self::key(subsystem, keyword))
            .or_default()
            .insert(id, callback);
        id
    }

    /// Removes a subscription.
    ///
    /// Returns `true` if the subscription existed.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write();
        let mut removed = false;
        callbacks.retain(|_, subscribers| {
            removed |= subscribers.remove(&id).is_some();
            !subscribers.is_empty()
        });
        removed
    }

    /// Delivers a new keyword value to its subscribers.
    ///
    /// Returns the number of callbacks invoked. Callbacks run after the
    /// registry lock is released, so they may register or unregister.
    pub fn dispatch(&self, subsystem: &str, keyword: &str, value: &KeywordValue) -> usize {
        let subscribers: Vec<KeywordCallback> = self
            .callbacks
            .read()
            .get(&Self::key(subsystem, keyword))
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default();

        for callback in &subscribers {
            callback(value.clone());
        }

        subscribers.len()
    }

    /// Returns the total number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().values().map(HashMap::len).sum()
    }

    /// Returns `true` if there are no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeywordRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeywordRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordRegistry")
            .field("subscriptions", &self.len())
            .finish_non_exhaustive()
    }
}
