// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay addressing.

use std::fmt;
use std::num::NonZeroU16;

use crate::error::ValueError;

/// Physical address of a relay on the relay bank.
///
/// Relays are numbered from 1 in the order the bank lists them.
///
/// # Examples
///
/// ```
/// use calib_lamps::types::RelayId;
///
/// let relay = RelayId::new(3).unwrap();
/// assert_eq!(relay.value(), 3);
/// assert!(RelayId::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct RelayId(NonZeroU16);

impl RelayId {
    /// Creates a relay address.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidRelayId` if `value` is 0 or does not fit
    /// in 16 bits.
    pub fn new(value: u32) -> Result<Self, ValueError> {
        u16::try_from(value)
            .ok()
            .and_then(NonZeroU16::new)
            .map(Self)
            .ok_or(ValueError::InvalidRelayId(value))
    }

    /// Creates a relay address from a zero-based list position.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidRelayId` if the position is too large.
    pub fn from_position(index: usize) -> Result<Self, ValueError> {
        let value = u32::try_from(index + 1).unwrap_or(u32::MAX);
        Self::new(value)
    }

    /// Returns the numeric relay address.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0.get()
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for RelayId {
    type Error = ValueError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
