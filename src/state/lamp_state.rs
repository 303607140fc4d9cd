// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lamp state flags.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::ValueError;

/// State of a lamp as far as the controller knows.
///
/// States are independent bits so that membership can be tested against a
/// group of states, but a lamp only ever holds one of the four at a time.
///
/// # Examples
///
/// ```
/// use calib_lamps::state::LampState;
///
/// let lit = LampState::ON | LampState::WARMING;
/// assert!(lit.intersects(LampState::WARMING));
/// assert!(!lit.intersects(LampState::OFF));
/// assert_eq!(LampState::UNKNOWN.to_string(), "UNKNOWN");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LampState(u16);

impl LampState {
    /// The lamp is off.
    pub const OFF: Self = Self(0x1);
    /// The lamp is powered but has not reached rated output.
    pub const WARMING: Self = Self(0x2);
    /// The lamp is on and warmed up.
    pub const ON: Self = Self(0x4);
    /// The state has never been observed or could not be determined.
    pub const UNKNOWN: Self = Self(0x100);

    const NAMED: [(Self, &'static str); 4] = [
        (Self::OFF, "OFF"),
        (Self::WARMING, "WARMING"),
        (Self::ON, "ON"),
        (Self::UNKNOWN, "UNKNOWN"),
    ];

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if `self` and `other` share any bit.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` for ON or WARMING, i.e. the lamp is powered.
    #[must_use]
    pub const fn is_lit(self) -> bool {
        self.intersects(Self(Self::ON.0 | Self::WARMING.0))
    }

    /// Returns the name of a single state, or `None` for a combination.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(state, _)| *state == self)
            .map(|(_, name)| *name)
    }
}

impl Default for LampState {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl BitOr for LampState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LampState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LampState {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for LampState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            return f.write_str(name);
        }

        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(state, _)| self.contains(*state))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "{:#x}", self.0)
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

impl fmt::Debug for LampState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LampState({self})")
    }
}

impl FromStr for LampState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::NAMED
            .iter()
            .find(|(_, name)| *name == upper)
            .map(|(state, _)| *state)
            .ok_or_else(|| ValueError::InvalidLampState(s.to_string()))
    }
}

impl serde::Serialize for LampState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
