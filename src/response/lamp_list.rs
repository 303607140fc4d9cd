// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsing of the `getlamps` reply.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::RelayId;

static PAIR: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"([A-Za-z0-9]+)=([0-9])").expect("static regex is valid")
});

static UNASSIGNED: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^t[0-9]+$").expect("static regex is valid")
});

/// What the relay bank reports for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayReading {
    /// Digit `0`.
    Off,
    /// Digit `1`.
    On,
    /// Any other digit.
    Invalid(u8),
}

impl RelayReading {
    fn from_digit(digit: u8) -> Self {
        match digit {
            0 => Self::Off,
            1 => Self::On,
            other => Self::Invalid(other),
        }
    }
}

/// One assigned channel of the relay bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayLampStatus {
    /// Identifier the relay bank uses for the lamp.
    pub tag: String,
    /// Position of the channel in the reply, which is its relay number.
    pub relay: RelayId,
    /// The raw status digit.
    pub status: u8,
}

impl RelayLampStatus {
    /// Interprets the status digit.
    #[must_use]
    pub fn reading(&self) -> RelayReading {
        RelayReading::from_digit(self.status)
    }
}

/// Parsed reply to [`RelayCommand::GetLamps`](crate::command::RelayCommand::GetLamps).
///
/// Channels whose tag looks like `t<digits>` have no lamp wired and are
/// dropped, but they still count towards the relay numbering.
///
/// # Examples
///
/// ```
/// use calib_lamps::response::{LampListResponse, RelayReading};
///
/// let list = LampListResponse::parse("HeNe=1 t2=0 Ne=0");
/// let tags: Vec<_> = list.iter().map(|s| s.tag.as_str()).collect();
/// assert_eq!(tags, ["HeNe", "Ne"]);
/// assert_eq!(list.get("Ne").unwrap().relay.value(), 3);
/// assert_eq!(list.get("HeNe").unwrap().reading(), RelayReading::On);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LampListResponse {
    entries: Vec<RelayLampStatus>,
}

impl LampListResponse {
    /// Parses the reply text. Unparseable fragments are ignored.
    #[must_use]
    pub fn parse(reply: &str) -> Self {
        let entries = PAIR
            .captures_iter(reply)
            .enumerate()
            .filter_map(|(index, caps)| {
                let tag = caps.get(1)?.as_str();
                if UNASSIGNED.is_match(tag) {
                    return None;
                }

                let status = caps.get(2)?.as_str().parse::<u8>().ok()?;
                let relay = match RelayId::from_position(index) {
                    Ok(relay) => relay,
                    Err(e) => {
                        tracing::warn!(tag, error = %e, "Ignoring relay channel");
                        return None;
                    }
                };

                Some(RelayLampStatus {
                    tag: tag.to_string(),
                    relay,
                    status,
                })
            })
            .collect();

        Self { entries }
    }

    /// Returns the assigned channels in reply order.
    pub fn iter(&self) -> impl Iterator<Item = &RelayLampStatus> {
        self.entries.iter()
    }

    /// Looks up a channel by tag.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&RelayLampStatus> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }

    /// Returns the number of assigned channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no assigned channel was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the response, returning the channels.
    #[must_use]
    pub fn into_entries(self) -> Vec<RelayLampStatus> {
        self.entries
    }
}

impl IntoIterator for LampListResponse {
    type Item = RelayLampStatus;
    type IntoIter = std::vec::IntoIter<RelayLampStatus>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
