// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lamp state flags.
//!
//! A lamp is in exactly one of [`LampState::OFF`], [`LampState::WARMING`],
//! [`LampState::ON`] or [`LampState::UNKNOWN`]. The values are bit flags so
//! callers can test for groups of states at once.
//!
//! # Examples
//!
//! ```
//! use calib_lamps::state::LampState;
//!
//! let lit = LampState::ON | LampState::WARMING;
//! assert!(lit.contains(LampState::WARMING));
//! assert!(LampState::WARMING.is_lit());
//! assert_eq!("warming".parse::<LampState>().unwrap(), LampState::WARMING);
//! ```

mod lamp_state;

pub use lamp_state::LampState;
