// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay bank command definitions.
//!
//! The relay bank speaks a line protocol with two requests:
//!
//! | Request | Line | Reply |
//! |---------|------|-------|
//! | [`RelayCommand::GetLamps`] | `getlamps` | `TAG1=0 TAG2=1 ...` |
//! | [`RelayCommand::SetLamp`] | `lamp <relay> <0\|1>` | text naming the lamps that are lit |

mod relay;

pub use relay::RelayCommand;
