// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orchestration of lamps across relay and remote backends.
//!
//! [`LampsController`] is the entry point for callers. It owns every lamp,
//! refreshes them from their backends with [`update`], and switches them
//! with [`set_state`].
//!
//! # Switching sequence
//!
//! `set_state` runs through these steps; any step but the last may fail and
//! aborts the sequence:
//!
//! 1. Refresh all lamps (optional, on by default).
//! 2. Return [`SetOutcome::Unchanged`] if the lamp is already in the
//!    requested state.
//! 3. Send the command to the lamp's backend.
//! 4. Apply the transition locally.
//!
//! # Events
//!
//! ```no_run
//! use calib_lamps::controller::LampsController;
//! use calib_lamps::event::LampEvent;
//!
//! # async fn example(controller: LampsController) {
//! let mut events = controller.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let LampEvent::StateChanged { lamp, current, .. } = event {
//!             println!("{lamp} is now {current}");
//!         }
//!     }
//! });
//! # }
//! ```
//!
//! [`update`]: LampsController::update
//! [`set_state`]: LampsController::set_state

mod config;
mod lamps_controller;
mod outcome;

pub use config::{ControllerConfig, LampConfig};
pub use lamps_controller::{LampsController, WARM_UP_GRACE};
pub use outcome::{SetOutcome, SetStateOptions, StatusReport};
