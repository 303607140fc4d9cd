// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `calib_lamps` - control of the calibration lamps of an instrument.
//!
//! Lamps are switched by one of two backends:
//!
//! - **Relay bank**: a TCP-reachable relay controller speaking a one-line
//!   text protocol (`getlamps`, `lamp <relay> <0|1>`).
//! - **Remote subsystem**: another process that switches the lamp on request
//!   and publishes its state as a keyword. The application provides the
//!   messaging through the [`protocol::RemoteBus`] trait.
//!
//! Every lamp follows the same state machine (`OFF`, `WARMING`, `ON`,
//! `UNKNOWN`) with a warm-up timer between `OFF` and `ON`. The
//! [`LampsController`] reconciles the cached states with the backends and
//! makes sure a lamp's local state only changes after its backend
//! acknowledged a command.
//!
//! # Quick Start
//!
//! ```no_run
//! use calib_lamps::{ControllerConfig, LampsController};
//!
//! #[tokio::main]
//! async fn main() -> calib_lamps::Result<()> {
//!     let config = ControllerConfig::from_json_str(r#"{
//!         "relay": { "host": "10.1.1.20", "port": 5000 },
//!         "lamps": { "HeNe": { "mode": "relay", "warm_up_time": 30 } }
//!     }"#)?;
//!     let controller = LampsController::from_config(config, None)?;
//!
//!     let report = controller.status().await;
//!     for (lamp, state) in &report.lamps {
//!         println!("{lamp}: {state}");
//!     }
//!
//!     controller.turn_on_and_wait("hene", None).await?;
//!
//!     for (lamp, result) in controller.turn_off_all().await {
//!         if let Err(e) = result {
//!             eprintln!("{lamp}: {e}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The library logs through [`tracing`] and installs no subscriber.

pub mod command;
pub mod controller;
pub mod error;
pub mod event;
pub mod lamp;
pub mod protocol;
pub mod response;
pub mod state;
pub mod subscription;
pub mod types;

pub use controller::{
    ControllerConfig, LampConfig, LampsController, SetOutcome, SetStateOptions, StatusReport,
};
pub use error::{Error, RelayError, RemoteError, Result, ValueError};
pub use event::{EventBus, LampEvent};
pub use lamp::{Lamp, LampKind, LampSnapshot};
pub use protocol::{RelayClient, RelayConfig, RemoteBus, RemoteReply};
pub use state::LampState;
pub use subscription::{KeywordRegistry, SubscriptionId};
pub use types::RelayId;
