// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the lamps controller against fake backends.

mod common;

use std::sync::Arc;
use std::time::Duration;

use calib_lamps::protocol::RemoteBus;
use calib_lamps::{
    ControllerConfig, Error, LampConfig, LampEvent, LampState, LampsController, RelayError,
    RemoteError, SetOutcome, SetStateOptions,
};
use common::{FakeRelay, FakeSubsystem, RelayBank, remote_lamp_config};
use tokio::sync::watch;

async fn wait_for_state(mut rx: watch::Receiver<LampState>, state: LampState) {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == state))
        .await
        .expect("state not reached in time")
        .expect("lamp dropped");
}

fn relay_controller(relay: &FakeRelay) -> LampsController {
    LampsController::new().with_relay(relay.config())
}

// ============================================================================
// Refresh and discovery
// ============================================================================

mod refresh {
    use super::*;

    #[tokio::test]
    async fn relay_list_discovers_lamps() {
        let bank = RelayBank::new(&[("L1", 1), ("t3", 0), ("L2", 0)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);
        let mut events = controller.subscribe();

        controller.update().await.unwrap();

        assert_eq!(controller.len(), 2);
        assert!(controller.lamp("t3").is_none());

        let l1 = controller.lamp("l1").unwrap();
        assert_eq!(l1.state(), LampState::ON);
        assert_eq!(l1.kind().as_relay().unwrap().relay().unwrap().value(), 1);

        let l2 = controller.lamp("L2").unwrap();
        assert_eq!(l2.state(), LampState::OFF);
        assert_eq!(l2.kind().as_relay().unwrap().relay().unwrap().value(), 3);

        assert_eq!(events.recv().await.unwrap(), LampEvent::lamp_added("L1", true));
    }

    #[tokio::test]
    async fn configured_lamp_learns_relay_number() {
        let bank = RelayBank::new(&[("t1", 0), ("HENE", 0)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);
        let hene = controller
            .add_lamp("HeNe", &LampConfig::relay("HENE"))
            .unwrap();
        assert_eq!(hene.kind().as_relay().unwrap().relay(), None);

        controller.update().await.unwrap();

        assert_eq!(controller.len(), 1);
        assert_eq!(hene.state(), LampState::OFF);
        assert_eq!(hene.kind().as_relay().unwrap().relay().unwrap().value(), 2);
    }

    #[tokio::test]
    async fn invalid_digit_makes_lamp_unknown() {
        let bank = RelayBank::new(&[("Ar", 7)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);

        controller.update().await.unwrap();
        let ar = controller.lamp("ar").unwrap();
        assert_eq!(ar.state(), LampState::UNKNOWN);
        assert!(!ar.is_warming_up());
    }

    #[tokio::test]
    async fn relay_query_failure_marks_relay_lamps_unknown() {
        let relay = FakeRelay::start(|_| common::Reply::Close).await;
        let subsystem = FakeSubsystem::new(Some(false));
        let controller = relay_controller(&relay).with_remote_bus(subsystem.clone());
        let ne = controller.add_lamp("Ne", &LampConfig::relay("Ne")).unwrap();
        let flat = controller.add_lamp("Flat", &remote_lamp_config()).unwrap();
        ne.request_off();

        let err = controller.update().await.unwrap_err();
        assert!(matches!(err, Error::Relay(RelayError::ConnectionClosed)));
        assert_eq!(ne.state(), LampState::UNKNOWN);

        // The remote lamp was still refreshed.
        wait_for_state(flat.watch_state(), LampState::OFF).await;
    }

    #[tokio::test]
    async fn status_reports_cached_states_when_stale() {
        let relay = FakeRelay::start(|_| common::Reply::Close).await;
        let controller = relay_controller(&relay);
        controller.add_lamp("Ne", &LampConfig::relay("Ne")).unwrap();

        let report = controller.status().await;
        assert!(report.stale.is_some());
        assert_eq!(report.lamps.get("Ne"), Some(&LampState::UNKNOWN));
        assert_eq!(report.unknown(), ["Ne"]);
    }

    #[tokio::test]
    async fn status_and_snapshot() {
        let bank = RelayBank::new(&[("HeNe", 1), ("Ne", 0)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);

        let report = controller.status().await;
        assert!(report.is_fresh());
        assert_eq!(report.lamps.get("HeNe"), Some(&LampState::ON));
        assert_eq!(report.lamps.get("Ne"), Some(&LampState::OFF));

        let snapshot = controller.snapshot();
        let names: Vec<_> = snapshot.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["HeNe", "Ne"]);
        assert_eq!(snapshot[1].relay.unwrap().value(), 2);
        assert_eq!(controller.to_string(), "<LampsController (hene=ON, ne=OFF)>");
    }
}

// ============================================================================
// Switching relay lamps
// ============================================================================

mod relay_switching {
    use super::*;

    #[tokio::test]
    async fn turn_on_warms_up_then_on() {
        let bank = RelayBank::new(&[("HeNe", 0)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);
        controller.update().await.unwrap();
        let mut events = controller.subscribe();

        let outcome = controller
            .turn_on_and_wait("hene", Some(Duration::from_millis(50)))
            .await
            .unwrap();

        assert_eq!(outcome, SetOutcome::Applied);
        let hene = controller.lamp("hene").unwrap();
        assert_eq!(hene.state(), LampState::ON);
        assert!(hene.on_time().is_some());
        assert_eq!(bank.status("HeNe"), Some(1));
        assert_eq!(relay.requests(), ["getlamps", "getlamps", "lamp 1 1"]);

        let mut transitions = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let LampEvent::StateChanged { current, .. } = event {
                transitions.push(current);
            }
        }
        assert_eq!(transitions, [LampState::WARMING, LampState::ON]);
    }

    #[tokio::test]
    async fn lamp_already_on_is_not_commanded() {
        let bank = RelayBank::new(&[("HeNe", 1)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);
        controller.update().await.unwrap();

        let outcome = controller.turn_on("HeNe", None).await.unwrap();
        assert_eq!(outcome, SetOutcome::Unchanged);
        assert_eq!(controller.lamp("hene").unwrap().state(), LampState::ON);
        assert_eq!(relay.requests(), ["getlamps", "getlamps"]);
    }

    #[tokio::test]
    async fn protocol_mismatch_leaves_state() {
        let bank = RelayBank::new(&[("HeNe", 0)]);
        bank.break_relay(1);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);
        controller.update().await.unwrap();

        let err = controller.turn_on("hene", None).await.unwrap_err();
        assert!(matches!(err, Error::Relay(RelayError::ProtocolMismatch { .. })));

        let hene = controller.lamp("hene").unwrap();
        assert_eq!(hene.state(), LampState::OFF);
        assert_eq!(hene.on_time(), None);
        assert!(!hene.is_warming_up());
    }

    #[tokio::test]
    async fn unknown_lamp_is_commanded_with_warning() {
        let bank = RelayBank::new(&[("Ar", 9)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);
        controller.update().await.unwrap();

        let outcome = controller.turn_off("ar").await.unwrap();
        assert_eq!(outcome, SetOutcome::AppliedFromUnknown);
        assert_eq!(controller.lamp("ar").unwrap().state(), LampState::OFF);
        assert_eq!(bank.status("Ar"), Some(0));
    }

    #[tokio::test]
    async fn missing_relay_number() {
        let bank = RelayBank::new(&[("HeNe", 0)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);
        let xe = controller.add_lamp("Xe", &LampConfig::relay("Xe")).unwrap();

        let err = controller.turn_on("xe", None).await.unwrap_err();
        assert!(matches!(err, Error::MissingAddress(ref name) if name == "Xe"));
        assert_eq!(xe.state(), LampState::UNKNOWN);
    }

    #[tokio::test]
    async fn unknown_name_sends_nothing() {
        let bank = RelayBank::new(&[("HeNe", 0)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);

        let err = controller.turn_on("Kr", None).await.unwrap_err();
        assert!(matches!(err, Error::UnknownLamp(_)));
        assert!(relay.requests().is_empty());
        assert!(controller.is_empty());
    }

    #[tokio::test]
    async fn turn_on_and_wait_gives_up() {
        let bank = RelayBank::new(&[("HeNe", 0)]);
        let relay = FakeRelay::with_bank(&bank).await;
        let controller = relay_controller(&relay);
        controller.update().await.unwrap();
        let hene = controller.lamp("hene").unwrap();

        let bank_for_task = Arc::clone(&bank);
        let lamp = hene.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            // Somebody switched it off by hand.
            bank_for_task.set_status("HeNe", 0);
            lamp.request_off();
        });

        let err = controller
            .turn_on_and_wait("hene", Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WarmUpInterrupted { state: LampState::OFF, .. }));
        assert_eq!(hene.state(), LampState::OFF);
    }
}

// ============================================================================
// Remote lamps
// ============================================================================

mod remote {
    use super::*;

    fn remote_controller(subsystem: &Arc<FakeSubsystem>) -> LampsController {
        let bus: Arc<dyn RemoteBus> = subsystem.clone();
        let config = ControllerConfig::new().with_lamp(
            "Flat",
            remote_lamp_config().with_warm_up(Duration::from_millis(50)),
        );
        LampsController::from_config(config, Some(bus)).unwrap()
    }

    #[tokio::test]
    async fn subscribes_on_add() {
        let subsystem = FakeSubsystem::new(None);
        let _controller = remote_controller(&subsystem);
        assert_eq!(subsystem.subscriptions(), 1);
    }

    #[tokio::test]
    async fn keyword_pushes_drive_state() {
        let subsystem = FakeSubsystem::new(None);
        let controller = remote_controller(&subsystem);
        let flat = controller.lamp("flat").unwrap();

        subsystem.set_lit(Some(false));
        wait_for_state(flat.watch_state(), LampState::OFF).await;

        subsystem.set_lit(Some(true));
        wait_for_state(flat.watch_state(), LampState::ON).await;

        subsystem.set_lit(None);
        wait_for_state(flat.watch_state(), LampState::UNKNOWN).await;
    }

    #[tokio::test]
    async fn status_reply_is_applied() {
        let subsystem = FakeSubsystem::new(Some(false));
        subsystem.set_reply_with_status(true);
        let controller = remote_controller(&subsystem);

        controller.update().await.unwrap();
        assert_eq!(controller.lamp("flat").unwrap().state(), LampState::OFF);
        assert_eq!(subsystem.sent(), ["lamp status"]);
    }

    #[tokio::test]
    async fn turn_on_uses_override() {
        let subsystem = FakeSubsystem::new(Some(false));
        subsystem.set_reply_with_status(true);
        let controller = remote_controller(&subsystem);

        let outcome = controller
            .turn_on_and_wait("Flat", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(outcome, SetOutcome::Applied);
        assert_eq!(controller.lamp("flat").unwrap().state(), LampState::ON);
        assert_eq!(subsystem.sent(), ["lamp status", "lamp on"]);
    }

    #[tokio::test]
    async fn failed_command_makes_lamp_unknown() {
        let subsystem = FakeSubsystem::new(Some(false));
        subsystem.set_reply_with_status(true);
        let controller = remote_controller(&subsystem);
        controller.update().await.unwrap();

        subsystem.set_failing(true);
        let err = controller
            .set_state("flat", true, SetStateOptions::new().without_refresh())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote(RemoteError::CommandFailed { .. })));
        assert_eq!(controller.lamp("flat").unwrap().state(), LampState::UNKNOWN);
    }

    #[tokio::test]
    async fn failed_update_does_not_fail_refresh() {
        let subsystem = FakeSubsystem::new(Some(true));
        subsystem.set_reply_with_status(true);
        let controller = remote_controller(&subsystem);
        controller.update().await.unwrap();
        assert_eq!(controller.lamp("flat").unwrap().state(), LampState::ON);

        subsystem.set_failing(true);
        controller.update().await.unwrap();
        assert_eq!(controller.lamp("flat").unwrap().state(), LampState::UNKNOWN);
    }
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pushed_value_waits_for_command_to_apply() {
        let subsystem = FakeSubsystem::new(Some(false));
        let bus: Arc<dyn RemoteBus> = subsystem.clone();
        let config = ControllerConfig::new().with_lamp(
            "Flat",
            remote_lamp_config().with_warm_up(Duration::from_secs(60)),
        );
        let controller = LampsController::from_config(config, Some(bus)).unwrap();
        let flat = controller.lamp("flat").unwrap();
        let options = SetStateOptions::new()
            .without_refresh()
            .with_warm_up(Duration::from_millis(1));

        // "lamp on" publishes the new state while the command is in flight.
        // The short warm-up must still be the one that runs.
        for _ in 0..50 {
            subsystem.set_lit(Some(false));
            wait_for_state(flat.watch_state(), LampState::OFF).await;

            let outcome = controller.set_state("flat", true, options).await.unwrap();
            assert_eq!(outcome, SetOutcome::Applied);
            wait_for_state(flat.watch_state(), LampState::ON).await;
        }
    }

    #[test]
    fn keyword_pump_starts_once_a_runtime_is_available() {
        let subsystem = FakeSubsystem::new(Some(true));
        let controller = remote_controller(&subsystem);
        let flat = controller.lamp("flat").unwrap();

        // Queued before any runtime exists.
        subsystem.set_lit(Some(false));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            controller.update().await.unwrap();
            wait_for_state(flat.watch_state(), LampState::OFF).await;

            subsystem.set_lit(Some(true));
            wait_for_state(flat.watch_state(), LampState::ON).await;
        });
    }
}

// ============================================================================
// Batch operations
// ============================================================================

mod batch {
    use super::*;

    #[tokio::test]
    async fn off_all_reports_each_lamp() {
        let bank = RelayBank::new(&[("HeNe", 1), ("Ne", 1), ("Ar", 1)]);
        bank.break_relay(2);
        let relay = FakeRelay::with_bank(&bank).await;
        let subsystem = FakeSubsystem::new(Some(true));
        let controller = relay_controller(&relay).with_remote_bus(subsystem.clone());
        controller.add_lamp("Flat", &remote_lamp_config()).unwrap();

        let results = controller.turn_off_all().await;

        assert_eq!(results.len(), 4);
        assert!(matches!(results["HeNe"], Ok(SetOutcome::Applied)));
        assert!(matches!(results["Ar"], Ok(SetOutcome::Applied)));
        assert!(matches!(
            results["Ne"],
            Err(Error::Relay(RelayError::ProtocolMismatch { .. }))
        ));
        assert!(results["Flat"].is_ok());

        assert_eq!(controller.lamp("hene").unwrap().state(), LampState::OFF);
        assert_eq!(controller.lamp("ar").unwrap().state(), LampState::OFF);
        assert_eq!(controller.lamp("ne").unwrap().state(), LampState::ON);
        wait_for_state(controller.lamp("flat").unwrap().watch_state(), LampState::OFF).await;
        assert_eq!(bank.status("HeNe"), Some(0));
        assert_eq!(bank.status("Ar"), Some(0));
    }

    #[tokio::test]
    async fn off_all_survives_failed_refresh() {
        let relay = FakeRelay::start(|_| common::Reply::Close).await;
        let subsystem = FakeSubsystem::new(Some(true));
        let controller = relay_controller(&relay).with_remote_bus(subsystem.clone());
        controller.add_lamp("Flat", &remote_lamp_config()).unwrap();
        controller.add_lamp("Ne", &LampConfig::relay("Ne")).unwrap();

        let results = controller.turn_off_all().await;

        assert!(matches!(results["Ne"], Err(Error::MissingAddress(_))));
        assert!(results["Flat"].is_ok());
        wait_for_state(controller.lamp("flat").unwrap().watch_state(), LampState::OFF).await;
    }
}
