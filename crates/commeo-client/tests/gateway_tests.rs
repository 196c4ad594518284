//! Gateway tests (commeo-client)
//!
//! Drive a [`Gateway`] against the scripted mock gateway:
//! - Bring-up from actor list to setup finished
//! - Steady-state refreshes after setup
//! - Fault and garbage isolation
//! - Single-flight receive and close
//! - Drive commands and their results

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use commeo_client::{ActorState, ClientError, Gateway, GatewayConfig, NoopHooks};
use commeo_core::{Error, Method};
use commeo_test_utils::{
    connect, fast_config, frames, BrokenStream, HookCall, MockActor, RecordingHooks,
    DEFAULT_TIMEOUT,
};
use commeo_transport::TransportError;

fn set(ids: &[u32]) -> BTreeSet<u32> {
    ids.iter().copied().collect()
}

// ============================================================================
// Bring-up
// ============================================================================

#[tokio::test]
async fn test_discovery_skips_inactive_actor() {
    let (gateway, mock, hooks) = connect(vec![
        MockActor::shutter(5, "Living room"),
        MockActor::shutter(9, "Sensor").with_device_type(4),
    ]);

    gateway.start_discovery().await.unwrap();

    assert_eq!(mock.requested_actors(Method::DEVICE_GET_INFO), vec![5, 9]);
    assert_eq!(mock.requested_actors(Method::DEVICE_GET_VALUES), vec![5]);

    assert_eq!(hooks.setup_finished(), vec![set(&[5])]);
    assert!(gateway.is_setup_complete());
    assert_eq!(gateway.available_actors(), set(&[5, 9]));

    let actors = gateway.actors();
    assert_eq!(actors.len(), 1);
    assert_eq!(actors[0].label, "Living room");
    assert!(gateway.actor(9).is_none());

    assert_eq!(gateway.actor_state(5), Some(ActorState::FullyInitialized));
    assert_eq!(gateway.actor_state(9), Some(ActorState::Excluded));
    assert!(gateway.status(5).unwrap().is_fully_open());
}

#[tokio::test]
async fn test_discovery_hook_order() {
    let (gateway, _mock, hooks) = connect(vec![MockActor::shutter(3, "Kitchen").at(65535)]);

    gateway.start_discovery().await.unwrap();

    assert_eq!(
        hooks.calls(),
        vec![
            HookCall::ActorsReceived,
            HookCall::ReceiveDone(false),
            HookCall::ActorInitialized(3),
            HookCall::ReceiveDone(false),
            HookCall::ActorUpdated(3, true),
            HookCall::SetupFinished(set(&[3])),
            HookCall::ReceiveDone(false),
            HookCall::ReceiveDone(true),
        ]
    );
    assert_eq!(gateway.status(3).unwrap().position(), 100);
}

#[tokio::test]
async fn test_discovery_skips_disabled_shutter() {
    let (gateway, _mock, hooks) = connect(vec![
        MockActor::shutter(2, "Hall"),
        MockActor::shutter(3, "Spare").with_device_status(0),
    ]);

    gateway.start_discovery().await.unwrap();

    assert_eq!(hooks.setup_finished(), vec![set(&[2])]);
    assert_eq!(gateway.actor_state(3), Some(ActorState::Excluded));
    assert!(gateway.actor(3).is_none());
}

#[tokio::test]
async fn test_early_status_for_non_shutter_is_excluded() {
    let (gateway, mock, hooks) = connect(vec![
        MockActor::shutter(5, "Living room"),
        MockActor::shutter(9, "Sensor").with_device_type(4),
    ]);

    // Status for 9 arrives before the actor list or its identity
    mock.push(frames::status_event(9, 1, 0, 0));
    gateway.start_discovery().await.unwrap();

    let requested: BTreeSet<u32> = mock
        .requested_actors(Method::DEVICE_GET_INFO)
        .into_iter()
        .collect();
    assert_eq!(requested, set(&[5, 9]));
    assert_eq!(hooks.setup_finished(), vec![set(&[5])]);
    assert_eq!(gateway.actor_state(9), Some(ActorState::Excluded));
    assert!(gateway.actor(9).is_none());
}

#[tokio::test]
async fn test_scripted_actor_list_with_unknown_actor() {
    let (gateway, mock, hooks) = connect(vec![MockActor::shutter(5, "Five")]);
    mock.script(Method::DEVICE_GET_IDS, vec![frames::ids_response(&[5, 9])]);

    gateway.start_discovery().await.unwrap();

    // The gateway faults on actor 9, which never gets past uninitialized
    assert_eq!(gateway.available_actors(), set(&[5, 9]));
    assert_eq!(gateway.actor_state(5), Some(ActorState::FullyInitialized));
    assert_eq!(gateway.actor_state(9), Some(ActorState::Uninitialized));
    assert!(!gateway.is_setup_complete());
    assert!(hooks.setup_finished().is_empty());
}

#[tokio::test]
async fn test_background_pump_reports_setup() {
    let (gateway, _mock, hooks) = connect(vec![MockActor::shutter(1, "One")]);
    let gateway = Arc::new(gateway);

    let task = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.start_discovery().await })
    };

    assert!(
        hooks
            .wait_for_call(HookCall::SetupFinished(set(&[1])), DEFAULT_TIMEOUT)
            .await
    );
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_setup_finishes_once_with_every_actor() {
    let (gateway, _mock, hooks) = connect(vec![
        MockActor::shutter(1, "One"),
        MockActor::shutter(2, "Two"),
        MockActor::shutter(17, "Seventeen"),
    ]);

    gateway.start_discovery().await.unwrap();
    assert_eq!(hooks.setup_finished(), vec![set(&[1, 2, 17])]);

    // A second bring-up round changes nothing
    gateway.start_discovery().await.unwrap();
    assert_eq!(hooks.setup_finished().len(), 1);
}

#[tokio::test]
async fn test_repeated_actor_list_requests_no_info_twice() {
    let (gateway, mock, _hooks) = connect(vec![
        MockActor::shutter(5, "Five"),
        MockActor::shutter(6, "Six"),
    ]);

    gateway.start_discovery().await.unwrap();
    gateway.request_actor_ids().unwrap();
    gateway.pump().await.unwrap();

    assert_eq!(mock.requests_for(Method::DEVICE_GET_IDS).len(), 2);
    assert_eq!(mock.requested_actors(Method::DEVICE_GET_INFO), vec![5, 6]);
}

#[tokio::test]
async fn test_new_actor_after_setup_is_initialized() {
    let (gateway, mock, hooks) = connect(vec![MockActor::shutter(5, "Five")]);
    gateway.start_discovery().await.unwrap();

    mock.update_actor(MockActor::shutter(8, "Eight"));
    gateway.start_discovery().await.unwrap();

    assert_eq!(mock.requested_actors(Method::DEVICE_GET_INFO), vec![5, 8]);
    assert_eq!(gateway.actor_state(8), Some(ActorState::FullyInitialized));
    assert_eq!(hooks.setup_finished(), vec![set(&[5])]);
}

#[tokio::test]
async fn test_silent_gateway_ends_pump() {
    let (gateway, mock, hooks) = connect(vec![MockActor::shutter(5, "Five")]);
    mock.set_silent(true);

    tokio::time::timeout(DEFAULT_TIMEOUT, gateway.start_discovery())
        .await
        .expect("pump did not stop on timeout")
        .unwrap();

    assert_eq!(hooks.calls(), vec![HookCall::ReceiveDone(true)]);
    assert!(!gateway.is_setup_complete());
}

// ============================================================================
// Steady State
// ============================================================================

#[tokio::test]
async fn test_status_event_after_setup_is_refreshed() {
    let (gateway, mock, hooks) = connect(vec![MockActor::shutter(5, "Five")]);
    gateway.start_discovery().await.unwrap();

    mock.push(frames::status_event(5, 3, 30000, 65535));
    gateway.pump().await.unwrap();

    assert_eq!(hooks.refreshed(), vec![5]);
    assert!(hooks.has(&HookCall::ActorUpdated(5, false)));
    let status = gateway.status(5).unwrap();
    assert!(status.is_closing());
    assert_eq!(status.target_position(), 100);
}

#[tokio::test]
async fn test_fault_does_not_disturb_following_frame() {
    let (gateway, mock, hooks) = connect(vec![MockActor::shutter(5, "Five")]);
    gateway.start_discovery().await.unwrap();
    let before = gateway.actors();

    mock.push(frames::fault_response(&["selve.GW.device.getValues", "busy"]));
    mock.push("<methodResponse><array><string>selve.GW.device.getValues");
    mock.push(frames::status_event(5, 1, 65535, 65535));
    gateway.pump().await.unwrap();

    assert_eq!(gateway.actors(), before);
    assert!(gateway.status(5).unwrap().is_closed());
    assert_eq!(hooks.refreshed(), vec![5]);
}

#[tokio::test]
async fn test_unknown_method_is_ignored() {
    let (gateway, mock, hooks) = connect(vec![]);

    mock.push("<methodCall><methodName>selve.GW.sensor.event</methodName><array><int>1</int></array></methodCall>");
    gateway.pump().await.unwrap();

    assert_eq!(
        hooks.calls(),
        vec![HookCall::ReceiveDone(false), HookCall::ReceiveDone(true)]
    );
}

#[tokio::test]
async fn test_duty_cycle_and_log_events() {
    let (gateway, mock, _hooks) = connect(vec![]);

    mock.push(frames::duty_cycle_event(true, 3));
    mock.push(frames::log_event(2, "E17", "12:00:00", "radio", "no ack"));
    gateway.pump().await.unwrap();

    let duty = gateway.duty_cycle().unwrap();
    assert!(duty.blocked);
    assert_eq!(duty.allowed_usage, 3);
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_drive_to_position_round_trip() {
    let (gateway, mock, _hooks) = connect(vec![MockActor::shutter(5, "Five")]);
    gateway.start_discovery().await.unwrap();

    gateway.drive_to_position(5, 50).unwrap();
    gateway.pump().await.unwrap();

    let sent = mock.requests_for(Method::COMMAND_DEVICE);
    assert_eq!(sent.len(), 1);
    let args: Vec<i64> = (0..4).map(|i| sent[0].int(i).unwrap()).collect();
    assert_eq!(args, vec![5, 7, 1, 32768]);

    let outcome = gateway.last_command_outcome().unwrap();
    assert_eq!(outcome.succeeded, set(&[5]));
    assert!(!outcome.has_error());
    assert_eq!(gateway.status(5).unwrap().current_raw, 32768);
}

#[tokio::test]
async fn test_drive_commands_encode_codes() {
    let (gateway, mock, _hooks) = connect(vec![MockActor::shutter(2, "Two")]);

    gateway.drive_up(2).unwrap();
    gateway.drive_down(2).unwrap();
    gateway.stop(2).unwrap();
    assert!(mock.wait_for_requests(3, DEFAULT_TIMEOUT).await);

    let codes: Vec<i64> = mock
        .requests_for(Method::COMMAND_DEVICE)
        .iter()
        .map(|f| f.int(1).unwrap())
        .collect();
    assert_eq!(codes, vec![1, 2, 0]);
}

#[tokio::test]
async fn test_failed_command_is_recorded() {
    let (gateway, mock, _hooks) = connect(vec![]);

    gateway.drive_down(4).unwrap();
    gateway.pump().await.unwrap();

    let outcome = gateway.last_command_outcome().unwrap();
    assert_eq!(outcome.failed, set(&[4]));
    assert!(outcome.has_error());
    assert_eq!(mock.requests_for(Method::COMMAND_DEVICE).len(), 1);
}

#[tokio::test]
async fn test_position_above_100_rejected() {
    let (gateway, mock, _hooks) = connect(vec![MockActor::shutter(5, "Five")]);

    let result = gateway.drive_to_position(5, 101);
    assert!(matches!(
        result,
        Err(ClientError::Protocol(Error::InvalidPosition(101)))
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.request_count(), 0);
}

// ============================================================================
// Receive and Close
// ============================================================================

#[tokio::test]
async fn test_concurrent_receive_is_a_noop() {
    let (gateway, _mock, hooks) = connect(vec![]);

    let (first, second) = tokio::join!(gateway.receive_one(), gateway.receive_one());

    assert!(!first.unwrap());
    assert!(!second.unwrap());
    // Only the first attempt reached the stream
    assert_eq!(hooks.calls(), vec![HookCall::ReceiveDone(true)]);
}

#[tokio::test]
async fn test_close_stops_everything() {
    let (gateway, _mock, _hooks) = connect(vec![MockActor::shutter(5, "Five")]);

    gateway.close();
    assert!(!gateway.is_connected());
    assert!(matches!(
        gateway.request_actor_ids(),
        Err(ClientError::Transport(TransportError::NotConnected))
    ));
    assert!(matches!(
        gateway.receive_one().await,
        Err(ClientError::Transport(TransportError::ConnectionClosed))
    ));
}

#[tokio::test]
async fn test_gateway_hangup_ends_pump_with_error() {
    let (gateway, mut mock, _hooks) = connect(vec![]);

    mock.stop();
    let result = tokio::time::timeout(DEFAULT_TIMEOUT, gateway.pump())
        .await
        .expect("pump hung after hangup");
    assert!(matches!(
        result,
        Err(ClientError::Transport(TransportError::ConnectionClosed))
    ));
}

#[tokio::test]
async fn test_unplugged_gateway_ends_pump_with_error() {
    let hooks = RecordingHooks::new();
    let gateway = Gateway::with_stream(BrokenStream, &fast_config(), Arc::new(hooks.clone()));

    let result = tokio::time::timeout(DEFAULT_TIMEOUT, gateway.pump())
        .await
        .expect("pump spun on a broken stream");
    assert!(matches!(
        result,
        Err(ClientError::Transport(TransportError::ConnectionClosed))
    ));
    assert!(!gateway.is_connected());
    assert_eq!(
        hooks.count(),
        commeo_transport::MAX_READ_ERRORS - 1,
        "one ReceiveDone per error before the connection closed"
    );
}

#[tokio::test]
async fn test_open_missing_port() {
    let config = GatewayConfig::new("/dev/commeo-does-not-exist");
    let result = Gateway::open(&config, Arc::new(NoopHooks)).await;
    assert!(matches!(
        result,
        Err(ClientError::Transport(TransportError::ConnectionFailed(_)))
    ));
}
