//! Connection lifecycle tests against a scripted central
//!
//! Time is paused in every test so scan timeouts and discovery delays run
//! instantly and deterministically.

mod support;

use std::time::Duration;

use gattpipe_core::{
    Advertisement, BackendError, BridgeEvent, ConnectError, ConnectionState, DiscoveredGatt,
    DiscoveredService, Severity, SERVICE_UUID,
};
use support::{bridge_with, connected_bridge, settle, Script, DEVICE_ADDRESS};

// ----------------------------------------------------------------------------
// Happy Path
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_connect_reaches_ready() {
    let script = Script {
        advertisements: vec![
            Advertisement::new(None, "11:11:11:11:11:11"),
            Advertisement::new(Some("Headphones".to_string()), "22:22:22:22:22:22"),
            support::target_advertisement(),
        ],
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    bridge.connect().await.unwrap();
    settle().await;

    assert!(bridge.is_connected().await);
    assert_eq!(bridge.backend().connect_calls(), vec![DEVICE_ADDRESS]);
    assert_eq!(bridge.backend().stop_scan_calls(), 1);
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectSucceeded]);

    let logs = sink.logs();
    assert!(logs.contains(&"Unnamed device found: 11:11:11:11:11:11".to_string()));
    assert!(logs.contains(&"Device found: Headphones (22:22:22:22:22:22)".to_string()));
    assert!(logs.contains(&"Characteristic found".to_string()));
    assert!(sink
        .alerts(Severity::Success)
        .contains(&"Connected to peripheral".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_connect_publishes_status_changes() {
    let (bridge, sink) = bridge_with(Script::default());
    bridge.connect().await.unwrap();

    let statuses: Vec<bool> = sink
        .events()
        .iter()
        .filter_map(|e| match e {
            BridgeEvent::Status { connected, .. } => Some(*connected),
            _ => None,
        })
        .collect();

    // Scanning, Connecting, DiscoveringServices, Ready
    assert_eq!(statuses, vec![false, false, false, true]);
}

#[tokio::test(start_paused = true)]
async fn test_marker_match_is_accepted() {
    let script = Script {
        advertisements: vec![Advertisement::new(
            Some("MY_ESP32_BOARD".to_string()),
            DEVICE_ADDRESS,
        )],
        ..Script::default()
    };
    let (bridge, _sink) = bridge_with(script);

    bridge.connect().await.unwrap();
    assert!(bridge.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_notifications_surface_as_alerts() {
    let script = Script {
        notifications: vec![b"OK_0".to_vec(), b"TAMAM".to_vec(), b"HATA".to_vec()],
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    bridge.connect().await.unwrap();
    settle().await;

    match bridge.state().await {
        ConnectionState::Ready(link) => assert!(link.notifications_enabled),
        other => panic!("expected ready, got {:?}", other),
    }
    assert!(sink
        .alerts(Severity::Success)
        .contains(&"peripheral confirmed: TAMAM".to_string()));
    assert_eq!(
        sink.alerts(Severity::Error),
        vec!["peripheral reported HATA".to_string()]
    );
    assert!(sink
        .logs()
        .contains(&"Peripheral reply: OK_0".to_string()));
}

// ----------------------------------------------------------------------------
// Failures
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_scan_timeout_fails_once_without_connecting() {
    let script = Script {
        advertisements: vec![Advertisement::new(
            Some("Keyboard".to_string()),
            "33:33:33:33:33:33",
        )],
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    let started = tokio::time::Instant::now();
    let result = bridge.connect().await;

    assert_eq!(result, Err(ConnectError::ScanTimeout));
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert!(bridge.backend().connect_calls().is_empty());
    assert_eq!(bridge.backend().stop_scan_calls(), 1);
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
    assert_eq!(
        sink.alerts(Severity::Error),
        vec!["Peripheral not found, try again".to_string()]
    );
    assert_eq!(
        bridge.state().await,
        ConnectionState::Failed(ConnectError::ScanTimeout)
    );
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_never_scans() {
    let script = Script {
        preflight: Err(BackendError::PermissionDenied),
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    assert_eq!(bridge.connect().await, Err(ConnectError::PermissionDenied));
    assert_eq!(bridge.backend().start_scan_calls(), 0);
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
}

#[tokio::test(start_paused = true)]
async fn test_radio_disabled_is_reported() {
    let script = Script {
        preflight: Err(BackendError::RadioDisabled),
        ..Script::default()
    };
    let (bridge, _sink) = bridge_with(script);

    assert_eq!(bridge.connect().await, Err(ConnectError::RadioDisabled));
}

#[tokio::test(start_paused = true)]
async fn test_scan_start_failure() {
    let script = Script {
        scan_start: Err(BackendError::Operation("scanner busy".to_string())),
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    let result = bridge.connect().await;
    assert!(matches!(result, Err(ConnectError::ScanStartFailed(_))));
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
}

#[tokio::test(start_paused = true)]
async fn test_link_error_on_connect() {
    let script = Script {
        connect: Err(BackendError::Operation("status 133".to_string())),
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    let result = bridge.connect().await;
    assert!(matches!(result, Err(ConnectError::LinkError(_))));
    assert!(!bridge.is_connected().await);
    assert_eq!(bridge.backend().disconnect_calls(), vec![DEVICE_ADDRESS]);
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
}

#[tokio::test(start_paused = true)]
async fn test_service_missing() {
    let script = Script {
        gatt: DiscoveredGatt::default(),
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    assert_eq!(bridge.connect().await, Err(ConnectError::ServiceNotFound));
    assert_eq!(bridge.backend().disconnect_calls(), vec![DEVICE_ADDRESS]);
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
}

#[tokio::test(start_paused = true)]
async fn test_characteristic_missing() {
    let script = Script {
        gatt: DiscoveredGatt {
            services: vec![DiscoveredService {
                uuid: SERVICE_UUID,
                characteristics: Vec::new(),
            }],
        },
        ..Script::default()
    };
    let (bridge, _sink) = bridge_with(script);

    assert_eq!(
        bridge.connect().await,
        Err(ConnectError::CharacteristicNotFound)
    );
    assert!(!bridge.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_link_lost_during_discovery_never_reaches_ready() {
    let script = Script {
        lose_link_during_discovery: true,
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    let result = bridge.connect().await;
    settle().await;

    assert_eq!(result, Err(ConnectError::SpontaneousDisconnect));
    assert!(!bridge.is_connected().await);
    assert!(matches!(bridge.state().await, ConnectionState::Failed(_)));
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
}

#[tokio::test(start_paused = true)]
async fn test_link_lost_while_connecting() {
    let script = Script {
        lose_link_during_connect: true,
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    let result = bridge.connect().await;
    settle().await;

    assert_eq!(result, Err(ConnectError::SpontaneousDisconnect));
    assert!(!bridge.is_connected().await);
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
    assert!(!sink
        .logs()
        .contains(&"GATT link established".to_string()));
}

// ----------------------------------------------------------------------------
// Concurrency and Teardown
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_second_connect_is_rejected_while_running() {
    let script = Script {
        advertisements: Vec::new(),
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    let first = tokio::spawn({
        let bridge = bridge.clone();
        async move { bridge.connect().await }
    });
    settle().await;

    assert_eq!(bridge.connect().await, Err(ConnectError::InProgress));

    let first = first.await.unwrap();
    assert_eq!(first, Err(ConnectError::ScanTimeout));
    assert_eq!(bridge.backend().start_scan_calls(), 1);
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
}

#[tokio::test(start_paused = true)]
async fn test_link_lost_while_ready() {
    let (bridge, sink) = connected_bridge(Script::default()).await;

    bridge.backend().drop_link(DEVICE_ADDRESS);
    settle().await;

    assert!(!bridge.is_connected().await);
    assert_eq!(bridge.state().await, ConnectionState::Disconnected);
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
    assert!(sink.logs().contains(&"GATT link lost".to_string()));
    assert!(sink.events().contains(&BridgeEvent::Status {
        text: "Disconnected from peripheral".to_string(),
        connected: false,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_link_lost_while_ready_releases_the_link() {
    let (bridge, _sink) = connected_bridge(Script::default()).await;

    bridge.backend().drop_link(DEVICE_ADDRESS);
    settle().await;
    bridge.shutdown().await;

    // Released once by the watcher; shutdown has nothing left to close
    assert_eq!(bridge.backend().disconnect_calls(), vec![DEVICE_ADDRESS]);
    assert_eq!(bridge.state().await, ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_running_connect() {
    let script = Script {
        advertisements: Vec::new(),
        ..Script::default()
    };
    let (bridge, sink) = bridge_with(script);

    let attempt = tokio::spawn({
        let bridge = bridge.clone();
        async move { bridge.connect().await }
    });
    settle().await;
    bridge.shutdown().await;

    assert_eq!(attempt.await.unwrap(), Err(ConnectError::Cancelled));
    assert_eq!(bridge.state().await, ConnectionState::Idle);
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectFailed]);
}

#[tokio::test(start_paused = true)]
async fn test_loss_of_other_device_is_ignored() {
    let (bridge, sink) = connected_bridge(Script::default()).await;

    bridge.backend().drop_link("99:99:99:99:99:99");
    settle().await;

    assert!(bridge.is_connected().await);
    assert!(sink.terminal_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_failure() {
    let (bridge, _sink) = connected_bridge(Script::default()).await;

    bridge.backend().drop_link(DEVICE_ADDRESS);
    settle().await;
    assert!(!bridge.is_connected().await);

    bridge.connect().await.unwrap();
    assert!(bridge.is_connected().await);
    assert_eq!(bridge.backend().connect_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_ready_closes_previous_link() {
    let (bridge, sink) = connected_bridge(Script::default()).await;

    bridge.connect().await.unwrap();

    assert!(bridge.is_connected().await);
    assert_eq!(bridge.backend().disconnect_calls(), vec![DEVICE_ADDRESS]);
    assert!(sink
        .logs()
        .contains(&"Closing existing connection".to_string()));
    assert_eq!(sink.terminal_events(), vec![BridgeEvent::ConnectSucceeded]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_idempotent() {
    let (bridge, _sink) = connected_bridge(Script::default()).await;

    bridge.shutdown().await;
    bridge.shutdown().await;

    assert_eq!(bridge.state().await, ConnectionState::Idle);
    assert_eq!(bridge.backend().disconnect_calls(), vec![DEVICE_ADDRESS]);
}
