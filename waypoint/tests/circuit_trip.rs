mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{ok_mock, request, text_spec, transient_mock};
use waypoint::{
    BackendId, CircuitConfig, CircuitState, Gateway, GatewayError, TelemetryEvent,
};
use waypoint_mock::{MockBehavior, MockDispatcher};

fn tripping_gateway(dispatcher: Arc<MockDispatcher>) -> Gateway {
    Gateway::builder()
        .seed(11)
        .exploration_rate(0.0)
        .circuit(CircuitConfig {
            failure_threshold: 3,
            ..CircuitConfig::default()
        })
        .with_backend(text_spec("x"), dispatcher)
        .build()
        .expect("gateway builds")
}

#[tokio::test(start_paused = true)]
async fn three_failures_trip_the_circuit() {
    let x = Arc::new(transient_mock("x"));
    let gateway = tripping_gateway(x.clone());
    let rx = gateway.tap();

    for _ in 0..3 {
        let err = gateway.submit(request()).await.expect_err("x fails");
        assert!(matches!(err, GatewayError::AllProvidersFailed(_)));
    }
    assert_eq!(x.calls(), 3);

    let circuit = gateway.circuit(&BackendId::new("x")).expect("circuit exists");
    assert_eq!(circuit.state, CircuitState::Open);

    // Fourth submit: the router refuses without invoking the adapter.
    let err = gateway.submit(request()).await.expect_err("circuit open");
    match err {
        GatewayError::NoEligibleBackends { reason } => {
            assert!(reason.contains("circuit open"), "reason: {reason}");
        }
        other => panic!("expected NoEligibleBackends, got {other:?}"),
    }
    assert_eq!(x.calls(), 3, "open circuit must not reach the adapter");

    let trips: Vec<(CircuitState, CircuitState)> = rx
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            TelemetryEvent::CircuitTripped {
                from_state,
                to_state,
                ..
            } => Some((from_state, to_state)),
            _ => None,
        })
        .collect();
    assert_eq!(trips, vec![(CircuitState::Closed, CircuitState::Open)]);
}

#[tokio::test(start_paused = true)]
async fn elapsed_hold_admits_one_probe_which_closes_on_success() {
    let x = Arc::new(
        MockDispatcher::builder()
            .then_fail(GatewayError::transient("x", "503"))
            .then_fail(GatewayError::transient("x", "503"))
            .then_fail(GatewayError::transient("x", "503"))
            .otherwise(MockBehavior::ok("recovered"))
            .build(),
    );
    let gateway = tripping_gateway(x.clone());

    for _ in 0..3 {
        let _ = gateway.submit(request()).await.expect_err("warming up the trip");
    }
    assert!(gateway.submit(request()).await.is_err());

    tokio::time::advance(Duration::from_secs(31)).await;

    let (result, report) = gateway.submit(request()).await.expect("probe succeeds");
    assert_eq!(result.content, "recovered");
    assert_eq!(report.served_by.as_str(), "x");

    let circuit = gateway.circuit(&BackendId::new("x")).expect("circuit exists");
    assert_eq!(circuit.state, CircuitState::Closed);
    assert_eq!(circuit.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_reopens_with_the_extended_hold() {
    let x = Arc::new(transient_mock("x"));
    let gateway = tripping_gateway(x.clone());

    for _ in 0..3 {
        let _ = gateway.submit(request()).await.expect_err("tripping");
    }
    tokio::time::advance(Duration::from_secs(31)).await;

    // Probe goes through to the adapter and fails.
    let _ = gateway.submit(request()).await.expect_err("probe fails");
    assert_eq!(x.calls(), 4);

    // Base hold is not enough after a failed probe.
    tokio::time::advance(Duration::from_secs(31)).await;
    let err = gateway.submit(request()).await.expect_err("still open");
    assert!(matches!(err, GatewayError::NoEligibleBackends { .. }));
    assert_eq!(x.calls(), 4);

    tokio::time::advance(Duration::from_secs(30)).await;
    let _ = gateway.submit(request()).await.expect_err("second probe fails too");
    assert_eq!(x.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn open_circuit_on_one_backend_leaves_others_routable() {
    let bad = Arc::new(transient_mock("bad"));
    let good = Arc::new(ok_mock().build());

    let gateway = Gateway::builder()
        .seed(11)
        .exploration_rate(0.0)
        .circuit(CircuitConfig {
            failure_threshold: 1,
            ..CircuitConfig::default()
        })
        .with_backend(text_spec("bad"), bad)
        .with_backend(text_spec("good"), good)
        .build()
        .expect("gateway builds");

    // Whatever the first decision was, the chain lands on `good` and the
    // failure trips `bad`'s breaker.
    let (_, report) = gateway.submit(request()).await.expect("good serves");
    assert_eq!(report.served_by.as_str(), "good");

    if gateway
        .circuit(&BackendId::new("bad"))
        .is_some_and(|c| c.state == CircuitState::Open)
    {
        let decision = gateway.route(&request()).expect("good still eligible");
        assert_eq!(decision.primary.as_str(), "good");
        assert!(decision.fallbacks.is_empty());
    }
}
