mod helpers;

use std::sync::Arc;

use helpers::{deterministic_gateway, ok_mock, request, text_spec};
use waypoint::{BackendId, CapabilitySet, Gateway, GatewayError, RouteFactor, RoutingHints};

#[tokio::test]
async fn empty_registry_is_no_eligible_backends() {
    let gateway = Gateway::builder().seed(1).build().expect("builds empty");

    let err = gateway.submit(request()).await.expect_err("nothing to route to");
    assert!(matches!(err, GatewayError::NoEligibleBackends { .. }));
}

#[tokio::test]
async fn capability_filter_selects_the_only_capable_backend() {
    let text_only = Arc::new(ok_mock().build());
    let vision = Arc::new(ok_mock().build());

    let gateway = deterministic_gateway(vec![
        (text_spec("text-only"), text_only),
        (
            text_spec("vision-capable")
                .capabilities(CapabilitySet::TEXT | CapabilitySet::CHAT | CapabilitySet::VISION),
            vision,
        ),
    ]);

    let req = request().require(CapabilitySet::VISION);
    let decision = gateway.route(&req).expect("vision backend eligible");
    assert_eq!(decision.primary.as_str(), "vision-capable");
    assert!(decision.fallbacks.is_empty());

    // No backend satisfies vision + embeddings.
    let req = request().require(CapabilitySet::VISION | CapabilitySet::EMBEDDINGS);
    let err = gateway.route(&req).expect_err("no embeddings backend");
    assert!(matches!(err, GatewayError::NoEligibleBackends { .. }));
}

#[tokio::test]
async fn context_window_filter_excludes_small_backends() {
    let small = Arc::new(ok_mock().build());
    let large = Arc::new(ok_mock().build());

    let gateway = deterministic_gateway(vec![
        (text_spec("small").context_window(1_000), small),
        (text_spec("large").context_window(200_000), large),
    ]);

    let req = request().estimated_input(60_000).max_output(4_000);
    let decision = gateway.route(&req).expect("large backend fits");
    assert_eq!(decision.primary.as_str(), "large");

    let req = request().estimated_input(300_000).max_output(4_000);
    let err = gateway.route(&req).expect_err("nothing fits");
    match err {
        GatewayError::NoEligibleBackends { reason } => {
            assert!(reason.contains("context window too small"), "reason: {reason}");
        }
        other => panic!("expected NoEligibleBackends, got {other:?}"),
    }
}

#[tokio::test]
async fn excluded_hint_removes_backend_from_consideration() {
    let a = Arc::new(ok_mock().build());
    let b = Arc::new(ok_mock().build());

    let gateway = deterministic_gateway(vec![(text_spec("a"), a), (text_spec("b"), b)]);

    let req = request().hints(RoutingHints {
        excluded: vec![BackendId::new("a")],
        ..RoutingHints::default()
    });
    let decision = gateway.route(&req).expect("b remains");
    assert_eq!(decision.primary.as_str(), "b");
    assert!(decision.fallbacks.is_empty());
}

#[tokio::test]
async fn preferred_hint_restricts_to_the_intersection() {
    let a = Arc::new(ok_mock().build());
    let b = Arc::new(ok_mock().build());
    let c = Arc::new(ok_mock().build());

    let gateway = deterministic_gateway(vec![
        (text_spec("a"), a),
        (text_spec("b"), b),
        (text_spec("c"), c),
    ]);

    let req = request().hints(RoutingHints {
        preferred: vec![BackendId::new("b")],
        ..RoutingHints::default()
    });
    let decision = gateway.route(&req).expect("preferred backend routes");
    assert_eq!(decision.primary.as_str(), "b");
    assert!(decision.fallbacks.is_empty());

    // A preferred list with no eligible member falls back to the full set.
    let req = request().hints(RoutingHints {
        preferred: vec![BackendId::new("ghost")],
        ..RoutingHints::default()
    });
    let decision = gateway.route(&req).expect("full set used");
    assert_eq!(decision.fallbacks.len(), 2);
}

#[tokio::test]
async fn default_backend_answers_when_filter_empties_the_set() {
    let a = Arc::new(ok_mock().build());

    let gateway = Gateway::builder()
        .seed(3)
        .with_backend(text_spec("a"), a)
        .default_backend("a")
        .build()
        .expect("default backend known");

    // Vision is not served by `a`, so the filter empties; the default
    // decision points at `a` with floor confidence.
    let req = request().require(CapabilitySet::VISION);
    let decision = gateway.route(&req).expect("default fallback decision");
    assert_eq!(decision.primary.as_str(), "a");
    assert!((decision.confidence - 0.1).abs() < f64::EPSILON);
    assert_eq!(decision.factors, vec![RouteFactor::DefaultFallback]);
    assert_eq!(decision.rationale, "no eligible providers");
}

#[test]
fn unknown_default_backend_is_rejected_at_build() {
    let err = Gateway::builder()
        .default_backend("missing")
        .build()
        .expect_err("unregistered default");
    match err {
        GatewayError::InvalidConfig(msg) => assert!(msg.contains("missing")),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[tokio::test]
async fn fallbacks_are_the_next_two_by_score() {
    let gateway = deterministic_gateway(
        ["a", "b", "c", "d"]
            .into_iter()
            .map(|name| (text_spec(name), Arc::new(ok_mock().build())))
            .collect(),
    );

    let decision = gateway.route(&request()).expect("routes");
    assert_eq!(decision.fallbacks.len(), 2);
    assert!(!decision.fallbacks.contains(&decision.primary));
}

#[tokio::test]
async fn malformed_request_is_rejected_before_filtering() {
    let a = Arc::new(ok_mock().build());
    let gateway = deterministic_gateway(vec![(text_spec("a"), a)]);

    let req = request().priority(11);
    let err = gateway.route(&req).expect_err("priority out of range");
    assert!(matches!(err, GatewayError::Malformed { .. }));

    let req = request().estimated_input(0).max_output(0);
    let err = gateway.route(&req).expect_err("zero units");
    assert!(matches!(err, GatewayError::Malformed { .. }));
}
