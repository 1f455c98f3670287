use waypoint_types::{
    BackendId, Capability, CapabilitySet, CircuitState, ErrorKind, TaskCategory, TelemetryEvent,
};

#[test]
fn dispatch_completed_roundtrip() {
    let event = TelemetryEvent::DispatchCompleted {
        backend: BackendId::new("openai"),
        category: TaskCategory::ChatCompletion,
        timestamp_ms: 1_700_000_000_000,
        request_id: 42,
        success: false,
        input_units: 120,
        output_units: 0,
        cost: 0.0,
        response_time_ms: 5_000,
        used_free_quota: false,
        error_kind: Some(ErrorKind::Timeout),
        quality_hint: None,
    };

    let json = serde_json::to_string(&event).expect("serialize event");
    assert!(json.contains("\"kind\":\"dispatch-completed\""));

    let de: TelemetryEvent = serde_json::from_str(&json).expect("deserialize event");
    assert_eq!(de, event);
    assert_eq!(de.backend().map(BackendId::as_str), Some("openai"));
}

#[test]
fn circuit_tripped_carries_state_labels() {
    let event = TelemetryEvent::CircuitTripped {
        backend: BackendId::new("groq"),
        timestamp_ms: 1,
        from_state: CircuitState::Closed,
        to_state: CircuitState::Open,
        reason: "failure threshold reached".to_string(),
    };

    let json = serde_json::to_string(&event).expect("serialize event");
    let de: TelemetryEvent = serde_json::from_str(&json).expect("deserialize event");
    assert_eq!(de, event);
}

#[test]
fn capability_set_serializes_as_tag_list() {
    let caps = CapabilitySet::from_caps(&[Capability::Chat, Capability::Vision]);

    let json = serde_json::to_string(&caps).expect("serialize set");
    assert_eq!(json, r#"["Chat","Vision"]"#);

    let de: CapabilitySet = serde_json::from_str(&json).expect("deserialize set");
    assert_eq!(de, caps);
    assert!(de.satisfies(CapabilitySet::VISION));
    assert!(!de.satisfies(CapabilitySet::CODE));
}

#[test]
fn error_kind_codes_are_stable() {
    assert_eq!(ErrorKind::RateLimited.code(), "rate-limited");
    assert_eq!(ErrorKind::AuthFailed.code(), "auth-failed");
    assert!(ErrorKind::Transient.is_retryable());
    assert!(!ErrorKind::Malformed.is_retryable());
    assert!(ErrorKind::Timeout.is_cold_start());
    assert!(!ErrorKind::RateLimited.is_cold_start());
}
