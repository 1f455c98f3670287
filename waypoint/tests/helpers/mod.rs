#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use waypoint::{
    BackendSpec, CapabilitySet, Gateway, GatewayError, GenerationRequest, Pricing, TaskCategory,
    TelemetryEvent,
};
use waypoint_mock::{MockBehavior, MockDispatcher, MockDispatcherBuilder};

/// Declaration for a plain paid text/chat backend.
pub fn text_spec(name: &str) -> BackendSpec {
    BackendSpec::new(name)
        .capabilities(CapabilitySet::TEXT | CapabilitySet::CHAT)
        .pricing(Pricing::paid(2e-6, 6e-6))
}

/// Declaration for a backend with a free tier of `units` per hour.
pub fn free_spec(name: &str, units: u64) -> BackendSpec {
    BackendSpec::new(name)
        .capabilities(CapabilitySet::TEXT | CapabilitySet::CHAT | CapabilitySet::FREE_TIER)
        .pricing(Pricing::paid(0.0, 0.0).with_free_tier(units, Duration::from_secs(3_600)))
}

/// A text-generation request with small, predictable unit estimates.
pub fn request() -> GenerationRequest {
    GenerationRequest::new(TaskCategory::TextGeneration, "say hello")
        .estimated_input(100)
        .max_output(100)
}

/// Mock that always succeeds with fixed usage.
pub fn ok_mock() -> MockDispatcherBuilder {
    MockDispatcher::builder()
}

/// Mock that always fails with a transient error attributed to `name`.
pub fn transient_mock(name: &str) -> MockDispatcher {
    MockDispatcher::builder()
        .always_fail(GatewayError::transient(name, "upstream 503"))
        .build()
}

/// Two-backend gateway with a pinned seed and exploration disabled, the
/// baseline for order-sensitive assertions.
pub fn deterministic_gateway(backends: Vec<(BackendSpec, Arc<MockDispatcher>)>) -> Gateway {
    let mut builder = Gateway::builder().seed(7).exploration_rate(0.0);
    for (spec, dispatcher) in backends {
        builder = builder.with_backend(spec, dispatcher);
    }
    builder.build().expect("gateway builds")
}

/// Kind labels of drained telemetry events, for order assertions.
pub fn event_kinds(events: &[TelemetryEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|e| match e {
            TelemetryEvent::DispatchStarted { .. } => "started",
            TelemetryEvent::DispatchCompleted { success: true, .. } => "completed-ok",
            TelemetryEvent::DispatchCompleted { success: false, .. } => "completed-err",
            TelemetryEvent::FallbackTaken { .. } => "fallback",
            TelemetryEvent::CircuitTripped { .. } => "circuit",
            TelemetryEvent::QuotaExhausted { .. } => "quota",
            TelemetryEvent::SnapshotTaken { .. } => "snapshot",
            _ => "other",
        })
        .collect()
}

/// Behavior shorthand for a scripted success with explicit usage.
pub fn succeed_with(content: &str, input_units: u64, output_units: u64) -> MockBehavior {
    MockBehavior::Succeed {
        content: content.to_string(),
        input_units,
        output_units,
    }
}
