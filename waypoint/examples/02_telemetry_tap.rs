//! Observe the learning loop through a telemetry tap while a flaky backend
//! trips its circuit and recovers via fallback.
//!
//! Run with: `cargo run --example 02_telemetry_tap`

use std::sync::Arc;

use waypoint::{
    BackendSpec, CapabilitySet, CircuitConfig, Gateway, GatewayError, GenerationRequest, Pricing,
    TaskCategory,
};
use waypoint_mock::MockDispatcher;

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let flaky = Arc::new(
        MockDispatcher::builder()
            .always_fail(GatewayError::transient("flaky", "upstream 503"))
            .build(),
    );
    let stable = Arc::new(MockDispatcher::builder().build());

    let gateway = Gateway::builder()
        .with_backend(
            BackendSpec::new("flaky")
                .capabilities(CapabilitySet::TEXT)
                .pricing(Pricing::paid(1e-6, 2e-6)),
            flaky,
        )
        .with_backend(
            BackendSpec::new("stable")
                .capabilities(CapabilitySet::TEXT)
                .pricing(Pricing::paid(3e-6, 9e-6)),
            stable,
        )
        .circuit(CircuitConfig {
            failure_threshold: 3,
            ..CircuitConfig::default()
        })
        .seed(7)
        .build()?;

    let rx = gateway.tap();

    for round in 0..5 {
        let request =
            GenerationRequest::new(TaskCategory::TextGeneration, format!("round {round}"));
        match gateway.submit(request).await {
            Ok((_, report)) => println!("round {round}: served by {}", report.served_by),
            Err(err) => println!("round {round}: {err}"),
        }
    }

    println!("-- telemetry --");
    for event in rx.drain() {
        println!("{event:?}");
    }
    println!("q-table: {:?}", gateway.q_table());
    Ok(())
}
