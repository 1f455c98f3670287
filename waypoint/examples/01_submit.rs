//! Minimal end-to-end submit against two mock backends.
//!
//! Run with: `cargo run --example 01_submit`

use std::sync::Arc;
use std::time::Duration;

use waypoint::{
    BackendSpec, CapabilitySet, Gateway, GatewayError, GenerationRequest, Pricing, TaskCategory,
};
use waypoint_mock::MockDispatcher;

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    let fast_free = Arc::new(
        MockDispatcher::builder()
            .latency(Duration::from_millis(120))
            .build(),
    );
    let steady_paid = Arc::new(
        MockDispatcher::builder()
            .latency(Duration::from_millis(400))
            .build(),
    );

    let gateway = Gateway::builder()
        .with_backend(
            BackendSpec::new("fast-free")
                .capabilities(CapabilitySet::TEXT | CapabilitySet::CHAT | CapabilitySet::FREE_TIER)
                .pricing(Pricing::paid(0.0, 0.0).with_free_tier(50_000, Duration::from_secs(3_600))),
            fast_free,
        )
        .with_backend(
            BackendSpec::new("steady-paid")
                .capabilities(CapabilitySet::TEXT | CapabilitySet::CHAT)
                .pricing(Pricing::paid(2e-6, 6e-6)),
            steady_paid,
        )
        .seed(42)
        .build()?;

    let request = GenerationRequest::new(TaskCategory::ChatCompletion, "Explain token buckets.")
        .estimated_input(300)
        .max_output(800)
        .prefer_free_tier();

    let (result, report) = gateway.submit(request).await?;

    println!("served by : {}", report.served_by);
    println!("rationale : {}", report.decision.rationale);
    println!("confidence: {:.2}", report.decision.confidence);
    println!("free tier : {}", report.used_free_quota);
    println!("cost      : {:.6}", report.cost);
    println!("reply     : {}", result.content);
    Ok(())
}
