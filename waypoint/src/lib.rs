//! Waypoint routes AI text-generation requests across pluggable backends.
//!
//! Overview
//! - Accepts text, chat, and function-call requests and dispatches each to
//!   the backend that best satisfies the caller's latency, cost, and
//!   capability constraints.
//! - Scores backends with fuzzy health signals multiplied by a tabular
//!   Q-value learned from outcomes, with ε-greedy exploration to keep
//!   probing drifting backends.
//! - Enforces per-backend rate buckets and free-quota ledgers, trips
//!   circuit breakers on repeated failures, and transparently retries on
//!   ranked fallbacks when the chosen backend fails retryably.
//! - Feeds every outcome through an in-process telemetry bus that closes
//!   the learning loop and serves external observability taps.
//! - Persists learned state (metrics + Q-table) as versioned snapshots
//!   through a pluggable store.
//!
//! Key behaviors and trade-offs
//! - Fallbacks run strictly sequentially: racing backends would double-bill
//!   token usage, so lower tail latency is traded for billing safety.
//! - Terminal failures (auth, malformed, context-exceeded) never trigger
//!   fallback; only transient shapes walk the chain.
//! - Exploration is a fixed ε (no decay): the gateway keeps sampling
//!   non-favored backends so drift is noticed.
//! - Routing is deterministic under a pinned seed, which makes decisions
//!   replayable in tests and after snapshot restores.
//!
//! Construction mirrors the builder pattern used across the workspace:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waypoint::{Gateway, BackendSpec, CapabilitySet, Pricing};
//!
//! let gateway = Gateway::builder()
//!     .with_backend(
//!         BackendSpec::new("openrouter")
//!             .capabilities(CapabilitySet::TEXT | CapabilitySet::CHAT)
//!             .pricing(Pricing::paid(2e-6, 6e-6)),
//!         Arc::new(my_openrouter_adapter),
//!     )
//!     .seed(7)
//!     .build()?;
//!
//! let (result, report) = gateway.submit(request).await?;
//! ```
#![warn(missing_docs)]

pub(crate) mod core;
mod engine;
mod feedback;
mod router;
pub mod snapshot;
mod state;

pub use core::{Gateway, GatewayBuilder};
pub use router::fuzzy;
pub use router::qlearn;
pub use snapshot::{ImportReport, SnapshotData};

pub use waypoint_core::{Dispatcher, SnapshotStore, Subscriber, TelemetryReceiver};

// Re-export shared types for convenience
pub use waypoint_types::{
    AttemptRecord,
    BackendId,
    BackendSpec,
    Capability,
    CapabilitySet,
    CircuitConfig,
    CircuitSnapshot,
    CircuitState,
    ConfigKey,
    DispatchReport,
    DispatchResult,
    ErrorKind,
    GatewayConfig,
    GatewayError,
    GenerationRequest,
    LearningConfig,
    MetricsRecord,
    PriorityAxis,
    Pricing,
    QuotaSnapshot,
    RateLimitConfig,
    RateWindow,
    RouteFactor,
    RoutingDecision,
    RoutingHints,
    TaskCategory,
    TelemetryEvent,
    Usage,
};
