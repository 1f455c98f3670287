//! waypoint-core
//!
//! Core traits and plumbing shared across the waypoint ecosystem.
//!
//! - `dispatcher`: the `Dispatcher` trait every backend adapter implements.
//! - `telemetry`: in-process event bus feeding the learning loop.
//! - `store`: pluggable persistence seam for learned-state snapshots.
//!
//! Backend registration itself lives with the gateway, which owns the
//! per-backend guard state that must travel with each dispatcher handle.
#![warn(missing_docs)]

/// The dispatcher contract backend adapters implement.
pub mod dispatcher;
/// Pluggable snapshot persistence seam.
pub mod store;
/// In-process telemetry fan-out.
pub mod telemetry;

pub use dispatcher::Dispatcher;
pub use store::SnapshotStore;
pub use telemetry::{Subscriber, TelemetryBus, TelemetryReceiver};

// Re-export shared DTOs for convenience.
pub use waypoint_types::{
    AttemptRecord, BackendId, BackendSpec, Capability, CapabilitySet, CircuitConfig,
    CircuitSnapshot, CircuitState, ConfigKey, DispatchReport, DispatchResult, ErrorKind,
    GatewayConfig, GatewayError, GenerationRequest, LearningConfig, MetricsRecord, PriorityAxis,
    Pricing, QuotaSnapshot, RateLimitConfig, RateWindow, RouteFactor, RoutingDecision,
    RoutingHints, TaskCategory, TelemetryEvent, Usage,
};
