//! Waypoint-specific data transfer objects and configuration primitives.
#![warn(missing_docs)]

mod backend;
mod capability;
mod category;
mod config;
mod decision;
mod error;
mod events;
mod metrics;
mod middleware;
mod request;

pub use backend::{BackendId, BackendSpec, Pricing};
pub use capability::{Capability, CapabilitySet};
pub use category::TaskCategory;
pub use config::{CircuitConfig, ConfigKey, GatewayConfig, LearningConfig, RateLimitConfig};
pub use decision::{AttemptRecord, DispatchReport, RouteFactor, RoutingDecision};
pub use error::{ErrorKind, GatewayError};
pub use events::TelemetryEvent;
pub use metrics::{DEFAULT_QUALITY, MetricsRecord};
pub use middleware::{CircuitSnapshot, CircuitState, QuotaSnapshot, RateWindow};
pub use request::{
    DispatchResult, GenerationRequest, MAX_PRIORITY, PriorityAxis, RoutingHints, Usage,
};
