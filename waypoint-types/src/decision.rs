//! Routing decisions and dispatch reports returned to callers.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::BackendId;
use crate::error::ErrorKind;

/// A contributing factor named in a decision's rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteFactor {
    /// The backend's free quota can absorb the whole request.
    FreeQuotaAvailable,
    /// Success-rate EMA is high.
    HighReliability,
    /// Response-time EMA leaves latency headroom.
    LowLatency,
    /// The backend advertises every required capability.
    CapabilitySpecialty,
    /// The learned Q-value favors this backend for the category.
    LearnedPreference,
    /// The eligible set was empty; the configured default was used.
    DefaultFallback,
}

impl RouteFactor {
    /// Human-readable phrase used when composing rationale strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeQuotaAvailable => "free units available",
            Self::HighReliability => "high reliability",
            Self::LowLatency => "low latency headroom",
            Self::CapabilitySpecialty => "capability specialty",
            Self::LearnedPreference => "learned preference",
            Self::DefaultFallback => "no eligible providers",
        }
    }
}

impl fmt::Display for RouteFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The router's answer for one request: a primary backend, ranked fallbacks,
/// and the evidence behind the choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Backend to try first.
    pub primary: BackendId,
    /// Backends to try next, best first.
    pub fallbacks: Vec<BackendId>,
    /// Estimated cost of serving the request on `primary`.
    pub estimated_cost: f64,
    /// `primary`'s response-time EMA at decision time, milliseconds.
    pub estimated_latency_ms: f64,
    /// Normalized score gap between primary and runner-up, `[0.1, 0.95]`.
    pub confidence: f64,
    /// Machine-readable contributing factors, strongest first.
    pub factors: Vec<RouteFactor>,
    /// Human-readable rationale naming the top factors. Never parse this.
    pub rationale: String,
    /// True when this decision came from the exploration draw rather than
    /// the argmax.
    pub explored: bool,
}

/// One entry in a dispatch report's attempt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Backend that was attempted.
    pub backend: BackendId,
    /// Failure classification; `None` for the successful attempt.
    pub error_kind: Option<ErrorKind>,
    /// Time spent on this attempt, milliseconds.
    pub elapsed_ms: u64,
}

/// Summary of a completed submit, returned alongside the dispatch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// The routing decision that drove execution.
    pub decision: RoutingDecision,
    /// Every attempted backend, in attempt order.
    pub attempts: Vec<AttemptRecord>,
    /// Backend that ultimately served the request.
    pub served_by: BackendId,
    /// End-to-end response time of the winning attempt, milliseconds.
    pub response_time_ms: u64,
    /// True when free quota fully absorbed the request.
    pub used_free_quota: bool,
    /// Incurred cost after free-quota reconciliation.
    pub cost: f64,
}
