//! Request and result shapes exchanged between callers, the gateway, and
//! dispatchers.

use core::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::BackendId;
use crate::capability::CapabilitySet;
use crate::category::TaskCategory;
use crate::error::GatewayError;

/// Highest caller priority accepted by [`GenerationRequest::priority`].
pub const MAX_PRIORITY: u8 = 10;

/// Which axis the caller optimizes for; boosts matching scoring rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriorityAxis {
    /// Minimize latency.
    Speed,
    /// Minimize cost.
    Cost,
    /// Maximize answer quality.
    Accuracy,
    /// No single axis dominates.
    #[default]
    Balanced,
}

impl PriorityAxis {
    /// Stable identifier for logs and rationale strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Cost => "cost",
            Self::Accuracy => "accuracy",
            Self::Balanced => "balanced",
        }
    }
}

impl fmt::Display for PriorityAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied steering for backend selection.
///
/// Hints narrow or reorder the eligible set; they never make an incapable
/// backend eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingHints {
    /// When non-empty and intersecting the eligible set, restrict routing to
    /// these backends.
    pub preferred: Vec<BackendId>,
    /// Backends to exclude outright.
    pub excluded: Vec<BackendId>,
    /// Prefer backends whose free quota can absorb the whole request.
    pub prefer_free_tier: bool,
}

impl RoutingHints {
    /// True when no hint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.preferred.is_empty() && self.excluded.is_empty() && !self.prefer_free_tier
    }
}

/// A routable text/chat/function-call request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Request shape; also the Q-learning key.
    pub category: TaskCategory,
    /// Opaque payload handed to the dispatcher.
    pub prompt: String,
    /// Estimated input size in units (tokens or equivalent).
    pub estimated_input_units: u64,
    /// Largest acceptable output, in units.
    pub max_output_units: u64,
    /// Caller priority in `[0, 10]`.
    pub priority: u8,
    /// Axis the caller optimizes for.
    pub axis: PriorityAxis,
    /// Optional hard deadline for the whole submit, including fallbacks.
    pub deadline: Option<Duration>,
    /// Capabilities every candidate backend must advertise.
    pub required: CapabilitySet,
    /// Routing steering hints.
    pub hints: RoutingHints,
    /// Caller-observed quality for this workload, `[0, 1]`. Absent means the
    /// stored default applies and quality is not learned.
    pub quality_hint: Option<f64>,
}

impl GenerationRequest {
    /// Build a request with neutral defaults: priority 5, balanced axis, no
    /// deadline, no capability requirements, no hints.
    pub fn new(category: TaskCategory, prompt: impl Into<String>) -> Self {
        Self {
            category,
            prompt: prompt.into(),
            estimated_input_units: 256,
            max_output_units: 1024,
            priority: 5,
            axis: PriorityAxis::Balanced,
            deadline: None,
            required: CapabilitySet::empty(),
            hints: RoutingHints::default(),
            quality_hint: None,
        }
    }

    /// Set the estimated input size in units.
    #[must_use]
    pub const fn estimated_input(mut self, units: u64) -> Self {
        self.estimated_input_units = units;
        self
    }

    /// Set the output ceiling in units.
    #[must_use]
    pub const fn max_output(mut self, units: u64) -> Self {
        self.max_output_units = units;
        self
    }

    /// Set the caller priority (validated by [`validate`](Self::validate)).
    #[must_use]
    pub const fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the optimization axis.
    #[must_use]
    pub const fn axis(mut self, axis: PriorityAxis) -> Self {
        self.axis = axis;
        self
    }

    /// Set a hard deadline covering routing, dispatch, and fallbacks.
    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Require capabilities of every candidate backend.
    #[must_use]
    pub fn require(mut self, caps: CapabilitySet) -> Self {
        self.required |= caps;
        self
    }

    /// Replace the routing hints.
    #[must_use]
    pub fn hints(mut self, hints: RoutingHints) -> Self {
        self.hints = hints;
        self
    }

    /// Prefer backends with enough free quota for the whole request.
    #[must_use]
    pub fn prefer_free_tier(mut self) -> Self {
        self.hints.prefer_free_tier = true;
        self
    }

    /// Supply a caller-observed quality score in `[0, 1]`.
    #[must_use]
    pub const fn quality_hint(mut self, quality: f64) -> Self {
        self.quality_hint = Some(quality);
        self
    }

    /// Total units the request may consume end to end.
    #[must_use]
    pub const fn estimated_total_units(&self) -> u64 {
        self.estimated_input_units + self.max_output_units
    }

    /// Check structural validity.
    ///
    /// # Errors
    /// Returns `Malformed` when the priority exceeds [`MAX_PRIORITY`], the
    /// quality hint leaves `[0, 1]`, or the request carries zero units.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.priority > MAX_PRIORITY {
            return Err(GatewayError::malformed(format!(
                "priority {} exceeds maximum {MAX_PRIORITY}",
                self.priority
            )));
        }
        if let Some(q) = self.quality_hint
            && !(0.0..=1.0).contains(&q)
        {
            return Err(GatewayError::malformed(format!(
                "quality hint {q} outside [0, 1]"
            )));
        }
        if self.estimated_total_units() == 0 {
            return Err(GatewayError::malformed(
                "request must carry at least one unit",
            ));
        }
        Ok(())
    }
}

/// Token accounting reported by a dispatcher for one completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input units actually consumed.
    pub input_units: u64,
    /// Output units actually produced.
    pub output_units: u64,
}

impl Usage {
    /// Combined input and output units.
    #[must_use]
    pub const fn total(self) -> u64 {
        self.input_units + self.output_units
    }
}

/// Successful dispatcher response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Generated content.
    pub content: String,
    /// Actual unit accounting for billing and quota reconciliation.
    pub usage: Usage,
    /// Identifier of the concrete model that served the request.
    pub model: String,
}
