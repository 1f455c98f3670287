//! Telemetry event schema published on the gateway's event bus.

use serde::{Deserialize, Serialize};

use crate::backend::BackendId;
use crate::category::TaskCategory;
use crate::error::ErrorKind;
use crate::middleware::{CircuitState, RateWindow};

/// A structured event on the telemetry bus.
///
/// Events are immutable once published; subscribers must treat them as
/// read-only. Exactly one `DispatchCompleted` is published per attempted
/// backend, in attempt order — this is the feed the learning loop consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum TelemetryEvent {
    /// A dispatch attempt is about to start.
    DispatchStarted {
        /// Backend being attempted.
        backend: BackendId,
        /// Request shape.
        category: TaskCategory,
        /// Wall-clock unix millis.
        timestamp_ms: i64,
        /// Gateway-assigned request identifier.
        request_id: u64,
        /// Caller priority.
        priority: u8,
    },

    /// A dispatch attempt finished (terminal outcome for that backend).
    DispatchCompleted {
        /// Backend that was attempted.
        backend: BackendId,
        /// Request shape.
        category: TaskCategory,
        /// Wall-clock unix millis.
        timestamp_ms: i64,
        /// Gateway-assigned request identifier.
        request_id: u64,
        /// Whether the attempt succeeded.
        success: bool,
        /// Input units actually consumed (0 on failure).
        input_units: u64,
        /// Output units actually produced (0 on failure).
        output_units: u64,
        /// Incurred cost after free-quota reconciliation.
        cost: f64,
        /// Attempt duration, milliseconds.
        response_time_ms: u64,
        /// True when free quota fully absorbed the request.
        used_free_quota: bool,
        /// Failure classification; `None` on success.
        error_kind: Option<ErrorKind>,
        /// Caller-observed quality, when the request carried a hint.
        quality_hint: Option<f64>,
    },

    /// The engine advanced from a failed backend to the next fallback.
    FallbackTaken {
        /// Backend the engine is advancing to.
        backend: BackendId,
        /// Request shape.
        category: TaskCategory,
        /// Wall-clock unix millis.
        timestamp_ms: i64,
        /// Gateway-assigned request identifier.
        request_id: u64,
        /// Backend that failed.
        from_backend: BackendId,
        /// Why the previous attempt failed.
        error_kind: ErrorKind,
    },

    /// A circuit breaker changed state.
    CircuitTripped {
        /// Backend whose circuit transitioned.
        backend: BackendId,
        /// Wall-clock unix millis.
        timestamp_ms: i64,
        /// State before the transition.
        from_state: CircuitState,
        /// State after the transition.
        to_state: CircuitState,
        /// Short reason label (e.g. "failure threshold reached").
        reason: String,
    },

    /// A quota or rate window refused a request.
    QuotaExhausted {
        /// Backend whose window is exhausted.
        backend: BackendId,
        /// Wall-clock unix millis.
        timestamp_ms: i64,
        /// Which window refused.
        window: RateWindow,
        /// Wall-clock unix millis of the next reset.
        next_reset_ms: i64,
    },

    /// A snapshot was exported.
    SnapshotTaken {
        /// Wall-clock unix millis.
        timestamp_ms: i64,
        /// Snapshot schema version.
        schema_version: u32,
        /// Encoded blob size.
        size_bytes: u64,
    },
}

impl TelemetryEvent {
    /// Backend the event concerns, when it names one.
    #[must_use]
    pub const fn backend(&self) -> Option<&BackendId> {
        match self {
            Self::DispatchStarted { backend, .. }
            | Self::DispatchCompleted { backend, .. }
            | Self::FallbackTaken { backend, .. }
            | Self::CircuitTripped { backend, .. }
            | Self::QuotaExhausted { backend, .. } => Some(backend),
            Self::SnapshotTaken { .. } => None,
        }
    }

    /// Wall-clock unix millis the event was published at.
    #[must_use]
    pub const fn timestamp_ms(&self) -> i64 {
        match self {
            Self::DispatchStarted { timestamp_ms, .. }
            | Self::DispatchCompleted { timestamp_ms, .. }
            | Self::FallbackTaken { timestamp_ms, .. }
            | Self::CircuitTripped { timestamp_ms, .. }
            | Self::QuotaExhausted { timestamp_ms, .. }
            | Self::SnapshotTaken { timestamp_ms, .. } => *timestamp_ms,
        }
    }
}
