//! State snapshots exposed by the dispatch guards (rate limiter, free-quota
//! ledger, circuit breaker) for routing reads and introspection.

use core::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Circuit breaker health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CircuitState {
    /// Healthy; dispatches flow normally.
    #[default]
    Closed,
    /// Tripped; all dispatches are refused until the hold elapses.
    Open,
    /// Hold elapsed; exactly one probe dispatch is admitted.
    HalfOpen,
}

impl CircuitState {
    /// Stable identifier for logs and telemetry payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rate window refused or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateWindow {
    /// Per-minute bucket.
    Minute,
    /// Per-day bucket.
    Day,
    /// Backend-declared free-quota window.
    Declared,
}

impl RateWindow {
    /// Stable identifier for logs and telemetry payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Day => "day",
            Self::Declared => "declared",
        }
    }
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a free-quota ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Configured units per window.
    pub total: u64,
    /// Units still available in the current window.
    pub remaining: u64,
    /// Time remaining until the current window resets.
    pub reset_in: Duration,
}

/// Point-in-time view of a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    /// Current health state.
    pub state: CircuitState,
    /// Consecutive failures observed since the last success.
    pub consecutive_failures: u32,
    /// Consecutive cold-start-shaped failures since the last success.
    pub consecutive_cold_starts: u32,
    /// Remaining open hold, when the circuit is open.
    pub open_remaining: Option<Duration>,
}
