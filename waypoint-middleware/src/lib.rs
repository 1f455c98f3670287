//! Per-backend dispatch guards for the waypoint gateway.
//!
//! Each guard is a small non-blocking state machine the execution engine
//! consults before invoking a dispatcher: the [`RateLimiter`] enforces
//! fixed-window request caps, the [`FreeQuotaLedger`] accounts free-tier
//! units with reserve/reconcile semantics, and the [`CircuitBreaker`] gates
//! failing backends. All three keep time on the tokio clock so tests can
//! drive window expiry deterministically.
#![warn(missing_docs)]

/// Circuit breaker with cold-start hysteresis.
pub mod circuit;
/// Free-quota accounting.
pub mod ledger;
/// Fixed-window request-rate buckets.
pub mod limiter;

pub use circuit::{CircuitBreaker, CircuitPass, CircuitRefusal, CircuitTransition};
pub use ledger::{FreeQuotaLedger, Reconciliation};
pub use limiter::{RateLimiter, RateRefusal};
