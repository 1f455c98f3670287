//! Per-backend running statistics.

use serde::{Deserialize, Serialize};

/// Quality score assumed for a backend until a caller supplies observations.
pub const DEFAULT_QUALITY: f64 = 0.7;

/// Running statistics for one backend.
///
/// EMA fields use the gateway's configured smoothing factor; totals and
/// counters are exact. The record is value-copied for routing reads and
/// serialized whole into snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// EMA of successful response time, milliseconds. Zero until the first
    /// success seeds it.
    pub ema_response_ms: f64,
    /// EMA of the success indicator, `[0, 1]`.
    pub ema_success_rate: f64,
    /// EMA of caller-reported quality, `[0, 1]`; stays at
    /// [`DEFAULT_QUALITY`] when no hints arrive.
    pub ema_quality: f64,
    /// Cumulative units processed (input + output).
    pub total_units: u64,
    /// Cumulative incurred cost.
    pub total_cost: f64,
    /// Total dispatch attempts observed.
    pub requests: u64,
    /// Successful dispatches.
    pub successes: u64,
    /// Failed dispatches (including local refusals).
    pub failures: u64,
    /// Wall-clock unix millis of the most recent failure.
    pub last_failure_ms: Option<i64>,
    /// Wall-clock unix millis of the most recent update.
    pub updated_ms: i64,
}

impl Default for MetricsRecord {
    fn default() -> Self {
        Self {
            ema_response_ms: 0.0,
            ema_success_rate: 1.0,
            ema_quality: DEFAULT_QUALITY,
            total_units: 0,
            total_cost: 0.0,
            requests: 0,
            successes: 0,
            failures: 0,
            last_failure_ms: None,
            updated_ms: 0,
        }
    }
}

impl MetricsRecord {
    /// Fold one outcome into the record.
    ///
    /// The first observation seeds the EMAs directly so a fresh backend is
    /// not dragged toward the defaults; later observations smooth with
    /// `alpha`. Response time only moves on success (failures carry no
    /// meaningful latency signal). Quality only moves when the caller
    /// supplied a hint.
    pub fn apply(
        &mut self,
        success: bool,
        response_time_ms: u64,
        units: u64,
        cost: f64,
        quality_hint: Option<f64>,
        alpha: f64,
        now_ms: i64,
    ) {
        let first = self.requests == 0;
        self.requests += 1;

        let outcome = if success { 1.0 } else { 0.0 };
        self.ema_success_rate = if first {
            outcome
        } else {
            alpha.mul_add(outcome, (1.0 - alpha) * self.ema_success_rate)
        };

        if success {
            self.successes += 1;
            #[allow(clippy::cast_precision_loss)]
            let observed = response_time_ms as f64;
            self.ema_response_ms = if self.ema_response_ms == 0.0 {
                observed
            } else {
                alpha.mul_add(observed, (1.0 - alpha) * self.ema_response_ms)
            };
        } else {
            self.failures += 1;
            self.last_failure_ms = Some(now_ms);
        }

        if let Some(q) = quality_hint {
            self.ema_quality = alpha.mul_add(q, (1.0 - alpha) * self.ema_quality);
        }

        self.total_units += units;
        self.total_cost += cost;
        self.updated_ms = now_ms;
    }
}
