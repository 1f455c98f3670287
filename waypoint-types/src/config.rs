//! Configuration types shared across the gateway and its guards.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::BackendId;
use crate::error::GatewayError;

/// Learning-loop parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Q-update smoothing factor α.
    pub learning_rate: f64,
    /// ε-greedy exploration probability. Fixed (no decay) so drifting
    /// backends keep being probed.
    pub exploration_rate: f64,
    /// Metrics EMA smoothing factor.
    pub ema_smoothing: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            exploration_rate: 0.1,
            ema_smoothing: 0.1,
        }
    }
}

/// Circuit-breaker thresholds and holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive failures that trip a closed circuit.
    pub failure_threshold: u32,
    /// Lower trip threshold applied when cold-start failures dominate.
    pub cold_start_threshold: u32,
    /// Consecutive cold starts beyond which the extended hold applies.
    pub extended_after_cold_starts: u32,
    /// Base open hold.
    pub open_hold: Duration,
    /// Extended open hold for cold-start-heavy backends and failed probes.
    pub open_hold_extended: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 8,
            cold_start_threshold: 3,
            extended_after_cold_starts: 5,
            open_hold: Duration::from_secs(30),
            open_hold_extended: Duration::from_secs(60),
        }
    }
}

/// Default per-backend rate caps used when a declaration omits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per minute.
    pub per_minute_default: u64,
    /// Requests per day.
    pub per_day_default: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute_default: 60,
            per_day_default: 10_000,
        }
    }
}

/// Global configuration for the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Learning-loop parameters.
    pub learning: LearningConfig,
    /// Circuit-breaker thresholds and holds.
    pub circuit: CircuitConfig,
    /// Default rate caps for declarations that omit them.
    pub rate_limits: RateLimitConfig,
    /// Bounded capacity of each external telemetry receiver.
    pub telemetry_buffer: usize,
    /// Interval between automatic snapshots.
    pub snapshot_interval: Duration,
    /// Per-dispatch deadline applied when the request carries none (or a
    /// longer one).
    pub dispatch_timeout: Duration,
    /// Backend returned as a last-resort decision when the eligible set is
    /// empty. Must name a registered backend.
    pub default_backend: Option<BackendId>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            learning: LearningConfig::default(),
            circuit: CircuitConfig::default(),
            rate_limits: RateLimitConfig::default(),
            telemetry_buffer: 1024,
            snapshot_interval: Duration::from_secs(300),
            dispatch_timeout: Duration::from_secs(60),
            default_backend: None,
        }
    }
}

/// Recognized runtime-tunable configuration keys.
///
/// Values are numeric across the board; durations are expressed in seconds
/// and counts are truncated from the supplied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigKey {
    /// Q-update smoothing α.
    LearningRate,
    /// ε-greedy probability.
    ExplorationRate,
    /// Metrics EMA factor.
    EmaSmoothing,
    /// Consecutive failures to open a circuit.
    CircuitThreshold,
    /// Lower threshold when cold starts dominate.
    ColdStartThreshold,
    /// Base open hold, seconds.
    CircuitOpenSeconds,
    /// Extended open hold, seconds.
    CircuitOpenExtendedSeconds,
    /// Default per-minute bucket capacity.
    RatePerMinuteDefault,
    /// Default per-day bucket capacity.
    RatePerDayDefault,
    /// Telemetry receiver capacity.
    TelemetryBuffer,
    /// Snapshot timer interval, seconds.
    SnapshotIntervalSeconds,
}

impl ConfigKey {
    /// Stable key string accepted by `reconfigure`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LearningRate => "learning_rate",
            Self::ExplorationRate => "exploration_rate",
            Self::EmaSmoothing => "ema_smoothing",
            Self::CircuitThreshold => "circuit_threshold",
            Self::ColdStartThreshold => "cold_start_threshold",
            Self::CircuitOpenSeconds => "circuit_open_seconds",
            Self::CircuitOpenExtendedSeconds => "circuit_open_extended_seconds",
            Self::RatePerMinuteDefault => "rate_per_minute_default",
            Self::RatePerDayDefault => "rate_per_day_default",
            Self::TelemetryBuffer => "telemetry_buffer",
            Self::SnapshotIntervalSeconds => "snapshot_interval_seconds",
        }
    }
}

impl FromStr for ConfigKey {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learning_rate" => Ok(Self::LearningRate),
            "exploration_rate" => Ok(Self::ExplorationRate),
            "ema_smoothing" => Ok(Self::EmaSmoothing),
            "circuit_threshold" => Ok(Self::CircuitThreshold),
            "cold_start_threshold" => Ok(Self::ColdStartThreshold),
            "circuit_open_seconds" => Ok(Self::CircuitOpenSeconds),
            "circuit_open_extended_seconds" => Ok(Self::CircuitOpenExtendedSeconds),
            "rate_per_minute_default" => Ok(Self::RatePerMinuteDefault),
            "rate_per_day_default" => Ok(Self::RatePerDayDefault),
            "telemetry_buffer" => Ok(Self::TelemetryBuffer),
            "snapshot_interval_seconds" => Ok(Self::SnapshotIntervalSeconds),
            other => Err(GatewayError::InvalidConfig(format!(
                "unknown configuration key: {other}"
            ))),
        }
    }
}

impl GatewayConfig {
    /// Apply one tunable key.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the value is out of range for the key
    /// (rates and smoothing factors must lie in `(0, 1]`, counts and
    /// durations must be positive).
    pub fn apply(&mut self, key: ConfigKey, value: f64) -> Result<(), GatewayError> {
        let fraction = |v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(v)
            } else {
                Err(GatewayError::InvalidConfig(format!(
                    "{} must lie in (0, 1], got {v}",
                    key.as_str()
                )))
            }
        };
        let count = |v: f64| {
            if v >= 1.0 && v.is_finite() {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Ok(v as u64)
            } else {
                Err(GatewayError::InvalidConfig(format!(
                    "{} must be a positive count, got {v}",
                    key.as_str()
                )))
            }
        };

        match key {
            ConfigKey::LearningRate => self.learning.learning_rate = fraction(value)?,
            ConfigKey::ExplorationRate => self.learning.exploration_rate = fraction(value)?,
            ConfigKey::EmaSmoothing => self.learning.ema_smoothing = fraction(value)?,
            ConfigKey::CircuitThreshold => {
                self.circuit.failure_threshold = u32::try_from(count(value)?)
                    .map_err(|_| GatewayError::InvalidConfig("circuit_threshold too large".into()))?;
            }
            ConfigKey::ColdStartThreshold => {
                self.circuit.cold_start_threshold = u32::try_from(count(value)?).map_err(|_| {
                    GatewayError::InvalidConfig("cold_start_threshold too large".into())
                })?;
            }
            ConfigKey::CircuitOpenSeconds => {
                self.circuit.open_hold = Duration::from_secs(count(value)?);
            }
            ConfigKey::CircuitOpenExtendedSeconds => {
                self.circuit.open_hold_extended = Duration::from_secs(count(value)?);
            }
            ConfigKey::RatePerMinuteDefault => {
                self.rate_limits.per_minute_default = count(value)?;
            }
            ConfigKey::RatePerDayDefault => {
                self.rate_limits.per_day_default = count(value)?;
            }
            ConfigKey::TelemetryBuffer => {
                self.telemetry_buffer = usize::try_from(count(value)?)
                    .map_err(|_| GatewayError::InvalidConfig("telemetry_buffer too large".into()))?;
            }
            ConfigKey::SnapshotIntervalSeconds => {
                self.snapshot_interval = Duration::from_secs(count(value)?);
            }
        }
        Ok(())
    }
}
