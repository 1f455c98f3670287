//! Per-backend circuit breaker with cold-start hysteresis.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use waypoint_types::{CircuitConfig, CircuitSnapshot, CircuitState};

/// A state change the caller should surface as a `CircuitTripped` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitTransition {
    /// State before the transition.
    pub from: CircuitState,
    /// State after the transition.
    pub to: CircuitState,
    /// Short reason label.
    pub reason: &'static str,
}

/// A refusal while the circuit is open or the half-open probe is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitRefusal {
    /// Time until the open hold elapses; zero when refused for a taken probe.
    pub retry_in: Duration,
}

/// A granted acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitPass {
    /// Transition performed while admitting (open hold elapsed), to be
    /// published as a `CircuitTripped` event.
    pub transition: Option<CircuitTransition>,
    /// True when this acquisition claimed the single half-open probe slot;
    /// release it if the dispatch is never sent.
    pub probe: bool,
}

struct BreakerRuntime {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_cold_starts: u32,
    open_until: Option<Instant>,
    probe_taken: bool,
}

/// Three-state breaker guarding one backend.
///
/// Closed circuits count consecutive failures and trip at the configured
/// threshold (a lower one when cold-start failures dominate). Open circuits
/// refuse everything until the hold elapses, then admit exactly one probe;
/// the probe's outcome either closes the circuit or re-opens it with the
/// extended hold.
pub struct CircuitBreaker {
    runtime: Mutex<BreakerRuntime>,
    config: Mutex<CircuitConfig>,
}

impl CircuitBreaker {
    /// Create a closed breaker with the given thresholds.
    #[must_use]
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            runtime: Mutex::new(BreakerRuntime {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_cold_starts: 0,
                open_until: None,
                probe_taken: false,
            }),
            config: Mutex::new(config),
        }
    }

    /// Replace the thresholds; applies from the next evaluation.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn set_config(&self, config: CircuitConfig) {
        *self.config.lock().expect("mutex poisoned") = config;
    }

    /// Current state as the router should see it: an open circuit whose
    /// hold has elapsed reads as half-open. Pure view, no transition.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let rt = self.runtime.lock().expect("mutex poisoned");
        match rt.state {
            CircuitState::Open => match rt.open_until {
                Some(until) if Instant::now() >= until => CircuitState::HalfOpen,
                _ => CircuitState::Open,
            },
            other => other,
        }
    }

    /// Claim the right to dispatch.
    ///
    /// Closed: always admitted. Open with an elapsed hold: transitions to
    /// half-open and claims the single probe slot; the returned transition
    /// should be published. Open otherwise, or half-open with the probe
    /// already taken: refused.
    ///
    /// # Errors
    /// Returns a [`CircuitRefusal`] carrying the remaining hold.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn try_acquire(&self) -> Result<CircuitPass, CircuitRefusal> {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        let now = Instant::now();
        match rt.state {
            CircuitState::Closed => Ok(CircuitPass {
                transition: None,
                probe: false,
            }),
            CircuitState::Open => {
                if let Some(until) = rt.open_until
                    && now >= until
                {
                    rt.state = CircuitState::HalfOpen;
                    rt.open_until = None;
                    rt.probe_taken = true;
                    return Ok(CircuitPass {
                        transition: Some(CircuitTransition {
                            from: CircuitState::Open,
                            to: CircuitState::HalfOpen,
                            reason: "open hold elapsed; admitting probe",
                        }),
                        probe: true,
                    });
                }
                let retry_in = rt
                    .open_until
                    .map_or(Duration::ZERO, |u| u.saturating_duration_since(now));
                Err(CircuitRefusal { retry_in })
            }
            CircuitState::HalfOpen => {
                if rt.probe_taken {
                    Err(CircuitRefusal {
                        retry_in: Duration::ZERO,
                    })
                } else {
                    rt.probe_taken = true;
                    Ok(CircuitPass {
                        transition: None,
                        probe: true,
                    })
                }
            }
        }
    }

    /// Return an unused probe slot (acquisition succeeded but the dispatch
    /// was never sent, e.g. a rate bucket refused).
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn release_probe(&self) {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        if rt.state == CircuitState::HalfOpen {
            rt.probe_taken = false;
        }
    }

    /// Record a successful dispatch.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn record_success(&self) -> Option<CircuitTransition> {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        rt.consecutive_failures = 0;
        rt.consecutive_cold_starts = 0;
        match rt.state {
            CircuitState::HalfOpen => {
                rt.state = CircuitState::Closed;
                rt.probe_taken = false;
                Some(CircuitTransition {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Closed,
                    reason: "probe succeeded",
                })
            }
            _ => None,
        }
    }

    /// Record a failed dispatch. `cold_start` marks timeout/unavailable
    /// shapes that suggest model spin-up rather than a hard fault.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn record_failure(&self, cold_start: bool) -> Option<CircuitTransition> {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        let cfg = *self.config.lock().expect("mutex poisoned");

        rt.consecutive_failures = rt.consecutive_failures.saturating_add(1);
        if cold_start {
            rt.consecutive_cold_starts = rt.consecutive_cold_starts.saturating_add(1);
        } else {
            rt.consecutive_cold_starts = 0;
        }

        match rt.state {
            CircuitState::HalfOpen => {
                // Failed probe: re-open with the extended hold.
                rt.state = CircuitState::Open;
                rt.probe_taken = false;
                rt.open_until = Some(Instant::now() + cfg.open_hold_extended);
                Some(CircuitTransition {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Open,
                    reason: "probe failed",
                })
            }
            CircuitState::Closed => {
                let threshold = if rt.consecutive_cold_starts >= cfg.cold_start_threshold {
                    cfg.cold_start_threshold
                } else {
                    cfg.failure_threshold
                };
                if rt.consecutive_failures >= threshold {
                    let hold = if rt.consecutive_cold_starts > cfg.extended_after_cold_starts {
                        cfg.open_hold_extended
                    } else {
                        cfg.open_hold
                    };
                    rt.state = CircuitState::Open;
                    rt.open_until = Some(Instant::now() + hold);
                    Some(CircuitTransition {
                        from: CircuitState::Closed,
                        to: CircuitState::Open,
                        reason: "failure threshold reached",
                    })
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    /// Point-in-time view for introspection.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        let rt = self.runtime.lock().expect("mutex poisoned");
        let now = Instant::now();
        CircuitSnapshot {
            state: rt.state,
            consecutive_failures: rt.consecutive_failures,
            consecutive_cold_starts: rt.consecutive_cold_starts,
            open_remaining: rt
                .open_until
                .map(|u| u.saturating_duration_since(now))
                .filter(|d| !d.is_zero()),
        }
    }
}
