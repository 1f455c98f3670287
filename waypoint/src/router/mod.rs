//! Backend selection: eligibility filtering, fuzzy + learned scoring, and
//! ε-greedy exploration.

pub mod fuzzy;
pub mod qlearn;

use std::cmp::Ordering;
use std::time::Duration;

use rand::Rng;

use waypoint_types::{
    BackendId, CircuitState, GatewayError, GenerationRequest, MetricsRecord, RouteFactor,
    RoutingDecision,
};

use crate::core::Gateway;
use crate::router::fuzzy::FuzzyInputs;
use crate::state::BackendState;

/// Reference per-unit cost mapping paid pricing onto the `[0, 1]`
/// cost-efficiency scale; a backend at this price scores 0.5.
const REFERENCE_COST_PER_UNIT: f64 = 1e-5;

/// Floor applied to the `(1 + Q)` multiplier so strongly negative Q-values
/// dampen a backend without erasing its ordering.
const Q_MULTIPLIER_FLOOR: f64 = 0.01;

struct Candidate {
    state: std::sync::Arc<BackendState>,
    metrics: MetricsRecord,
    free_eligible: bool,
    q: f64,
    score: f64,
}

fn cost_efficiency(candidate: &Candidate, request: &GenerationRequest) -> f64 {
    if candidate.free_eligible {
        return 1.0;
    }
    let per_unit = candidate
        .state
        .spec
        .pricing
        .blended_cost_per_unit(request.estimated_input_units, request.max_output_units);
    REFERENCE_COST_PER_UNIT / (REFERENCE_COST_PER_UNIT + per_unit)
}

fn estimated_cost(candidate: &Candidate, request: &GenerationRequest) -> f64 {
    if candidate.free_eligible {
        return 0.0;
    }
    candidate
        .state
        .spec
        .pricing
        .cost_of(request.estimated_input_units, request.max_output_units)
}

/// Factors supporting the choice of `candidate`, strongest first. The
/// detection order matches the rationale vocabulary: free quota, then
/// reliability, then latency headroom, then capability specialty.
fn decision_factors(candidate: &Candidate, request: &GenerationRequest) -> Vec<RouteFactor> {
    let mut factors = Vec::new();
    if candidate.free_eligible {
        factors.push(RouteFactor::FreeQuotaAvailable);
    }
    if candidate.metrics.ema_success_rate >= 0.9 {
        factors.push(RouteFactor::HighReliability);
    }
    if candidate.metrics.ema_response_ms > 0.0 && candidate.metrics.ema_response_ms <= 1_500.0 {
        factors.push(RouteFactor::LowLatency);
    }
    if !request.required.is_empty() {
        factors.push(RouteFactor::CapabilitySpecialty);
    }
    if candidate.q >= 0.25 {
        factors.push(RouteFactor::LearnedPreference);
    }
    factors
}

fn rationale_from(factors: &[RouteFactor]) -> String {
    match factors {
        [] => "balanced scores".to_string(),
        [only] => only.as_str().to_string(),
        [first, second, ..] => format!("{first}; {second}"),
    }
}

impl Gateway {
    /// Produce a routing decision for `request` without dispatching.
    ///
    /// Deterministic given a fixed seed, a fixed request, and a fixed
    /// snapshot of metrics/Q/circuit/quota state: Q-entry initialization is
    /// derived from the seed without touching the RNG stream, so the only
    /// RNG consumers are the exploration draws, in candidate-evaluation
    /// order.
    ///
    /// # Errors
    /// - `NoEligibleBackends` when the filter leaves nothing and no default
    ///   backend is configured.
    /// - `QuotaExhausted` when free-tier exhaustion alone emptied the set.
    /// - `Malformed` when the request fails validation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            target = "waypoint::router",
            skip(self, request),
            fields(category = %request.category, axis = %request.axis),
        )
    )]
    pub fn route(&self, request: &GenerationRequest) -> Result<RoutingDecision, GatewayError> {
        request.validate()?;
        let shared = self.shared();
        let cfg = shared.config.read().expect("lock poisoned").clone();
        let total_units = request.estimated_total_units();

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut exclusions: Vec<String> = Vec::new();
        let mut quota_blocked = 0_usize;
        let mut other_blocked = 0_usize;
        let mut quota_example: Option<(BackendId, Duration)> = None;

        for state in shared.snapshot_backends() {
            let id = state.spec.id.clone();
            if request.hints.excluded.contains(&id) {
                exclusions.push(format!("{id}: excluded by hint"));
                other_blocked += 1;
                continue;
            }
            if state.circuit.state() == CircuitState::Open {
                exclusions.push(format!("{id}: circuit open"));
                other_blocked += 1;
                continue;
            }
            if !state.spec.capabilities.satisfies(request.required) {
                exclusions.push(format!("{id}: missing required capability"));
                other_blocked += 1;
                continue;
            }
            if state.spec.context_window_units < total_units {
                exclusions.push(format!("{id}: context window too small"));
                other_blocked += 1;
                continue;
            }

            let free_eligible = state.spec.has_free_tier() && state.ledger.has_room(total_units);
            if request.hints.prefer_free_tier
                && !free_eligible
                && !request.hints.preferred.contains(&id)
            {
                if state.spec.has_free_tier() {
                    quota_blocked += 1;
                    if quota_example.is_none() {
                        quota_example = Some((id.clone(), state.ledger.reset_in()));
                    }
                    exclusions.push(format!("{id}: free quota insufficient"));
                } else {
                    other_blocked += 1;
                    exclusions.push(format!("{id}: no free tier"));
                }
                continue;
            }

            let metrics = state.metrics.lock().expect("mutex poisoned").clone();
            candidates.push(Candidate {
                state,
                metrics,
                free_eligible,
                q: 0.0,
                score: 0.0,
            });
        }

        if !request.hints.preferred.is_empty() {
            let (preferred, rest): (Vec<Candidate>, Vec<Candidate>) = candidates
                .into_iter()
                .partition(|c| request.hints.preferred.contains(&c.state.spec.id));
            candidates = if preferred.is_empty() { rest } else { preferred };
        }

        if candidates.is_empty() {
            if let Some(default) = cfg.default_backend.as_ref()
                && let Some(state) = shared.find(default)
            {
                let metrics = state.metrics.lock().expect("mutex poisoned").clone();
                let fallback = Candidate {
                    state,
                    metrics,
                    free_eligible: false,
                    q: 0.0,
                    score: 0.0,
                };
                return Ok(RoutingDecision {
                    primary: default.clone(),
                    fallbacks: Vec::new(),
                    estimated_cost: estimated_cost(&fallback, request),
                    estimated_latency_ms: fallback.metrics.ema_response_ms,
                    confidence: 0.1,
                    factors: vec![RouteFactor::DefaultFallback],
                    rationale: RouteFactor::DefaultFallback.as_str().to_string(),
                    explored: false,
                });
            }
            if other_blocked == 0
                && quota_blocked > 0
                && let Some((backend, reset_in)) = quota_example
            {
                return Err(GatewayError::QuotaExhausted {
                    backend,
                    next_reset_in_ms: u64::try_from(reset_in.as_millis()).unwrap_or(u64::MAX),
                });
            }
            let reason = if exclusions.is_empty() {
                "no backends registered".to_string()
            } else {
                exclusions.join("; ")
            };
            return Err(GatewayError::no_eligible(reason));
        }

        for candidate in &mut candidates {
            candidate.q = shared
                .qtable
                .value(&candidate.state.spec.id, request.category);
            let inputs = FuzzyInputs {
                response_time_ms: candidate.metrics.ema_response_ms,
                cost_efficiency: cost_efficiency(candidate, request),
                quality: candidate.metrics.ema_quality,
                load: candidate.state.load(),
            };
            let preference = fuzzy::score(&inputs, request.axis);
            candidate.score = preference * (1.0 + candidate.q).max(Q_MULTIPLIER_FLOOR);
        }

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            candidates[b]
                .score
                .partial_cmp(&candidates[a].score)
                .unwrap_or(Ordering::Equal)
        });

        let (explored, primary_idx) = {
            let mut rng = shared.rng.lock().expect("mutex poisoned");
            let draw: f64 = rng.random();
            if draw < cfg.learning.exploration_rate {
                (true, rng.random_range(0..candidates.len()))
            } else {
                (false, order[0])
            }
        };

        let fallbacks: Vec<BackendId> = order
            .iter()
            .filter(|&&i| i != primary_idx)
            .take(2)
            .map(|&i| candidates[i].state.spec.id.clone())
            .collect();

        let primary_score = candidates[primary_idx].score;
        let confidence = if candidates.len() == 1 {
            0.95
        } else {
            let runner_up = order
                .iter()
                .find(|&&i| i != primary_idx)
                .map_or(0.0, |&i| candidates[i].score);
            let gap = if primary_score > 0.0 {
                (primary_score - runner_up) / primary_score
            } else {
                0.0
            };
            gap.clamp(0.1, 0.95)
        };

        let primary = &candidates[primary_idx];
        let factors = decision_factors(primary, request);
        let rationale = rationale_from(&factors);

        Ok(RoutingDecision {
            primary: primary.state.spec.id.clone(),
            fallbacks,
            estimated_cost: estimated_cost(primary, request),
            estimated_latency_ms: primary.metrics.ema_response_ms,
            confidence,
            factors,
            rationale,
            explored,
        })
    }
}
