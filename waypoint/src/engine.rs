//! Fallback execution: walk the decision's backend chain sequentially,
//! bounding each dispatch with a deadline and feeding every outcome back
//! through the telemetry bus.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use waypoint_middleware::CircuitTransition;
use waypoint_types::{
    AttemptRecord, DispatchReport, DispatchResult, ErrorKind, GatewayError, GenerationRequest,
    RoutingDecision, TelemetryEvent,
};

use crate::core::Gateway;
use crate::state::{BackendState, now_ms};

impl Gateway {
    /// Route and execute one request.
    ///
    /// The primary backend is attempted first, then the ranked fallbacks,
    /// strictly sequentially (parallel dispatch would double-bill). Each
    /// attempt publishes exactly one terminal `DispatchCompleted` event;
    /// retryable failures advance the chain, terminal failures surface
    /// immediately.
    ///
    /// # Errors
    /// - Routing errors per [`route`](Gateway::route).
    /// - The terminal error of a non-retryable attempt.
    /// - `AllProvidersFailed` when every attempt failed retryably.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            target = "waypoint::engine",
            skip(self, request),
            fields(category = %request.category, priority = request.priority),
        )
    )]
    pub async fn submit(
        &self,
        request: GenerationRequest,
    ) -> Result<(DispatchResult, DispatchReport), GatewayError> {
        let decision = self.route(&request)?;
        self.execute(request, decision).await
    }

    /// Execute a pre-computed decision. Split from [`submit`](Gateway::submit)
    /// so callers can inspect or override routing.
    ///
    /// # Errors
    /// See [`submit`](Gateway::submit).
    pub async fn execute(
        &self,
        request: GenerationRequest,
        decision: RoutingDecision,
    ) -> Result<(DispatchResult, DispatchReport), GatewayError> {
        let request_id = self.next_request_id();
        let overall_start = tokio::time::Instant::now();
        let dispatch_timeout = self
            .shared()
            .config
            .read()
            .expect("lock poisoned")
            .dispatch_timeout;

        let chain: Vec<_> = std::iter::once(decision.primary.clone())
            .chain(decision.fallbacks.iter().cloned())
            .collect();

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut failures: Vec<GatewayError> = Vec::new();

        let mut iter = chain.iter().peekable();
        while let Some(id) = iter.next() {
            // A backend may have been unregistered between routing and now.
            let Some(state) = self.shared().find(id) else {
                continue;
            };

            self.publish(TelemetryEvent::DispatchStarted {
                backend: id.clone(),
                category: request.category,
                timestamp_ms: now_ms(),
                request_id,
                priority: request.priority,
            });

            let pass = match state.circuit.try_acquire() {
                Ok(pass) => {
                    if let Some(t) = pass.transition {
                        self.publish_circuit_transition(&state, t);
                    }
                    pass
                }
                Err(refusal) => {
                    let err = GatewayError::unavailable(
                        id.clone(),
                        format!("circuit open; retry in {}ms", refusal.retry_in.as_millis()),
                    );
                    self.record_refusal(&request, request_id, &mut attempts, &err);
                    failures.push(err);
                    self.announce_fallback(
                        &request,
                        request_id,
                        id,
                        ErrorKind::ProviderUnavailable,
                        iter.peek(),
                    );
                    continue;
                }
            };

            // Free quota first: reserving before the buckets means a refused
            // bucket can hand the units straight back.
            let reserve_units = request.estimated_total_units();
            let reserved = if state.spec.has_free_tier() && state.ledger.try_reserve(reserve_units)
            {
                Some(reserve_units)
            } else {
                None
            };

            if let Err(refusal) = state.limiter.try_acquire() {
                if let Some(units) = reserved {
                    state.ledger.release(units);
                }
                if pass.probe {
                    state.circuit.release_probe();
                }
                self.publish(TelemetryEvent::QuotaExhausted {
                    backend: id.clone(),
                    timestamp_ms: now_ms(),
                    window: refusal.window,
                    next_reset_ms: now_ms()
                        + i64::try_from(refusal.retry_in.as_millis()).unwrap_or(i64::MAX),
                });
                let err = refusal.into_error(id);
                self.record_refusal(&request, request_id, &mut attempts, &err);
                failures.push(err);
                self.announce_fallback(&request, request_id, id, ErrorKind::RateLimited, iter.peek());
                continue;
            }

            let remaining = request
                .deadline
                .map(|d| d.saturating_sub(overall_start.elapsed()));
            let effective_deadline = match remaining {
                Some(r) => r.min(dispatch_timeout),
                None => dispatch_timeout,
            };

            state.inflight.fetch_add(1, Ordering::Relaxed);
            let attempt_start = tokio::time::Instant::now();
            let outcome =
                tokio::time::timeout(effective_deadline, state.dispatcher.dispatch(&request)).await;
            state.inflight.fetch_sub(1, Ordering::Relaxed);
            let elapsed = attempt_start.elapsed();
            let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

            let err = match outcome {
                Ok(Ok(result)) => {
                    let (cost, used_free) = match reserved {
                        Some(units) => {
                            let rec = state.ledger.reconcile(units, result.usage.total());
                            // Free units cover the input column first; the
                            // spill bills per column at the paid-path rates.
                            let covered_in = result.usage.input_units.min(rec.free_units);
                            let covered_out = result
                                .usage
                                .output_units
                                .min(rec.free_units - covered_in);
                            let paid_cost = state.spec.pricing.cost_of(
                                result.usage.input_units - covered_in,
                                result.usage.output_units - covered_out,
                            );
                            (paid_cost, rec.fully_free)
                        }
                        None => {
                            let paid = state
                                .spec
                                .pricing
                                .cost_of(result.usage.input_units, result.usage.output_units);
                            (paid, false)
                        }
                    };

                    if let Some(t) = state.circuit.record_success() {
                        self.publish_circuit_transition(&state, t);
                    }

                    attempts.push(AttemptRecord {
                        backend: id.clone(),
                        error_kind: None,
                        elapsed_ms,
                    });
                    self.publish(TelemetryEvent::DispatchCompleted {
                        backend: id.clone(),
                        category: request.category,
                        timestamp_ms: now_ms(),
                        request_id,
                        success: true,
                        input_units: result.usage.input_units,
                        output_units: result.usage.output_units,
                        cost,
                        response_time_ms: elapsed_ms,
                        used_free_quota: used_free,
                        error_kind: None,
                        quality_hint: request.quality_hint,
                    });

                    let report = DispatchReport {
                        decision,
                        attempts,
                        served_by: id.clone(),
                        response_time_ms: elapsed_ms,
                        used_free_quota: used_free,
                        cost,
                    };
                    return Ok((result, report));
                }
                Ok(Err(e)) => e,
                Err(_) => GatewayError::Timeout {
                    backend: id.clone(),
                },
            };

            if let Some(units) = reserved {
                state.ledger.release(units);
            }
            let kind = err.kind();
            if let Some(t) = state.circuit.record_failure(kind.is_cold_start()) {
                self.publish_circuit_transition(&state, t);
            }

            attempts.push(AttemptRecord {
                backend: id.clone(),
                error_kind: Some(kind),
                elapsed_ms,
            });
            self.publish(TelemetryEvent::DispatchCompleted {
                backend: id.clone(),
                category: request.category,
                timestamp_ms: now_ms(),
                request_id,
                success: false,
                input_units: 0,
                output_units: 0,
                cost: 0.0,
                response_time_ms: elapsed_ms,
                used_free_quota: false,
                error_kind: Some(kind),
                quality_hint: None,
            });

            if !kind.is_retryable() {
                return Err(err);
            }
            failures.push(err);

            // A spent caller deadline abandons the rest of the chain.
            if request
                .deadline
                .is_some_and(|d| overall_start.elapsed() >= d)
            {
                break;
            }
            self.announce_fallback(&request, request_id, id, kind, iter.peek());
        }

        if failures.is_empty() {
            Err(GatewayError::no_eligible(
                "decision named no dispatchable backend",
            ))
        } else {
            Err(GatewayError::AllProvidersFailed(failures))
        }
    }

    /// Record a local refusal (circuit or bucket) as a zero-length failed
    /// attempt with its terminal outcome event.
    fn record_refusal(
        &self,
        request: &GenerationRequest,
        request_id: u64,
        attempts: &mut Vec<AttemptRecord>,
        err: &GatewayError,
    ) {
        let kind = err.kind();
        let backend = err
            .backend()
            .cloned()
            .unwrap_or_else(|| waypoint_types::BackendId::new("unknown"));
        attempts.push(AttemptRecord {
            backend: backend.clone(),
            error_kind: Some(kind),
            elapsed_ms: 0,
        });
        self.publish(TelemetryEvent::DispatchCompleted {
            backend,
            category: request.category,
            timestamp_ms: now_ms(),
            request_id,
            success: false,
            input_units: 0,
            output_units: 0,
            cost: 0.0,
            response_time_ms: 0,
            used_free_quota: false,
            error_kind: Some(kind),
            quality_hint: None,
        });
    }

    fn announce_fallback(
        &self,
        request: &GenerationRequest,
        request_id: u64,
        from: &waypoint_types::BackendId,
        kind: ErrorKind,
        next: Option<&&waypoint_types::BackendId>,
    ) {
        if let Some(next) = next {
            self.publish(TelemetryEvent::FallbackTaken {
                backend: (**next).clone(),
                category: request.category,
                timestamp_ms: now_ms(),
                request_id,
                from_backend: from.clone(),
                error_kind: kind,
            });
        }
    }

    fn publish_circuit_transition(&self, state: &Arc<BackendState>, t: CircuitTransition) {
        self.publish(TelemetryEvent::CircuitTripped {
            backend: state.spec.id.clone(),
            timestamp_ms: now_ms(),
            from_state: t.from,
            to_state: t.to,
            reason: t.reason.to_string(),
        });
    }
}
