//! Bus-fed learning loop.
//!
//! The metrics store and Q-learner consume `DispatchCompleted` events off
//! the telemetry bus instead of being called by the engine; the router only
//! ever reads the state they maintain. Attach order matters: the Q-feed is
//! attached first so rewards are shaped against the response-time average
//! as it stood before the event is folded into the metrics record.

use std::sync::Arc;

use waypoint_core::Subscriber;
use waypoint_types::TelemetryEvent;

use crate::router::qlearn::shape_reward;
use crate::state::SharedState;

/// Applies outcomes to per-backend [`MetricsRecord`]s.
///
/// Updates for one backend are serialized by its metrics mutex, so EMAs are
/// applied in publication order; different backends update in parallel.
///
/// [`MetricsRecord`]: waypoint_types::MetricsRecord
pub(crate) struct MetricsFeed {
    pub(crate) shared: Arc<SharedState>,
}

impl Subscriber for MetricsFeed {
    fn on_event(&self, event: &TelemetryEvent) {
        let TelemetryEvent::DispatchCompleted {
            backend,
            timestamp_ms,
            success,
            input_units,
            output_units,
            cost,
            response_time_ms,
            quality_hint,
            ..
        } = event
        else {
            return;
        };
        let Some(state) = self.shared.find(backend) else {
            return;
        };
        let alpha = self
            .shared
            .config
            .read()
            .expect("lock poisoned")
            .learning
            .ema_smoothing;
        state.metrics.lock().expect("mutex poisoned").apply(
            *success,
            *response_time_ms,
            input_units + output_units,
            *cost,
            *quality_hint,
            alpha,
            *timestamp_ms,
        );
    }
}

/// Applies outcomes to the Q-table with the cost-aware shaped reward.
pub(crate) struct QFeed {
    pub(crate) shared: Arc<SharedState>,
}

impl Subscriber for QFeed {
    fn on_event(&self, event: &TelemetryEvent) {
        let TelemetryEvent::DispatchCompleted {
            backend,
            category,
            success,
            cost,
            response_time_ms,
            used_free_quota,
            ..
        } = event
        else {
            return;
        };
        let Some(state) = self.shared.find(backend) else {
            return;
        };
        let avg_ms = state
            .metrics
            .lock()
            .expect("mutex poisoned")
            .ema_response_ms;
        let alpha = self
            .shared
            .config
            .read()
            .expect("lock poisoned")
            .learning
            .learning_rate;
        let reward = shape_reward(*success, *response_time_ms, avg_ms, *used_free_quota, *cost);
        self.shared
            .qtable
            .update(backend, *category, reward, alpha);
    }
}
