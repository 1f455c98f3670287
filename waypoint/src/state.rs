//! Shared gateway state: per-backend runtime records and the learning
//! tables the router reads.

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, RwLock};

use rand::rngs::StdRng;

use waypoint_core::Dispatcher;
use waypoint_middleware::{CircuitBreaker, FreeQuotaLedger, RateLimiter};
use waypoint_types::{BackendId, BackendSpec, GatewayConfig, MetricsRecord};

use crate::router::qlearn::QTable;

/// Everything the gateway tracks for one registered backend.
///
/// Guards and metrics are per-backend so independent backends never
/// serialize on each other; the registry vector itself is only locked to
/// look up or mutate membership.
pub(crate) struct BackendState {
    pub(crate) spec: BackendSpec,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    pub(crate) metrics: Mutex<MetricsRecord>,
    pub(crate) limiter: RateLimiter,
    pub(crate) ledger: FreeQuotaLedger,
    pub(crate) circuit: CircuitBreaker,
    pub(crate) inflight: AtomicU64,
}

impl BackendState {
    pub(crate) fn new(
        spec: BackendSpec,
        dispatcher: Arc<dyn Dispatcher>,
        config: &GatewayConfig,
    ) -> Self {
        let per_minute = spec
            .requests_per_minute
            .unwrap_or(config.rate_limits.per_minute_default);
        let per_day = spec
            .requests_per_day
            .unwrap_or(config.rate_limits.per_day_default);
        let ledger =
            FreeQuotaLedger::new(spec.pricing.free_units_per_window, spec.pricing.free_window);
        Self {
            dispatcher,
            metrics: Mutex::new(MetricsRecord::default()),
            limiter: RateLimiter::new(per_minute, per_day),
            ledger,
            circuit: CircuitBreaker::new(config.circuit),
            inflight: AtomicU64::new(0),
            spec,
        }
    }

    /// Utilization proxy for the fuzzy `load` variable.
    pub(crate) fn load(&self) -> f64 {
        let capacity = self.limiter.minute_capacity().max(1);
        #[allow(clippy::cast_precision_loss)]
        let load = self.inflight.load(std::sync::atomic::Ordering::Relaxed) as f64 / capacity as f64;
        load.clamp(0.0, 1.0)
    }
}

/// State shared between the gateway facade, the router, and the bus-fed
/// learning loop.
pub(crate) struct SharedState {
    pub(crate) backends: RwLock<Vec<Arc<BackendState>>>,
    pub(crate) config: RwLock<GatewayConfig>,
    pub(crate) qtable: QTable,
    pub(crate) rng: Mutex<StdRng>,
}

impl SharedState {
    pub(crate) fn find(&self, id: &BackendId) -> Option<Arc<BackendState>> {
        self.backends
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|b| &b.spec.id == id)
            .cloned()
    }

    pub(crate) fn snapshot_backends(&self) -> Vec<Arc<BackendState>> {
        self.backends.read().expect("lock poisoned").clone()
    }
}

/// Wall-clock unix millis used for telemetry and snapshot timestamps.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
