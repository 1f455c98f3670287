use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use waypoint_core::{Dispatcher, SnapshotStore, Subscriber, TelemetryBus, TelemetryReceiver};
use waypoint_types::{
    BackendId, BackendSpec, CircuitSnapshot, ConfigKey, GatewayConfig, GatewayError, MetricsRecord,
    QuotaSnapshot, TaskCategory, TelemetryEvent,
};

use crate::feedback::{MetricsFeed, QFeed};
use crate::router::qlearn::QTable;
use crate::snapshot::{self, ImportReport};
use crate::state::{BackendState, SharedState, now_ms};

struct GatewayInner {
    shared: Arc<SharedState>,
    bus: TelemetryBus,
    request_seq: AtomicU64,
    store: Option<Arc<dyn SnapshotStore>>,
    snapshot_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// The gateway: routes requests across registered backends, learns from
/// outcomes, and survives backend failures.
///
/// A single value created at startup and passed explicitly; tests construct
/// their own instances. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Gateway`] with custom configuration.
pub struct GatewayBuilder {
    backends: Vec<(BackendSpec, Arc<dyn Dispatcher>)>,
    cfg: GatewayConfig,
    seed: Option<u64>,
    store: Option<Arc<dyn SnapshotStore>>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    /// Create a new builder with the documented defaults.
    ///
    /// Behavior and trade-offs:
    /// - Starts with no backends; an empty gateway builds fine and refuses
    ///   submits with `NoEligibleBackends` until something is registered.
    /// - Routing randomness is seeded from the OS unless [`seed`](Self::seed)
    ///   pins it; pin it whenever reproducible decisions matter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            cfg: GatewayConfig::default(),
            seed: None,
            store: None,
        }
    }

    /// Register a backend: static declarations plus the dispatcher handle.
    ///
    /// Registration order is the deterministic tie-break order; registering
    /// the same id twice keeps the later declaration.
    #[must_use]
    pub fn with_backend(mut self, spec: BackendSpec, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.backends.retain(|(s, _)| s.id != spec.id);
        self.backends.push((spec, dispatcher));
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: GatewayConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Set the ε-greedy exploration probability.
    #[must_use]
    pub const fn exploration_rate(mut self, epsilon: f64) -> Self {
        self.cfg.learning.exploration_rate = epsilon;
        self
    }

    /// Set the Q-update smoothing factor α.
    #[must_use]
    pub const fn learning_rate(mut self, alpha: f64) -> Self {
        self.cfg.learning.learning_rate = alpha;
        self
    }

    /// Set the metrics EMA smoothing factor.
    #[must_use]
    pub const fn ema_smoothing(mut self, alpha: f64) -> Self {
        self.cfg.learning.ema_smoothing = alpha;
        self
    }

    /// Replace the circuit-breaker thresholds.
    #[must_use]
    pub const fn circuit(mut self, circuit: waypoint_types::CircuitConfig) -> Self {
        self.cfg.circuit = circuit;
        self
    }

    /// Replace the default rate caps applied to declarations without one.
    #[must_use]
    pub const fn rate_limits(mut self, limits: waypoint_types::RateLimitConfig) -> Self {
        self.cfg.rate_limits = limits;
        self
    }

    /// Set the per-dispatch deadline used when requests carry none.
    #[must_use]
    pub const fn dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.dispatch_timeout = timeout;
        self
    }

    /// Set the bounded capacity of external telemetry receivers.
    #[must_use]
    pub const fn telemetry_buffer(mut self, capacity: usize) -> Self {
        self.cfg.telemetry_buffer = capacity;
        self
    }

    /// Set the automatic snapshot interval.
    #[must_use]
    pub const fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.cfg.snapshot_interval = interval;
        self
    }

    /// Name the backend used as a last-resort decision when the eligible
    /// set is empty. Validated against registrations at build time.
    #[must_use]
    pub fn default_backend(mut self, id: impl Into<BackendId>) -> Self {
        self.cfg.default_backend = Some(id.into());
        self
    }

    /// Pin the RNG seed so routing decisions replay exactly.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Attach a snapshot store written by the timer and on shutdown.
    #[must_use]
    pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    /// `InvalidConfig` when `default_backend` names an unregistered backend.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        if let Some(default) = self.cfg.default_backend.as_ref()
            && !self.backends.iter().any(|(s, _)| &s.id == default)
        {
            return Err(GatewayError::InvalidConfig(format!(
                "default backend {default} is not registered"
            )));
        }

        let seed = self.seed.unwrap_or_else(|| StdRng::from_os_rng().random());
        let cfg = self.cfg;
        let states: Vec<Arc<BackendState>> = self
            .backends
            .into_iter()
            .map(|(spec, dispatcher)| Arc::new(BackendState::new(spec, dispatcher, &cfg)))
            .collect();
        let shared = Arc::new(SharedState {
            backends: RwLock::new(states),
            config: RwLock::new(cfg.clone()),
            qtable: QTable::new(seed),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        });

        let bus = TelemetryBus::new(cfg.telemetry_buffer);
        // Q before metrics: rewards are shaped against the pre-event
        // response-time average.
        bus.subscribe(Arc::new(QFeed {
            shared: Arc::clone(&shared),
        }));
        bus.subscribe(Arc::new(MetricsFeed {
            shared: Arc::clone(&shared),
        }));

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                shared,
                bus,
                request_seq: AtomicU64::new(0),
                store: self.store,
                snapshot_task: Mutex::new(None),
            }),
        })
    }
}

impl Gateway {
    /// Start building a new gateway.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub(crate) fn shared(&self) -> &Arc<SharedState> {
        &self.inner.shared
    }

    pub(crate) fn publish(&self, event: TelemetryEvent) {
        self.inner.bus.publish(event);
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.inner.request_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register (or replace) a backend at runtime; affects only future
    /// requests. Learned metrics for the identity are carried over, while
    /// volatile guard state (buckets, circuit, ledger position) restarts
    /// with the fresh adapter.
    pub fn register_backend(&self, spec: BackendSpec, dispatcher: Arc<dyn Dispatcher>) {
        let cfg = self
            .inner
            .shared
            .config
            .read()
            .expect("lock poisoned")
            .clone();
        let state = Arc::new(BackendState::new(spec, dispatcher, &cfg));
        let mut backends = self.inner.shared.backends.write().expect("lock poisoned");
        if let Some(slot) = backends.iter_mut().find(|b| b.spec.id == state.spec.id) {
            *state.metrics.lock().expect("mutex poisoned") =
                slot.metrics.lock().expect("mutex poisoned").clone();
            *slot = state;
        } else {
            backends.push(state);
        }
    }

    /// Remove a backend; in-flight requests finish against the old handle.
    /// Returns `true` when it was registered. Learned Q-entries survive so
    /// a re-registered identity resumes where it left off.
    pub fn unregister_backend(&self, id: &BackendId) -> bool {
        let mut backends = self.inner.shared.backends.write().expect("lock poisoned");
        let before = backends.len();
        backends.retain(|b| &b.spec.id != id);
        backends.len() != before
    }

    /// Ids of currently registered backends, in registration order.
    #[must_use]
    pub fn backends(&self) -> Vec<BackendId> {
        self.inner
            .shared
            .snapshot_backends()
            .iter()
            .map(|b| b.spec.id.clone())
            .collect()
    }

    /// Value-copy of every backend's metrics record.
    #[must_use]
    pub fn metrics(&self) -> HashMap<BackendId, MetricsRecord> {
        self.inner
            .shared
            .snapshot_backends()
            .iter()
            .map(|b| {
                (
                    b.spec.id.clone(),
                    b.metrics.lock().expect("mutex poisoned").clone(),
                )
            })
            .collect()
    }

    /// Value-copy of the Q-table.
    #[must_use]
    pub fn q_table(&self) -> HashMap<(BackendId, TaskCategory), f64> {
        self.inner.shared.qtable.export()
    }

    /// Current free-quota view for one backend.
    #[must_use]
    pub fn quota(&self, id: &BackendId) -> Option<QuotaSnapshot> {
        self.inner.shared.find(id).map(|b| b.ledger.snapshot())
    }

    /// Current circuit view for one backend.
    #[must_use]
    pub fn circuit(&self, id: &BackendId) -> Option<CircuitSnapshot> {
        self.inner.shared.find(id).map(|b| b.circuit.snapshot())
    }

    /// Attach a synchronous telemetry subscriber.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.inner.bus.subscribe(subscriber);
    }

    /// Open a buffered telemetry receiver for external drains.
    #[must_use]
    pub fn tap(&self) -> TelemetryReceiver {
        self.inner.bus.tap()
    }

    /// Total telemetry events dropped to receiver overflow.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.inner.bus.dropped_events()
    }

    /// Adjust one tunable parameter at runtime.
    ///
    /// Circuit thresholds and default rate caps propagate to existing
    /// backends (explicit per-backend declarations stay authoritative);
    /// buffer capacity applies to receivers opened afterwards.
    ///
    /// # Errors
    /// `InvalidConfig` for out-of-range values.
    pub fn reconfigure(&self, key: ConfigKey, value: f64) -> Result<(), GatewayError> {
        let shared = &self.inner.shared;
        let updated = {
            let mut cfg = shared.config.write().expect("lock poisoned");
            cfg.apply(key, value)?;
            cfg.clone()
        };

        match key {
            ConfigKey::CircuitThreshold
            | ConfigKey::ColdStartThreshold
            | ConfigKey::CircuitOpenSeconds
            | ConfigKey::CircuitOpenExtendedSeconds => {
                for backend in shared.snapshot_backends() {
                    backend.circuit.set_config(updated.circuit);
                }
            }
            ConfigKey::RatePerMinuteDefault | ConfigKey::RatePerDayDefault => {
                for backend in shared.snapshot_backends() {
                    let per_minute = backend
                        .spec
                        .requests_per_minute
                        .unwrap_or(updated.rate_limits.per_minute_default);
                    let per_day = backend
                        .spec
                        .requests_per_day
                        .unwrap_or(updated.rate_limits.per_day_default);
                    backend.limiter.set_capacities(per_minute, per_day);
                }
            }
            ConfigKey::TelemetryBuffer => {
                self.inner.bus.set_capacity(updated.telemetry_buffer);
            }
            _ => {}
        }
        Ok(())
    }

    /// Serialize learned state (metrics + Q-table) into a blob.
    #[must_use]
    pub fn export_snapshot(&self) -> Vec<u8> {
        let mut metrics: Vec<(BackendId, MetricsRecord)> = self
            .inner
            .shared
            .snapshot_backends()
            .iter()
            .map(|b| {
                (
                    b.spec.id.clone(),
                    b.metrics.lock().expect("mutex poisoned").clone(),
                )
            })
            .collect();
        metrics.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        let qtable = self.inner.shared.qtable.export_sorted();
        snapshot::encode(now_ms(), &metrics, &qtable)
    }

    /// Merge a snapshot blob into live state. Records for known backends
    /// overwrite the live values; unknown backend ids are skipped and
    /// reported.
    ///
    /// # Errors
    /// `Snapshot` when the blob fails structural validation.
    pub fn import_snapshot(&self, blob: &[u8]) -> Result<ImportReport, GatewayError> {
        let data = snapshot::decode(blob)?;
        let mut report = ImportReport::default();

        for (id, record) in data.metrics {
            match self.inner.shared.find(&id) {
                Some(state) => {
                    *state.metrics.lock().expect("mutex poisoned") = record;
                    report.merged += 1;
                }
                None => report.skipped.push(id.as_str().to_string()),
            }
        }
        for (id, category, q) in data.qtable {
            if self.inner.shared.find(&id).is_some() {
                self.inner.shared.qtable.insert(id, category, q);
                report.merged += 1;
            } else {
                report.skipped.push(id.as_str().to_string());
            }
        }
        report.skipped.extend(data.unknown_categories);
        report.skipped.dedup();
        Ok(report)
    }

    /// Export to the attached store and publish `SnapshotTaken`.
    ///
    /// A missing store makes this a no-op; a failing store is logged and
    /// retried at the next interval.
    pub fn snapshot_now(&self) {
        let Some(store) = self.inner.store.as_ref() else {
            return;
        };
        let blob = self.export_snapshot();
        match store.save(&blob) {
            Ok(()) => {
                self.publish(TelemetryEvent::SnapshotTaken {
                    timestamp_ms: now_ms(),
                    schema_version: snapshot::SCHEMA_VERSION,
                    size_bytes: blob.len() as u64,
                });
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "snapshot store rejected blob");
            }
        }
    }

    /// Spawn the periodic snapshot task. Must be called within a tokio
    /// runtime; repeated calls replace the previous task.
    pub fn start_snapshot_timer(&self) {
        let gateway = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let interval = gateway
                    .inner
                    .shared
                    .config
                    .read()
                    .expect("lock poisoned")
                    .snapshot_interval;
                tokio::time::sleep(interval).await;
                gateway.snapshot_now();
            }
        });
        let mut slot = self.inner.snapshot_task.lock().expect("mutex poisoned");
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Graceful shutdown: stop the snapshot timer and take a final
    /// snapshot.
    pub fn shutdown(&self) {
        if let Some(task) = self
            .inner
            .snapshot_task
            .lock()
            .expect("mutex poisoned")
            .take()
        {
            task.abort();
        }
        self.snapshot_now();
    }
}
