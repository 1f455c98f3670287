//! Deterministic mock dispatcher for waypoint tests and examples.
//!
//! The mock replays a script of per-call behaviors, falling back to a
//! default behavior when the script runs dry. Latency is simulated on the
//! tokio clock so paused-clock tests stay deterministic.
#![warn(missing_docs)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use waypoint_core::{Dispatcher, SnapshotStore};
use waypoint_types::{
    CapabilitySet, DispatchResult, GatewayError, GenerationRequest, Pricing, Usage,
};

/// Instruction for how one dispatch call should behave.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return a successful result with the given content and usage.
    Succeed {
        /// Response body.
        content: String,
        /// Reported input units.
        input_units: u64,
        /// Reported output units.
        output_units: u64,
    },
    /// Fail immediately with the provided error.
    Fail(GatewayError),
    /// Hang until the engine's deadline cancels the call.
    Hang,
}

impl MockBehavior {
    /// Shorthand for a success echoing `content` with small usage numbers.
    #[must_use]
    pub fn ok(content: &str) -> Self {
        Self::Succeed {
            content: content.to_string(),
            input_units: 100,
            output_units: 50,
        }
    }
}

/// Scripted dispatcher used by integration tests.
///
/// Behavior resolution per call: the next scripted step if any remain,
/// otherwise the default behavior.
pub struct MockDispatcher {
    capabilities: CapabilitySet,
    pricing: Pricing,
    latency: Duration,
    script: Mutex<VecDeque<MockBehavior>>,
    default_behavior: MockBehavior,
    calls: AtomicU64,
}

impl MockDispatcher {
    /// Start building a mock.
    #[must_use]
    pub fn builder() -> MockDispatcherBuilder {
        MockDispatcherBuilder::new()
    }

    /// Number of dispatch calls received so far.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Dispatcher for MockDispatcher {
    async fn dispatch(&self, request: &GenerationRequest) -> Result<DispatchResult, GatewayError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let behavior = self
            .script
            .lock()
            .expect("mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match behavior {
            MockBehavior::Succeed {
                content,
                input_units,
                output_units,
            } => Ok(DispatchResult {
                content,
                usage: Usage {
                    input_units,
                    output_units,
                },
                model: format!("mock/{}", request.category),
            }),
            MockBehavior::Fail(err) => Err(err),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn pricing(&self) -> Pricing {
        self.pricing.clone()
    }
}

/// Builder for [`MockDispatcher`].
pub struct MockDispatcherBuilder {
    capabilities: CapabilitySet,
    pricing: Pricing,
    latency: Duration,
    script: VecDeque<MockBehavior>,
    default_behavior: MockBehavior,
}

impl Default for MockDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDispatcherBuilder {
    /// New builder: text+chat capable, zero pricing, zero latency, always
    /// succeeds with a canned reply.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: CapabilitySet::TEXT | CapabilitySet::CHAT,
            pricing: Pricing::paid(0.0, 0.0),
            latency: Duration::ZERO,
            script: VecDeque::new(),
            default_behavior: MockBehavior::ok("mock reply"),
        }
    }

    /// Set advertised capabilities.
    #[must_use]
    pub fn capabilities(mut self, caps: CapabilitySet) -> Self {
        self.capabilities = caps;
        self
    }

    /// Set declared pricing.
    #[must_use]
    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Simulated per-call latency on the tokio clock.
    #[must_use]
    pub const fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Append one scripted step.
    #[must_use]
    pub fn then(mut self, behavior: MockBehavior) -> Self {
        self.script.push_back(behavior);
        self
    }

    /// Append a scripted success.
    #[must_use]
    pub fn then_succeed(self, content: &str) -> Self {
        self.then(MockBehavior::ok(content))
    }

    /// Append a scripted failure.
    #[must_use]
    pub fn then_fail(self, err: GatewayError) -> Self {
        self.then(MockBehavior::Fail(err))
    }

    /// Behavior applied once the script runs dry.
    #[must_use]
    pub fn otherwise(mut self, behavior: MockBehavior) -> Self {
        self.default_behavior = behavior;
        self
    }

    /// Default to failing every unscripted call.
    #[must_use]
    pub fn always_fail(self, err: GatewayError) -> Self {
        self.otherwise(MockBehavior::Fail(err))
    }

    /// Finish the build.
    #[must_use]
    pub fn build(self) -> MockDispatcher {
        MockDispatcher {
            capabilities: self.capabilities,
            pricing: self.pricing,
            latency: self.latency,
            script: Mutex::new(self.script),
            default_behavior: self.default_behavior,
            calls: AtomicU64::new(0),
        }
    }
}

/// In-memory [`SnapshotStore`] holding the latest blob.
#[derive(Default)]
pub struct MemoryStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the stored blob, if any.
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        self.blob.lock().expect("mutex poisoned").as_ref().map(Vec::len)
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, blob: &[u8]) -> Result<(), GatewayError> {
        *self.blob.lock().expect("mutex poisoned") = Some(blob.to_vec());
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<u8>>, GatewayError> {
        Ok(self.blob.lock().expect("mutex poisoned").clone())
    }
}
