//! Backend identity and static declarations registered alongside a dispatcher.

use core::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilitySet;

/// Typed identifier for a registered backend.
///
/// Identity is the stable routing key: metrics, quotas, circuit state, and
/// Q-entries are all keyed by it, and snapshots carry it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    /// Construct a new backend identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BackendId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-unit pricing and free-tier declaration for a backend.
///
/// Costs are expressed per single unit (one token or equivalent); dispatchers
/// that price per thousand units must divide before reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    /// Cost of one input unit, in account currency.
    pub input_cost_per_unit: f64,
    /// Cost of one output unit, in account currency.
    pub output_cost_per_unit: f64,
    /// Units available at zero marginal cost per window. Zero disables the
    /// free-tier ledger for this backend.
    pub free_units_per_window: u64,
    /// Length of the free-tier accounting window.
    pub free_window: Duration,
}

impl Pricing {
    /// Pricing for a fully paid backend with no free tier.
    #[must_use]
    pub const fn paid(input_cost_per_unit: f64, output_cost_per_unit: f64) -> Self {
        Self {
            input_cost_per_unit,
            output_cost_per_unit,
            free_units_per_window: 0,
            free_window: Duration::from_secs(86_400),
        }
    }

    /// Pricing for a backend offering `free_units` per `window` before any
    /// paid charges apply.
    #[must_use]
    pub const fn with_free_tier(mut self, free_units: u64, window: Duration) -> Self {
        self.free_units_per_window = free_units;
        self.free_window = window;
        self
    }

    /// Paid cost of a request split `input_units` / `output_units`, each
    /// column billed at its own rate.
    #[must_use]
    pub fn cost_of(&self, input_units: u64, output_units: u64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let (inp, out) = (input_units as f64, output_units as f64);
        self.input_cost_per_unit
            .mul_add(inp, self.output_cost_per_unit * out)
    }

    /// Blended cost of one unit for a request split `input_units` /
    /// `output_units`. Returns 0.0 when both counts are zero.
    #[must_use]
    pub fn blended_cost_per_unit(&self, input_units: u64, output_units: u64) -> f64 {
        let total = input_units + output_units;
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let (inp, out, tot) = (input_units as f64, output_units as f64, total as f64);
        (self.input_cost_per_unit * inp + self.output_cost_per_unit * out) / tot
    }
}

impl Default for Pricing {
    fn default() -> Self {
        Self::paid(0.0, 0.0)
    }
}

/// Static declarations a backend registers with.
///
/// Everything here is declared once and treated as ground truth by the
/// router; observed behavior (latency, reliability, learned preference) lives
/// in the metrics store and Q-table instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSpec {
    /// Stable backend identity.
    pub id: BackendId,
    /// Advertised capability tags.
    pub capabilities: CapabilitySet,
    /// Per-unit pricing and free-tier declaration.
    pub pricing: Pricing,
    /// Largest request (input + output units) the backend accepts.
    pub context_window_units: u64,
    /// Declared requests-per-minute cap; `None` uses the gateway default.
    pub requests_per_minute: Option<u64>,
    /// Declared requests-per-day cap; `None` uses the gateway default.
    pub requests_per_day: Option<u64>,
}

impl BackendSpec {
    /// Start a declaration for `id` with conservative defaults: no
    /// capabilities, zero pricing, a 32k context window, gateway-default
    /// rate limits.
    pub fn new(id: impl Into<BackendId>) -> Self {
        Self {
            id: id.into(),
            capabilities: CapabilitySet::empty(),
            pricing: Pricing::default(),
            context_window_units: 32_768,
            requests_per_minute: None,
            requests_per_day: None,
        }
    }

    /// Set the advertised capability set.
    #[must_use]
    pub fn capabilities(mut self, caps: CapabilitySet) -> Self {
        self.capabilities = caps;
        self
    }

    /// Set pricing and free-tier declarations.
    #[must_use]
    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Set the context window in units.
    #[must_use]
    pub const fn context_window(mut self, units: u64) -> Self {
        self.context_window_units = units;
        self
    }

    /// Declare an explicit requests-per-minute cap.
    #[must_use]
    pub const fn requests_per_minute(mut self, cap: u64) -> Self {
        self.requests_per_minute = Some(cap);
        self
    }

    /// Declare an explicit requests-per-day cap.
    #[must_use]
    pub const fn requests_per_day(mut self, cap: u64) -> Self {
        self.requests_per_day = Some(cap);
        self
    }

    /// True when the declaration includes a non-empty free tier.
    #[must_use]
    pub const fn has_free_tier(&self) -> bool {
        self.pricing.free_units_per_window > 0
    }
}
