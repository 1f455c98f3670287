//! Free-quota accounting: reserve at dispatch, reconcile against actual
//! usage, reset at fixed window boundaries.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use waypoint_types::QuotaSnapshot;

/// Outcome of reconciling a reservation against actual usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Units the free tier absorbed.
    pub free_units: u64,
    /// Units that spilled into paid billing.
    pub paid_units: u64,
    /// True when free quota fully absorbed the request.
    pub fully_free: bool,
}

struct LedgerRuntime {
    total: u64,
    remaining: u64,
    window: Duration,
    epoch: Instant,
}

impl LedgerRuntime {
    /// Advance the window in whole steps; each boundary restores the full
    /// budget and forgets in-flight reservations from the previous window.
    fn roll(&mut self, now: Instant) {
        while now.duration_since(self.epoch) >= self.window {
            self.epoch += self.window;
            self.remaining = self.total;
        }
    }

    fn reset_in(&self, now: Instant) -> Duration {
        (self.epoch + self.window).saturating_duration_since(now)
    }
}

/// Per-backend free-quota ledger.
///
/// Invariant: `0 <= remaining <= total` at all times; all arithmetic
/// saturates and refunds clamp to `total`.
pub struct FreeQuotaLedger {
    runtime: Mutex<LedgerRuntime>,
}

impl FreeQuotaLedger {
    /// Create a ledger granting `total` units per `window`. A zero total
    /// models a backend without a free tier; every check then fails.
    #[must_use]
    pub fn new(total: u64, window: Duration) -> Self {
        Self {
            runtime: Mutex::new(LedgerRuntime {
                total,
                remaining: total,
                window: window.max(Duration::from_secs(1)),
                epoch: Instant::now(),
            }),
        }
    }

    /// True when the current window can still absorb `units`.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn has_room(&self, units: u64) -> bool {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        rt.roll(Instant::now());
        units > 0 && rt.remaining >= units
    }

    /// Reserve `units` against the current window.
    ///
    /// Returns `false` (reserving nothing) when the window cannot absorb
    /// the whole reservation; partial free coverage is not offered because
    /// billing a request half-free is not reconcilable after the fact.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn try_reserve(&self, units: u64) -> bool {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        rt.roll(Instant::now());
        if units == 0 || rt.remaining < units {
            return false;
        }
        rt.remaining -= units;
        true
    }

    /// Return an unused reservation in full (failed or abandoned attempt).
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn release(&self, units: u64) {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        rt.roll(Instant::now());
        rt.remaining = rt.remaining.saturating_add(units).min(rt.total);
    }

    /// Settle a reservation against actual usage.
    ///
    /// Over-reservation is refunded. An over-run first consumes any
    /// remaining free units, then spills into the paid column reported in
    /// the result.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn reconcile(&self, reserved: u64, actual: u64) -> Reconciliation {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        rt.roll(Instant::now());

        if actual <= reserved {
            let refund = reserved - actual;
            rt.remaining = rt.remaining.saturating_add(refund).min(rt.total);
            return Reconciliation {
                free_units: actual,
                paid_units: 0,
                fully_free: true,
            };
        }

        let overrun = actual - reserved;
        let absorbed = overrun.min(rt.remaining);
        rt.remaining -= absorbed;
        let paid = overrun - absorbed;
        Reconciliation {
            free_units: reserved + absorbed,
            paid_units: paid,
            fully_free: paid == 0,
        }
    }

    /// Units still available in the current window.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        rt.roll(Instant::now());
        rt.remaining
    }

    /// Configured units per window.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.runtime.lock().expect("mutex poisoned").total
    }

    /// Time until the current window resets.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn reset_in(&self) -> Duration {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        let now = Instant::now();
        rt.roll(now);
        rt.reset_in(now)
    }

    /// Point-in-time view for routing reads and introspection.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> QuotaSnapshot {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        let now = Instant::now();
        rt.roll(now);
        QuotaSnapshot {
            total: rt.total,
            remaining: rt.remaining,
            reset_in: rt.reset_in(now),
        }
    }
}
