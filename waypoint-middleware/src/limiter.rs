//! Fixed-window request-rate buckets.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use waypoint_types::{BackendId, GatewayError, RateWindow};

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(86_400);

/// A bucket refusal: which window is exhausted and when it resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRefusal {
    /// Window that refused the acquisition.
    pub window: RateWindow,
    /// Time until that window resets.
    pub retry_in: Duration,
}

impl RateRefusal {
    /// Convert into the caller-facing error for `backend`.
    #[must_use]
    pub fn into_error(self, backend: &BackendId) -> GatewayError {
        GatewayError::RateLimited {
            backend: backend.clone(),
            retry_in_ms: u64::try_from(self.retry_in.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

struct Bucket {
    capacity: u64,
    used: u64,
    epoch: Instant,
    window: Duration,
}

impl Bucket {
    fn new(capacity: u64, window: Duration, now: Instant) -> Self {
        Self {
            capacity,
            used: 0,
            epoch: now,
            window,
        }
    }

    /// Advance the epoch in whole window steps so boundaries stay fixed
    /// rather than rolling from the last request.
    fn roll(&mut self, now: Instant) {
        while now.duration_since(self.epoch) >= self.window {
            self.epoch += self.window;
            self.used = 0;
        }
    }

    fn reset_in(&self, now: Instant) -> Duration {
        (self.epoch + self.window).saturating_duration_since(now)
    }
}

struct LimiterRuntime {
    minute: Bucket,
    day: Bucket,
}

/// Non-blocking per-backend request-rate limiter.
///
/// Two fixed windows (per-minute, per-day); a dispatch consumes one slot
/// from each. Acquisition never blocks: a refusal names the exhausted
/// window so the engine can advance the fallback chain and publish the
/// matching telemetry.
pub struct RateLimiter {
    runtime: Mutex<LimiterRuntime>,
}

impl RateLimiter {
    /// Create a limiter with the given window capacities.
    #[must_use]
    pub fn new(per_minute: u64, per_day: u64) -> Self {
        let now = Instant::now();
        Self {
            runtime: Mutex::new(LimiterRuntime {
                minute: Bucket::new(per_minute, MINUTE, now),
                day: Bucket::new(per_day, DAY, now),
            }),
        }
    }

    /// Take one slot from both windows, or refuse naming the tighter one.
    ///
    /// # Errors
    /// Returns the [`RateRefusal`] for the first exhausted window. Nothing
    /// is consumed on refusal.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn try_acquire(&self) -> Result<(), RateRefusal> {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        let now = Instant::now();
        rt.minute.roll(now);
        rt.day.roll(now);

        if rt.minute.used >= rt.minute.capacity {
            return Err(RateRefusal {
                window: RateWindow::Minute,
                retry_in: rt.minute.reset_in(now),
            });
        }
        if rt.day.used >= rt.day.capacity {
            return Err(RateRefusal {
                window: RateWindow::Day,
                retry_in: rt.day.reset_in(now),
            });
        }

        rt.minute.used += 1;
        rt.day.used += 1;
        Ok(())
    }

    /// Replace both window capacities. Consumed slots carry over; a shrink
    /// below current usage refuses further acquisitions until the window
    /// rolls.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn set_capacities(&self, per_minute: u64, per_day: u64) {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        rt.minute.capacity = per_minute;
        rt.day.capacity = per_day;
    }

    /// Slots remaining in the minute window right now.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn minute_remaining(&self) -> u64 {
        let mut rt = self.runtime.lock().expect("mutex poisoned");
        let now = Instant::now();
        rt.minute.roll(now);
        rt.minute.capacity.saturating_sub(rt.minute.used)
    }

    /// Declared minute-window capacity.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn minute_capacity(&self) -> u64 {
        self.runtime.lock().expect("mutex poisoned").minute.capacity
    }
}
