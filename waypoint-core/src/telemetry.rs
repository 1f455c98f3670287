//! In-process telemetry fan-out.
//!
//! The bus is the seam that breaks the learning-loop cycle: the metrics
//! store and Q-learner subscribe to outcome events instead of being called
//! by the engine, and the router only ever reads their snapshots.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use waypoint_types::TelemetryEvent;

/// A synchronous consumer attached to the bus.
///
/// Subscribers are invoked inline at publication, in attach order, and see
/// every event in publication order. Handlers must be cheap in-memory
/// operations and must not publish back into the bus.
pub trait Subscriber: Send + Sync {
    /// Handle one published event. The event is owned by the bus.
    fn on_event(&self, event: &TelemetryEvent);
}

struct Tap {
    queue: Mutex<VecDeque<TelemetryEvent>>,
    dropped: AtomicU64,
    capacity: usize,
}

/// Single-producer-multi-consumer fan-out of structured events.
///
/// Attached [`Subscriber`]s receive events synchronously and losslessly.
/// External [`TelemetryReceiver`]s buffer into bounded queues: lossless
/// under normal load, dropping the oldest event (and counting the drop)
/// under overload, since stale events have the least learning value.
pub struct TelemetryBus {
    inner: Mutex<BusInner>,
    dropped: AtomicU64,
}

struct BusInner {
    subscribers: Vec<Arc<dyn Subscriber>>,
    taps: Vec<Arc<Tap>>,
    capacity: usize,
}

impl TelemetryBus {
    /// Create a bus whose receivers buffer up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BusInner {
                subscribers: Vec::new(),
                taps: Vec::new(),
                capacity: capacity.max(1),
            }),
            dropped: AtomicU64::new(0),
        }
    }

    /// Attach a synchronous subscriber. Subscribers see events in attach
    /// order and cannot be detached.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.inner
            .lock()
            .expect("lock poisoned")
            .subscribers
            .push(subscriber);
    }

    /// Open a buffered receiver for external drains.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn tap(&self) -> TelemetryReceiver {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let shared = Arc::new(Tap {
            queue: Mutex::new(VecDeque::new()),
            dropped: AtomicU64::new(0),
            capacity: inner.capacity,
        });
        inner.taps.push(Arc::clone(&shared));
        TelemetryReceiver { shared }
    }

    /// Adjust the buffer capacity applied to receivers opened from now on.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn set_capacity(&self, capacity: usize) {
        self.inner.lock().expect("lock poisoned").capacity = capacity.max(1);
    }

    /// Publish one event to every subscriber and receiver.
    ///
    /// Non-blocking: receiver overflow drops the oldest buffered event.
    /// Publication order is serialized by the bus lock.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn publish(&self, event: TelemetryEvent) {
        let mut inner = self.inner.lock().expect("lock poisoned");

        // Receivers whose handle was dropped hold the last strong reference.
        inner.taps.retain(|t| Arc::strong_count(t) > 1);

        for tap in &inner.taps {
            let mut queue = tap.queue.lock().expect("lock poisoned");
            if queue.len() >= tap.capacity {
                queue.pop_front();
                tap.dropped.fetch_add(1, Ordering::Relaxed);
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(event.clone());
        }

        for subscriber in &inner.subscribers {
            subscriber.on_event(&event);
        }
    }

    /// Total events dropped across all receivers since creation.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Buffered consumer handle returned by [`TelemetryBus::tap`].
///
/// Dropping the receiver detaches it from the bus.
pub struct TelemetryReceiver {
    shared: Arc<Tap>,
}

impl TelemetryReceiver {
    /// Pop the oldest buffered event, if any.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn try_recv(&self) -> Option<TelemetryEvent> {
        self.shared.queue.lock().expect("lock poisoned").pop_front()
    }

    /// Drain every buffered event in publication order.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn drain(&self) -> Vec<TelemetryEvent> {
        self.shared
            .queue
            .lock()
            .expect("lock poisoned")
            .drain(..)
            .collect()
    }

    /// Events currently buffered.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.queue.lock().expect("lock poisoned").len()
    }

    /// True when the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events this receiver lost to overflow.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
