//! Tabular Q-learning over (backend, task-category) pairs.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use waypoint_types::{BackendId, TaskCategory};

/// Lower clamp of the shaped reward.
const REWARD_MIN: f64 = -2.0;
/// Upper clamp of the shaped reward.
const REWARD_MAX: f64 = 2.0;

/// Table of learned preferences.
///
/// Entries are created lazily on first read or update. The initializer is a
/// small positive value in `[0.01, 0.10)` derived deterministically from the
/// gateway seed and the key, so tie-breaking noise never perturbs the
/// router's RNG stream and a restored snapshot replays decisions exactly.
pub struct QTable {
    seed: u64,
    entries: Mutex<HashMap<(BackendId, TaskCategory), f64>>,
}

impl QTable {
    /// Create an empty table deriving initial values from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn init_value(&self, backend: &BackendId, category: TaskCategory) -> f64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.seed.hash(&mut hasher);
        backend.as_str().hash(&mut hasher);
        category.as_str().hash(&mut hasher);
        let unit = hasher.finish() as f64 / u64::MAX as f64;
        0.09_f64.mul_add(unit, 0.01)
    }

    /// Current Q-value for the pair, creating the entry if absent.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn value(&self, backend: &BackendId, category: TaskCategory) -> f64 {
        let mut entries = self.entries.lock().expect("mutex poisoned");
        *entries
            .entry((backend.clone(), category))
            .or_insert_with(|| self.init_value(backend, category))
    }

    /// Apply one learning step: `Q <- Q + alpha * (reward - Q)`.
    ///
    /// Updates for different pairs proceed independently; updates for the
    /// same pair are linearized by the table lock.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn update(&self, backend: &BackendId, category: TaskCategory, reward: f64, alpha: f64) {
        let mut entries = self.entries.lock().expect("mutex poisoned");
        let q = entries
            .entry((backend.clone(), category))
            .or_insert_with(|| self.init_value(backend, category));
        *q += alpha * (reward - *q);
    }

    /// Copy of the whole table.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn export(&self) -> HashMap<(BackendId, TaskCategory), f64> {
        self.entries.lock().expect("mutex poisoned").clone()
    }

    /// Copy of the table sorted by key, for deterministic serialization.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn export_sorted(&self) -> Vec<(BackendId, TaskCategory, f64)> {
        let mut rows: Vec<(BackendId, TaskCategory, f64)> = self
            .entries
            .lock()
            .expect("mutex poisoned")
            .iter()
            .map(|((b, c), q)| (b.clone(), *c, *q))
            .collect();
        rows.sort_by(|a, b| (a.0.as_str(), a.1.as_str()).cmp(&(b.0.as_str(), b.1.as_str())));
        rows
    }

    /// Replace the entry for one pair (snapshot import).
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn insert(&self, backend: BackendId, category: TaskCategory, q: f64) {
        self.entries
            .lock()
            .expect("mutex poisoned")
            .insert((backend, category), q);
    }

    /// Entries currently present.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("mutex poisoned").len()
    }

    /// True when no entry exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape one outcome into a reward in `[-2, 2]`.
///
/// Base +1/-1 by success, scaled toward faster-than-average responses,
/// then by cost: a request the free tier fully absorbed earns a 1.5x
/// bonus, otherwise cheapness relative to a 0.1-per-call reference scales
/// the signal within `[0.5, 2.0]`.
#[must_use]
pub fn shape_reward(
    success: bool,
    response_time_ms: u64,
    avg_response_time_ms: f64,
    used_free_quota: bool,
    incurred_cost: f64,
) -> f64 {
    let base: f64 = if success { 1.0 } else { -1.0 };

    #[allow(clippy::cast_precision_loss)]
    let observed = (response_time_ms.max(1)) as f64;
    let speed = if avg_response_time_ms > 0.0 {
        (avg_response_time_ms / observed).clamp(0.5, 2.0)
    } else {
        1.0
    };

    let cost_factor = if success && used_free_quota {
        1.5
    } else if incurred_cost > 0.0 {
        (0.1 / incurred_cost).clamp(0.5, 2.0)
    } else {
        2.0
    };

    (base * speed * cost_factor).clamp(REWARD_MIN, REWARD_MAX)
}
