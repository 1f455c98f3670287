use std::time::Duration;

use waypoint_middleware::CircuitBreaker;
use waypoint_types::{CircuitConfig, CircuitState};

fn config(threshold: u32) -> CircuitConfig {
    CircuitConfig {
        failure_threshold: threshold,
        ..CircuitConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn trips_open_at_failure_threshold() {
    let breaker = CircuitBreaker::new(config(3));

    assert!(breaker.record_failure(false).is_none());
    assert!(breaker.record_failure(false).is_none());
    let transition = breaker.record_failure(false).expect("third failure trips");
    assert_eq!(transition.from, CircuitState::Closed);
    assert_eq!(transition.to, CircuitState::Open);

    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(breaker.try_acquire().is_err());
}

#[tokio::test(start_paused = true)]
async fn success_resets_the_failure_streak() {
    let breaker = CircuitBreaker::new(config(3));

    breaker.record_failure(false);
    breaker.record_failure(false);
    assert!(breaker.record_success().is_none());
    breaker.record_failure(false);
    breaker.record_failure(false);
    assert!(breaker.record_failure(false).is_some());
}

#[tokio::test(start_paused = true)]
async fn cold_start_heavy_backends_trip_earlier() {
    let breaker = CircuitBreaker::new(CircuitConfig {
        failure_threshold: 8,
        cold_start_threshold: 3,
        ..CircuitConfig::default()
    });

    assert!(breaker.record_failure(true).is_none());
    assert!(breaker.record_failure(true).is_none());
    // Third consecutive cold start meets the lowered threshold.
    let transition = breaker.record_failure(true).expect("cold-start trip");
    assert_eq!(transition.to, CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn extended_hold_applies_after_many_cold_starts() {
    let breaker = CircuitBreaker::new(CircuitConfig {
        failure_threshold: 6,
        cold_start_threshold: 10,
        extended_after_cold_starts: 5,
        open_hold: Duration::from_secs(30),
        open_hold_extended: Duration::from_secs(60),
    });

    for _ in 0..5 {
        assert!(breaker.record_failure(true).is_none());
    }
    assert!(breaker.record_failure(true).is_some());

    // After the base hold the circuit is still open (extended hold active).
    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[tokio::test(start_paused = true)]
async fn half_open_admits_exactly_one_probe() {
    let breaker = CircuitBreaker::new(config(1));
    breaker.record_failure(false);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    let pass = breaker.try_acquire().expect("probe admitted");
    assert!(pass.probe);
    let transition = pass.transition.expect("open to half-open transition reported");
    assert_eq!(transition.from, CircuitState::Open);
    assert_eq!(transition.to, CircuitState::HalfOpen);

    // Second caller is refused while the probe is in flight.
    assert!(breaker.try_acquire().is_err());
}

#[tokio::test(start_paused = true)]
async fn probe_success_closes_probe_failure_reopens_longer() {
    let breaker = CircuitBreaker::new(config(1));

    breaker.record_failure(false);
    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(breaker.try_acquire().is_ok());
    let transition = breaker.record_success().expect("probe closes circuit");
    assert_eq!(transition.to, CircuitState::Closed);
    assert!(breaker.try_acquire().is_ok());

    // Trip again; this time the probe fails.
    breaker.record_failure(false);
    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(breaker.try_acquire().is_ok());
    let transition = breaker.record_failure(false).expect("probe failure reopens");
    assert_eq!(transition.from, CircuitState::HalfOpen);
    assert_eq!(transition.to, CircuitState::Open);

    // Extended hold: base 30s is not enough.
    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(breaker.state(), CircuitState::Open);
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[tokio::test(start_paused = true)]
async fn released_probe_can_be_reclaimed() {
    let breaker = CircuitBreaker::new(config(1));
    breaker.record_failure(false);
    tokio::time::advance(Duration::from_secs(31)).await;

    assert!(breaker.try_acquire().is_ok());
    breaker.release_probe();
    // The slot is free again for the next caller.
    assert!(breaker.try_acquire().is_ok());
}

#[tokio::test(start_paused = true)]
async fn snapshot_reflects_hold_and_counters() {
    let breaker = CircuitBreaker::new(config(2));
    breaker.record_failure(true);
    breaker.record_failure(false);

    let snap = breaker.snapshot();
    assert_eq!(snap.state, CircuitState::Open);
    assert_eq!(snap.consecutive_failures, 2);
    assert_eq!(snap.consecutive_cold_starts, 0);
    assert!(snap.open_remaining.is_some());
}
