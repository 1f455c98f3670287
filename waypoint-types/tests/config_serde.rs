use std::str::FromStr;

use waypoint_types::{ConfigKey, GatewayConfig};

#[test]
fn gateway_config_roundtrip() {
    let mut cfg = GatewayConfig::default();
    cfg.learning.exploration_rate = 0.25;
    cfg.circuit.failure_threshold = 4;
    cfg.telemetry_buffer = 64;

    let json = serde_json::to_string(&cfg).expect("serialize gateway config");
    let de: GatewayConfig = serde_json::from_str(&json).expect("deserialize gateway config");

    assert_eq!(de.learning.exploration_rate, 0.25);
    assert_eq!(de.circuit.failure_threshold, 4);
    assert_eq!(de.telemetry_buffer, 64);
    assert_eq!(de.snapshot_interval.as_secs(), 300);
}

#[test]
fn defaults_match_documented_table() {
    let cfg = GatewayConfig::default();
    assert_eq!(cfg.learning.learning_rate, 0.1);
    assert_eq!(cfg.learning.exploration_rate, 0.1);
    assert_eq!(cfg.learning.ema_smoothing, 0.1);
    assert_eq!(cfg.circuit.failure_threshold, 8);
    assert_eq!(cfg.circuit.cold_start_threshold, 3);
    assert_eq!(cfg.circuit.open_hold.as_secs(), 30);
    assert_eq!(cfg.circuit.open_hold_extended.as_secs(), 60);
    assert_eq!(cfg.rate_limits.per_minute_default, 60);
    assert_eq!(cfg.rate_limits.per_day_default, 10_000);
    assert_eq!(cfg.telemetry_buffer, 1024);
    assert_eq!(cfg.dispatch_timeout.as_secs(), 60);
    assert!(cfg.default_backend.is_none());
}

#[test]
fn config_keys_parse_from_table_strings() {
    for key in [
        "learning_rate",
        "exploration_rate",
        "ema_smoothing",
        "circuit_threshold",
        "cold_start_threshold",
        "circuit_open_seconds",
        "circuit_open_extended_seconds",
        "rate_per_minute_default",
        "rate_per_day_default",
        "telemetry_buffer",
        "snapshot_interval_seconds",
    ] {
        let parsed = ConfigKey::from_str(key).expect("recognized key");
        assert_eq!(parsed.as_str(), key);
    }

    assert!(ConfigKey::from_str("default_backend").is_err());
}

#[test]
fn apply_rejects_out_of_range_values() {
    let mut cfg = GatewayConfig::default();

    assert!(cfg.apply(ConfigKey::ExplorationRate, 1.5).is_err());
    assert!(cfg.apply(ConfigKey::LearningRate, 0.0).is_err());
    assert!(cfg.apply(ConfigKey::CircuitThreshold, 0.2).is_err());

    cfg.apply(ConfigKey::ExplorationRate, 0.3)
        .expect("valid epsilon");
    assert_eq!(cfg.learning.exploration_rate, 0.3);

    cfg.apply(ConfigKey::SnapshotIntervalSeconds, 60.0)
        .expect("valid interval");
    assert_eq!(cfg.snapshot_interval.as_secs(), 60);
}
