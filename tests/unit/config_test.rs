//! Tests for configuration validation

use prometheus_task_scheduler::config::{SchedulerConfig, WorkConfig};
use std::time::Duration;

#[test]
fn test_scheduler_config_defaults() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.tick_interval_ms, 5_000);
    assert_eq!(cfg.max_concurrency, 10);
    assert_eq!(cfg.default_max_retries, 3);
    assert!(!cfg.cache_enabled);
    assert_eq!(cfg.shutdown_grace(), Duration::from_secs(5));
    assert_eq!(cfg.work, WorkConfig::default());
}

#[test]
fn test_scheduler_config_invalid_tick_interval() {
    let invalid = SchedulerConfig {
        tick_interval_ms: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_concurrency() {
    let invalid = SchedulerConfig {
        max_concurrency: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_work_config_invalid_bounds() {
    let invalid = WorkConfig {
        min_duration_ms: 10,
        max_duration_ms: 5,
        failure_rate: 0.0,
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_work_config_invalid_failure_rate() {
    for rate in [-0.1, 1.5] {
        let invalid = WorkConfig {
            failure_rate: rate,
            ..WorkConfig::default()
        };
        assert!(invalid.validate().is_err());
    }
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "tick_interval_ms": 250,
        "max_concurrency": 4,
        "cache_enabled": true,
        "work": { "failure_rate": 0.0 }
    }"#;

    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.tick_interval(), Duration::from_millis(250));
    assert_eq!(cfg.max_concurrency, 4);
    assert!(cfg.cache_enabled);
    assert_eq!(cfg.default_max_retries, 3);
    assert_eq!(cfg.work.min_duration_ms, 1_000);
}

#[test]
fn test_scheduler_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"max_concurrency": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}
