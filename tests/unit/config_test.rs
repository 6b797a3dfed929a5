//! Tests for configuration validation

use std::time::Duration;

use pooler::config::pool::MIN_THREAD_STACK_SIZE;
use pooler::config::PoolerConfig;

#[test]
fn test_pool_config_validation() {
    let valid = PoolerConfig::new()
        .with_max_running_tasks(50)
        .with_worker_idle_timeout(Duration::from_secs(1))
        .with_thread_stack_size(MIN_THREAD_STACK_SIZE)
        .with_thread_name_prefix("stress");
    assert!(valid.validate().is_ok());
}

#[test]
fn test_zero_running_tasks_is_valid() {
    let paused = PoolerConfig::new().with_max_running_tasks(0);
    assert!(paused.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_idle_timeout() {
    let invalid = PoolerConfig::new().with_worker_idle_timeout(Duration::ZERO);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_stack_size() {
    let invalid = PoolerConfig::new().with_thread_stack_size(MIN_THREAD_STACK_SIZE - 1);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_prefix() {
    let invalid = PoolerConfig::new().with_thread_name_prefix("");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_from_json() {
    let json = r#"{
        "max_running_tasks": 50,
        "worker_idle_timeout_ms": 2000,
        "thread_name_prefix": "harness",
        "re_arm": true
    }"#;

    let config = PoolerConfig::from_json_str(json).unwrap();
    assert_eq!(config.max_running_tasks, 50);
    assert_eq!(config.worker_idle_timeout(), Duration::from_secs(2));
    assert_eq!(config.thread_name_prefix, "harness");
    assert!(config.re_arm);
    assert_eq!(config.thread_stack_size, PoolerConfig::default().thread_stack_size);
}

#[test]
fn test_pool_config_from_json_rejects_negative_limit() {
    let json = r#"{ "max_running_tasks": -1 }"#;
    let err = PoolerConfig::from_json_str(json).unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_pool_config_from_json_validates() {
    let json = r#"{ "worker_idle_timeout_ms": 0 }"#;
    assert!(PoolerConfig::from_json_str(json).is_err());
}
