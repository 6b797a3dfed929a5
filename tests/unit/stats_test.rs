//! Tests for pool statistics and lifecycle values

use pooler::core::{Lifecycle, Pooler, TaskPriority};

#[test]
fn test_lifecycle_display() {
    assert_eq!(Lifecycle::Idle.to_string(), "idle");
    assert_eq!(Lifecycle::Processing.to_string(), "processing");
    assert_eq!(Lifecycle::Draining.to_string(), "draining");
    assert_eq!(Lifecycle::Done.to_string(), "done");
    assert!(Lifecycle::Draining.is_active());
    assert!(!Lifecycle::Done.is_active());
}

#[test]
fn test_idle_pool_stats() {
    let pool = Pooler::create_new(7).unwrap();
    pool.add(|_| Ok(()), false, TaskPriority::Normal).unwrap();
    pool.add(|_| Ok(()), false, TaskPriority::Highest).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.run, 0);
    assert_eq!(stats.lifecycle, Lifecycle::Idle);
    assert_eq!(stats.max_running_tasks, 7);
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.running, 0);
    assert_eq!(stats.done, 0);
    assert_eq!(stats.peak_running, 0);
    assert!(!pool.is_processing());
}

#[test]
fn test_stats_serialize() {
    let pool = Pooler::create_new(3).unwrap();
    let json = serde_json::to_value(pool.stats()).unwrap();
    assert_eq!(json["id"], pool.id().to_string());
    assert_eq!(json["lifecycle"], "idle");
    assert_eq!(json["max_running_tasks"], 3);
    assert_eq!(json["queued"], 0);
}
