//! Tests for error types

use pooler::core::{Lifecycle, PoolerError, TaskFailure};

#[test]
fn test_invalid_state_error() {
    let err = PoolerError::InvalidState {
        operation: "add a task",
        state: Lifecycle::Done,
    };
    assert_eq!(format!("{}", err), "invalid state: cannot add a task while pool is done");
}

#[test]
fn test_configuration_error() {
    let err = PoolerError::Configuration("bad limit".to_string());
    assert_eq!(format!("{}", err), "configuration error: bad limit");
}

#[test]
fn test_timeout_error() {
    let err = PoolerError::Timeout;
    assert_eq!(format!("{}", err), "timed out waiting for all tasks to finish");
}

#[test]
fn test_thread_spawn_error_from_io() {
    let err: PoolerError = std::io::Error::other("no threads left").into();
    assert_eq!(format!("{}", err), "failed to spawn thread: no threads left");
}

#[test]
fn test_task_failure_display_and_index() {
    let failed = TaskFailure::Failed {
        index: 4,
        source: anyhow::anyhow!("network down"),
    };
    assert_eq!(format!("{}", failed), "task 4 failed: network down");
    assert_eq!(failed.index(), 4);

    let panicked = TaskFailure::Panicked {
        index: 9,
        message: "index out of bounds".to_string(),
    };
    assert_eq!(format!("{}", panicked), "task 9 panicked: index out of bounds");
    assert_eq!(panicked.index(), 9);

    let dispatch = TaskFailure::Dispatch {
        index: 1,
        message: "resource unavailable".to_string(),
    };
    assert_eq!(format!("{}", dispatch), "task 1 could not be dispatched: resource unavailable");
}
