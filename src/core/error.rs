//! Error types for pool operations and task failures.

use thiserror::Error;

use super::Lifecycle;

/// Errors surfaced synchronously to the caller of a pool operation.
#[derive(Debug, Error)]
pub enum PoolerError {
    /// The operation is not allowed in the pool's current lifecycle state.
    #[error("invalid state: cannot {operation} while pool is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// Lifecycle state the pool was in.
        state: Lifecycle,
    },
    /// Construction arguments or configuration values are invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Waiting for the pool to finish took longer than allowed.
    #[error("timed out waiting for all tasks to finish")]
    Timeout,
    /// An engine thread could not be started.
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Failure of a single task, captured at the execution boundary.
#[derive(Debug, Error)]
pub enum TaskFailure {
    /// The task action returned an error.
    #[error("task {index} failed: {source}")]
    Failed {
        /// Index of the failed task.
        index: usize,
        /// Error returned by the action.
        #[source]
        source: anyhow::Error,
    },
    /// The task action panicked.
    #[error("task {index} panicked: {message}")]
    Panicked {
        /// Index of the failed task.
        index: usize,
        /// Panic payload rendered as text.
        message: String,
    },
    /// The task was admitted but no worker thread could be started for it.
    #[error("task {index} could not be dispatched: {message}")]
    Dispatch {
        /// Index of the affected task.
        index: usize,
        /// Reason the worker could not be started.
        message: String,
    },
}

impl TaskFailure {
    /// Index of the task this failure belongs to.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Failed { index, .. }
            | Self::Panicked { index, .. }
            | Self::Dispatch { index, .. } => *index,
        }
    }
}

/// Application-facing result using anyhow; this is what task actions return.
pub type AppResult<T> = Result<T, anyhow::Error>;
