//! Task units, priorities, and the execution boundary that turns a task's
//! error or panic into a recorded [`TaskFailure`].

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{AppResult, Pool, TaskFailure};
use crate::util::clock::now_ms;

/// Callable executed for a task. It receives the pool that runs it.
pub type TaskAction<B> = Arc<dyn Fn(&Pool<B>) -> AppResult<()> + Send + Sync>;

thread_local! {
    static CURRENT_TASK: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Index of the task running on the current thread, if any.
///
/// Actions only receive the pool, so this is how an action learns which
/// unit it is (for example, which repetition of a repeater batch).
#[must_use]
pub fn current_task_index() -> Option<usize> {
    CURRENT_TASK.with(Cell::get)
}

/// Scheduling hint; higher priorities leave the backlog first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Runs after everything else.
    Lowest,
    /// Below normal.
    BelowNormal,
    /// Default priority.
    #[default]
    Normal,
    /// Above normal.
    AboveNormal,
    /// Runs before everything else.
    Highest,
}

/// A single unit of work owned by the pool until it is dispatched.
pub struct TaskUnit<B> {
    /// Position assigned when the unit was enqueued or materialized.
    pub index: usize,
    /// Work to run.
    pub action: TaskAction<B>,
    /// Whether the unit was materialized from a repeater batch.
    pub is_repeating: bool,
    /// Scheduling hint.
    pub priority: TaskPriority,
}

impl<B> fmt::Debug for TaskUnit<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskUnit")
            .field("index", &self.index)
            .field("is_repeating", &self.is_repeating)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl<B> TaskUnit<B> {
    /// Run the action on the current thread. Errors and panics are captured
    /// and returned as a [`TaskFailure`]; nothing escapes to the caller.
    pub(crate) fn run(self, pool: &Pool<B>) -> Result<(), TaskFailure> {
        let index = self.index;
        CURRENT_TASK.with(|current| current.set(Some(index)));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.action)(pool)));
        CURRENT_TASK.with(|current| current.set(None));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(TaskFailure::Failed { index, source }),
            Err(payload) => Err(TaskFailure::Panicked {
                index,
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}

/// A captured task failure. Records are kept in completion order.
#[derive(Debug, Clone)]
pub struct ExceptionRecord {
    /// Index of the failed task.
    pub task_index: usize,
    /// What went wrong.
    pub error: Arc<TaskFailure>,
    /// When the failure was recorded, in milliseconds since the epoch.
    pub recorded_at_ms: u128,
}

impl ExceptionRecord {
    pub(crate) fn new(failure: TaskFailure) -> Self {
        Self {
            task_index: failure.index(),
            error: Arc::new(failure),
            recorded_at_ms: now_ms(),
        }
    }
}
