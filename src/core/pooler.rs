//! Heterogeneous pool: every unit is added individually.

use std::sync::Arc;

use tracing::debug;

use super::{AppResult, Lifecycle, Pool, PoolerError, TaskPriority, TaskQueue};

/// Pool whose backlog is a priority queue of individually added units.
pub type Pooler = Pool<TaskQueue>;

impl Pool<TaskQueue> {
    /// Enqueue a unit and return its index.
    ///
    /// Before [`start_processing`](Self::start_processing) every add is
    /// accepted. Once processing, the add is accepted only when
    /// `allow_during_processing` is set; the unit then counts toward the
    /// current run and is admitted as soon as there is capacity.
    ///
    /// # Errors
    ///
    /// Returns `PoolerError::InvalidState` if the run already finished, or
    /// if the pool is processing and `allow_during_processing` is false.
    pub fn add<F>(
        &self,
        action: F,
        allow_during_processing: bool,
        priority: TaskPriority,
    ) -> Result<usize, PoolerError>
    where
        F: Fn(&Self) -> AppResult<()> + Send + Sync + 'static,
    {
        self.transact(|state| {
            match state.lifecycle {
                Lifecycle::Done => return Err(state.invalid("add a task")),
                Lifecycle::Processing | Lifecycle::Draining if !allow_during_processing => {
                    return Err(state.invalid("add a task without allow_during_processing"));
                }
                Lifecycle::Idle | Lifecycle::Processing | Lifecycle::Draining => {}
            }
            let index = state.backlog.push(Arc::new(action), priority);
            debug!(pool_id = %self.id(), index, ?priority, "task added");
            Ok(index)
        })
    }

    /// Total number of units added to this pool.
    #[must_use]
    pub fn enqueued(&self) -> usize {
        self.with_state(|state| state.backlog.enqueued())
    }
}
