//! Repeating pool: one action executed a fixed number of times.

use std::sync::Arc;

use tracing::info;

use super::{AppResult, Lifecycle, Pool, PoolerError, RepeatBatch, TaskPriority};

/// Pool that runs one action `count` times, with indices `0..count`.
/// Use [`current_task_index`](crate::core::current_task_index) inside the
/// action to tell the repetitions apart.
pub type Repeater = Pool<RepeatBatch>;

impl Pool<RepeatBatch> {
    /// Arm the batch. Setting again before processing replaces the batch.
    ///
    /// After a run finished, a pool configured with `re_arm` goes back to
    /// `Idle` with cleared counters and the new batch; call
    /// [`start_processing`](Self::start_processing) again to run it.
    ///
    /// # Errors
    ///
    /// Returns `PoolerError::InvalidState` while processing, or after the
    /// run finished when re-arming is not enabled.
    pub fn set<F>(&self, action: F, count: usize, priority: TaskPriority) -> Result<(), PoolerError>
    where
        F: Fn(&Self) -> AppResult<()> + Send + Sync + 'static,
    {
        let re_arm = self.config().re_arm;
        self.transact(|state| {
            match state.lifecycle {
                Lifecycle::Idle => {}
                Lifecycle::Done if re_arm => {
                    state.begin_new_run();
                    info!(pool_id = %self.id(), count, "repeater re-armed");
                }
                Lifecycle::Done | Lifecycle::Processing | Lifecycle::Draining => {
                    return Err(state.invalid("set the repeated task"));
                }
            }
            state.backlog.arm(Arc::new(action), count, priority);
            Ok(())
        })
    }

    /// Number of repetitions in the armed batch.
    #[must_use]
    pub fn repeat_count(&self) -> usize {
        self.with_state(|state| state.backlog.count())
    }
}
