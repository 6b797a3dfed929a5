//! Scheduler core shared by [`Pooler`](crate::core::Pooler) and
//! [`Repeater`](crate::core::Repeater).
//!
//! All counters, the concurrency gate, the backlog and the lifecycle live in
//! one [`PoolState`] behind one `parking_lot::Mutex`. Every operation runs as
//! a short transaction on that state; afterwards the core admits as much
//! queued work as the gate allows and re-evaluates the lifecycle. Events are
//! queued inside the transaction and delivered later by the dispatcher
//! thread, never under the lock.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::{Dispatcher, EventBus, PoolEvent};
use super::worker::WorkerSet;
use super::{
    AllDoneEvent, Backlog, ConcurrencyGate, ExceptionRecord, PoolerError, SubscriptionId,
    TaskDoneEvent, TaskExceptionEvent, TaskFailure, TaskUnit,
};
use crate::config::PoolerConfig;

/// Lifecycle of a pool run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Accepting work, nothing runs yet.
    Idle,
    /// Admitting queued work while capacity allows.
    Processing,
    /// Backlog is empty, some tasks are still running.
    Draining,
    /// Everything finished and `AllDone` was fired.
    Done,
}

impl Lifecycle {
    /// Whether the pool is currently running work.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Processing | Self::Draining)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Draining => "draining",
            Self::Done => "done",
        })
    }
}

/// Consistent snapshot of every pool counter, taken under the pool lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Identifier of the pool the snapshot was taken from.
    pub id: Uuid,
    /// Run number (see [`AllDoneEvent::run`]).
    pub run: u64,
    /// Lifecycle state.
    pub lifecycle: Lifecycle,
    /// Current concurrency limit.
    pub max_running_tasks: usize,
    /// Units waiting in the backlog.
    pub queued: usize,
    /// Units executing right now.
    pub running: usize,
    /// Units that returned control, successfully or not.
    pub done: usize,
    /// Units that failed.
    pub exceptions: usize,
    /// Highest `running` seen in this run.
    pub peak_running: usize,
    /// Worker threads waiting for work.
    pub idle_workers: usize,
}

pub(crate) struct PoolState<B> {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) backlog: B,
    pub(crate) gate: ConcurrencyGate,
    done_count: usize,
    exception_count: usize,
    exceptions: Vec<ExceptionRecord>,
    all_done_fired: bool,
    idle_workers: usize,
    run: u64,
}

impl<B: Backlog> PoolState<B> {
    fn new(backlog: B, max_running_tasks: usize) -> Self {
        Self {
            lifecycle: Lifecycle::Idle,
            backlog,
            gate: ConcurrencyGate::new(max_running_tasks),
            done_count: 0,
            exception_count: 0,
            exceptions: Vec::new(),
            all_done_fired: false,
            idle_workers: 0,
            run: 0,
        }
    }

    /// Error for `operation` attempted in the current state.
    pub(crate) const fn invalid(&self, operation: &'static str) -> PoolerError {
        PoolerError::InvalidState {
            operation,
            state: self.lifecycle,
        }
    }

    /// Return a finished pool to `Idle` with fresh counters. The limit and
    /// the worker threads carry over.
    pub(crate) fn begin_new_run(&mut self) {
        self.lifecycle = Lifecycle::Idle;
        self.backlog.clear();
        self.done_count = 0;
        self.exception_count = 0;
        self.exceptions.clear();
        self.all_done_fired = false;
        self.gate.reset_peak();
        self.run += 1;
    }
}

pub(crate) struct PoolInner<B> {
    id: Uuid,
    config: PoolerConfig,
    state: Mutex<PoolState<B>>,
    events: EventBus<B>,
    workers: WorkerSet<B>,
}

/// Handle to a bounded-concurrency pool. Clones share the same pool.
///
/// Units run on worker threads owned by the pool, at most
/// [`get_max_running_tasks`](Self::get_max_running_tasks) at a time. Task
/// failures are captured and reported through events; they never reach
/// the caller of a pool operation.
pub struct Pool<B> {
    inner: Arc<PoolInner<B>>,
}

impl<B> Clone for Pool<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> fmt::Debug for Pool<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("id", &self.inner.id).finish_non_exhaustive()
    }
}

impl<B> Pool<B> {
    pub(crate) const fn from_inner(inner: Arc<PoolInner<B>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<PoolInner<B>> {
        Arc::downgrade(&self.inner)
    }

    /// Unique identifier of this pool instance, used in log fields.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Configuration the pool was built with.
    #[must_use]
    pub fn config(&self) -> &PoolerConfig {
        &self.inner.config
    }
}

impl<B: Backlog + Default> Pool<B> {
    /// Create a pool running at most `max_running_tasks` units at once,
    /// with every other setting at its default.
    ///
    /// # Errors
    ///
    /// Returns `PoolerError::ThreadSpawn` if the event dispatcher thread
    /// cannot be started.
    pub fn create_new(max_running_tasks: usize) -> Result<Self, PoolerError> {
        Self::with_config(PoolerConfig::default().with_max_running_tasks(max_running_tasks))
    }

    /// Create a pool from a full configuration.
    ///
    /// # Errors
    ///
    /// - `PoolerError::Configuration` if the configuration is invalid
    /// - `PoolerError::ThreadSpawn` if the event dispatcher thread cannot be started
    pub fn with_config(config: PoolerConfig) -> Result<Self, PoolerError> {
        config.validate().map_err(PoolerError::Configuration)?;

        let (events, dispatcher): (EventBus<B>, Dispatcher<B>) = EventBus::new();
        let workers = WorkerSet::new(
            config.worker_idle_timeout(),
            config.thread_stack_size,
            config.thread_name_prefix.clone(),
        );
        let inner = Arc::new(PoolInner {
            id: Uuid::new_v4(),
            state: Mutex::new(PoolState::new(B::default(), config.max_running_tasks)),
            config,
            events,
            workers,
        });
        dispatcher.spawn(
            Arc::downgrade(&inner),
            format!("{}-events", inner.config.thread_name_prefix),
        )?;

        info!(
            pool_id = %inner.id,
            max_running_tasks = inner.config.max_running_tasks,
            "pool created"
        );
        Ok(Self { inner })
    }
}

impl<B: Backlog> Pool<B> {
    /// Begin executing queued units. Calling it again while processing or
    /// after the run finished changes nothing.
    pub fn start_processing(&self) {
        self.transact(|state| {
            if state.lifecycle == Lifecycle::Idle {
                state.lifecycle = Lifecycle::Processing;
                info!(
                    pool_id = %self.id(),
                    queued = state.backlog.len(),
                    limit = state.gate.limit(),
                    "processing started"
                );
            } else {
                debug!(pool_id = %self.id(), state = %state.lifecycle, "start_processing ignored");
            }
        });
    }

    /// Change the concurrency limit. Running units are never interrupted;
    /// freed capacity is used immediately and zero pauses admission.
    pub fn set_max_running_tasks(&self, max_running_tasks: usize) {
        self.transact(|state| {
            let previous = state.gate.set_limit(max_running_tasks);
            info!(
                pool_id = %self.id(),
                previous,
                limit = max_running_tasks,
                running = state.gate.running(),
                "concurrency limit changed"
            );
        });
    }

    /// Current concurrency limit.
    #[must_use]
    pub fn get_max_running_tasks(&self) -> usize {
        self.inner.state.lock().gate.limit()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle
    }

    /// Whether units are being admitted or still running.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.lifecycle().is_active()
    }

    /// Snapshot every counter at once.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            id: self.inner.id,
            run: state.run,
            lifecycle: state.lifecycle,
            max_running_tasks: state.gate.limit(),
            queued: state.backlog.len(),
            running: state.gate.running(),
            done: state.done_count,
            exceptions: state.exception_count,
            peak_running: state.gate.peak(),
            idle_workers: state.idle_workers,
        }
    }

    /// Observe every finished unit.
    pub fn on_task_done<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Self, &TaskDoneEvent) + Send + Sync + 'static,
    {
        self.inner.events.on_task_done(Arc::new(handler))
    }

    /// Observe every failed unit.
    pub fn on_task_exception<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Self, &TaskExceptionEvent) + Send + Sync + 'static,
    {
        self.inner.events.on_task_exception(Arc::new(handler))
    }

    /// Observe the end of a run.
    pub fn on_all_done<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Self, &AllDoneEvent) + Send + Sync + 'static,
    {
        self.inner.events.on_all_done(Arc::new(handler))
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// Block the calling thread until the current run's `AllDone` has been
    /// delivered to observers, and return it.
    ///
    /// Must not be called from an observer: observers run on the thread
    /// that delivers `AllDone`.
    ///
    /// # Errors
    ///
    /// Returns `PoolerError::Timeout` if the run does not finish in time.
    pub fn wait_all_done(&self, timeout: Duration) -> Result<AllDoneEvent, PoolerError> {
        let run = self.inner.state.lock().run;
        self.inner.events.wait_all_done(run, timeout)
    }

    /// Read the locked state without triggering admission.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&PoolState<B>) -> R) -> R {
        f(&self.inner.state.lock())
    }

    /// Run `f` on the locked state, then admit queued work and settle the
    /// lifecycle in the same critical section. Worker threads needed for
    /// the admitted units are started after the lock is released.
    pub(crate) fn transact<R>(&self, f: impl FnOnce(&mut PoolState<B>) -> R) -> R {
        let (result, spawn) = {
            let mut state = self.inner.state.lock();
            let result = f(&mut state);
            let spawn = self.admit(&mut state);
            self.settle(&mut state);
            (result, spawn)
        };
        self.spawn_workers(spawn);
        result
    }

    /// Run a unit on the current (worker) thread and record the outcome.
    pub(crate) fn execute(&self, unit: TaskUnit<B>) {
        let index = unit.index;
        debug!(pool_id = %self.id(), index, "task started");
        let outcome = unit.run(self);
        self.transact(|state| {
            state.idle_workers += 1;
            self.record_completion(state, index, outcome);
        });
    }

    /// Called by a worker whose idle timeout expired. Hands back a unit if
    /// one arrived in the meantime; otherwise the worker is deregistered.
    pub(crate) fn retire_idle_worker(&self) -> Option<TaskUnit<B>> {
        let mut state = self.inner.state.lock();
        let unit = self.inner.workers.reclaim();
        if unit.is_none() {
            state.idle_workers = state.idle_workers.saturating_sub(1);
        }
        unit
    }

    /// Move units from the backlog to the workers while the gate has room.
    /// Returns how many new worker threads are needed.
    fn admit(&self, state: &mut PoolState<B>) -> usize {
        if !state.lifecycle.is_active() {
            return 0;
        }
        let mut spawn = 0;
        while !state.backlog.is_empty() && state.gate.try_acquire() {
            let Some(unit) = state.backlog.pop() else {
                state.gate.release();
                break;
            };
            let index = unit.index;
            if state.idle_workers > 0 {
                state.idle_workers -= 1;
            } else {
                spawn += 1;
            }
            self.inner.workers.dispatch(unit);
            debug!(
                pool_id = %self.id(),
                index,
                running = state.gate.running(),
                limit = state.gate.limit(),
                "task admitted"
            );
        }
        spawn
    }

    /// Apply lifecycle transitions implied by the current counters.
    fn settle(&self, state: &mut PoolState<B>) {
        if !state.lifecycle.is_active() {
            return;
        }
        if !state.backlog.is_empty() {
            if state.lifecycle == Lifecycle::Draining {
                state.lifecycle = Lifecycle::Processing;
                debug!(pool_id = %self.id(), "draining -> processing");
            }
            return;
        }
        if state.gate.running() > 0 {
            if state.lifecycle == Lifecycle::Processing {
                state.lifecycle = Lifecycle::Draining;
                debug!(
                    pool_id = %self.id(),
                    running = state.gate.running(),
                    "processing -> draining"
                );
            }
            return;
        }
        self.fire_all_done(state);
    }

    fn fire_all_done(&self, state: &mut PoolState<B>) {
        debug_assert!(!state.all_done_fired, "AllDone fired twice in run {}", state.run);
        if state.all_done_fired {
            error!(pool_id = %self.id(), run = state.run, "AllDone already fired for this run");
            return;
        }
        debug_assert_eq!(state.exceptions.len(), state.exception_count);

        state.all_done_fired = true;
        state.lifecycle = Lifecycle::Done;
        info!(
            pool_id = %self.id(),
            run = state.run,
            done = state.done_count,
            exceptions = state.exception_count,
            peak_running = state.gate.peak(),
            "all tasks done"
        );
        self.inner.events.emit(PoolEvent::AllDone(AllDoneEvent {
            run: state.run,
            peak_running_count: state.gate.peak(),
            done_count: state.done_count,
            exceptions: state.exceptions.clone(),
        }));
    }

    /// Release the unit's slot, update counters and queue its events.
    fn record_completion(
        &self,
        state: &mut PoolState<B>,
        index: usize,
        outcome: Result<(), TaskFailure>,
    ) {
        state.gate.release();
        state.done_count += 1;
        let succeeded = outcome.is_ok();
        if let Err(failure) = outcome {
            warn!(pool_id = %self.id(), index, error = %failure, "task failed");
            let record = ExceptionRecord::new(failure);
            state.exception_count += 1;
            state.exceptions.push(record.clone());
            self.inner
                .events
                .emit(PoolEvent::TaskException(TaskExceptionEvent { record }));
        } else {
            debug!(pool_id = %self.id(), index, "task finished");
        }
        self.inner.events.emit(PoolEvent::TaskDone(TaskDoneEvent {
            index,
            succeeded,
            running_count: state.gate.running(),
            done_count: state.done_count,
        }));
    }

    /// Start `count` worker threads. A unit whose worker cannot be started
    /// is taken back and recorded as a failure.
    fn spawn_workers(&self, mut count: usize) {
        while count > 0 {
            count -= 1;
            let Err(err) = self.inner.workers.spawn(self) else {
                continue;
            };
            error!(pool_id = %self.id(), error = %err, "failed to spawn worker thread");

            let mut state = self.inner.state.lock();
            if let Some(unit) = self.inner.workers.reclaim() {
                let index = unit.index;
                let failure = TaskFailure::Dispatch {
                    index,
                    message: err.to_string(),
                };
                self.record_completion(&mut state, index, Err(failure));
                count += self.admit(&mut state);
                self.settle(&mut state);
            }
        }
    }
}
