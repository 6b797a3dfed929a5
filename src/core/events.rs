//! Event bus delivering task and lifecycle notifications to observers.
//!
//! The pool pushes events into a channel while it still holds its state
//! lock, so channel order matches the order in which state changed. A
//! dedicated dispatcher thread drains the channel and calls observers with
//! no pool lock held; observers may call back into the pool.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error};

use super::task::panic_message;
use super::{Backlog, ExceptionRecord, Pool, PoolerError, TaskFailure};
use crate::core::pool::PoolInner;

/// A task returned control, successfully or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskDoneEvent {
    /// Index of the finished task.
    pub index: usize,
    /// Whether the task finished without error.
    pub succeeded: bool,
    /// Tasks still running right after this one finished.
    pub running_count: usize,
    /// Tasks finished so far in this run, including this one.
    pub done_count: usize,
}

/// A task failed. Delivered before the matching [`TaskDoneEvent`].
#[derive(Debug, Clone)]
pub struct TaskExceptionEvent {
    /// The captured failure.
    pub record: ExceptionRecord,
}

impl TaskExceptionEvent {
    /// The failure itself.
    #[must_use]
    pub fn error(&self) -> &TaskFailure {
        &self.record.error
    }
}

/// Every task of a run has finished. Delivered exactly once per run, after
/// all other events of that run.
#[derive(Debug, Clone)]
pub struct AllDoneEvent {
    /// Run number; starts at 0 and grows each time a repeater is re-armed.
    pub run: u64,
    /// Highest number of tasks that ran at the same time.
    pub peak_running_count: usize,
    /// Number of tasks that finished.
    pub done_count: usize,
    /// Every failure of the run, in completion order.
    pub exceptions: Vec<ExceptionRecord>,
}

impl AllDoneEvent {
    /// Number of failed tasks.
    #[must_use]
    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }
}

/// Handle returned by observer registration; pass to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub(crate) enum PoolEvent {
    TaskDone(TaskDoneEvent),
    TaskException(TaskExceptionEvent),
    AllDone(AllDoneEvent),
}

type Handler<B, E> = Arc<dyn Fn(&Pool<B>, &E) + Send + Sync>;

struct Observers<B> {
    next_id: u64,
    task_done: Vec<(SubscriptionId, Handler<B, TaskDoneEvent>)>,
    task_exception: Vec<(SubscriptionId, Handler<B, TaskExceptionEvent>)>,
    all_done: Vec<(SubscriptionId, Handler<B, AllDoneEvent>)>,
}

impl<B> Default for Observers<B> {
    fn default() -> Self {
        Self {
            next_id: 0,
            task_done: Vec::new(),
            task_exception: Vec::new(),
            all_done: Vec::new(),
        }
    }
}

impl<B> Observers<B> {
    fn next_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Latest delivered `AllDone`, used by blocking waiters.
#[derive(Default)]
struct Completion {
    delivered: Option<AllDoneEvent>,
}

/// Observer registry plus the sending half of the dispatch channel.
pub(crate) struct EventBus<B> {
    observers: Arc<RwLock<Observers<B>>>,
    tx: Sender<PoolEvent>,
    completion: Arc<(Mutex<Completion>, Condvar)>,
}

/// Everything the dispatcher thread needs, handed over once the pool
/// itself exists.
pub(crate) struct Dispatcher<B> {
    rx: Receiver<PoolEvent>,
    observers: Arc<RwLock<Observers<B>>>,
    completion: Arc<(Mutex<Completion>, Condvar)>,
}

impl<B> EventBus<B> {
    pub(crate) fn new() -> (Self, Dispatcher<B>) {
        let (tx, rx) = unbounded();
        let observers = Arc::new(RwLock::new(Observers::default()));
        let completion = Arc::new((Mutex::new(Completion::default()), Condvar::new()));
        let dispatcher = Dispatcher {
            rx,
            observers: Arc::clone(&observers),
            completion: Arc::clone(&completion),
        };
        (
            Self {
                observers,
                tx,
                completion,
            },
            dispatcher,
        )
    }

    /// Queue an event for delivery. Called with the pool lock held.
    pub(crate) fn emit(&self, event: PoolEvent) {
        // The dispatcher only stops once the pool is gone.
        if self.tx.send(event).is_err() {
            debug!("event dispatcher gone; dropping event");
        }
    }

    pub(crate) fn on_task_done(&self, handler: Handler<B, TaskDoneEvent>) -> SubscriptionId {
        let mut observers = self.observers.write();
        let id = observers.next_id();
        observers.task_done.push((id, handler));
        id
    }

    pub(crate) fn on_task_exception(
        &self,
        handler: Handler<B, TaskExceptionEvent>,
    ) -> SubscriptionId {
        let mut observers = self.observers.write();
        let id = observers.next_id();
        observers.task_exception.push((id, handler));
        id
    }

    pub(crate) fn on_all_done(&self, handler: Handler<B, AllDoneEvent>) -> SubscriptionId {
        let mut observers = self.observers.write();
        let id = observers.next_id();
        observers.all_done.push((id, handler));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before =
            observers.task_done.len() + observers.task_exception.len() + observers.all_done.len();
        observers.task_done.retain(|(sid, _)| *sid != id);
        observers.task_exception.retain(|(sid, _)| *sid != id);
        observers.all_done.retain(|(sid, _)| *sid != id);
        let after =
            observers.task_done.len() + observers.task_exception.len() + observers.all_done.len();
        before != after
    }

    /// Block until `AllDone` for `run` (or a later run) has been delivered.
    pub(crate) fn wait_all_done(
        &self,
        run: u64,
        timeout: Duration,
    ) -> Result<AllDoneEvent, PoolerError> {
        let deadline = Instant::now() + timeout;
        let (lock, condvar) = self.completion.as_ref();
        let mut completion = lock.lock();
        loop {
            if let Some(event) = completion.delivered.as_ref().filter(|e| e.run >= run) {
                return Ok(event.clone());
            }
            if condvar.wait_until(&mut completion, deadline).timed_out() {
                return completion
                    .delivered
                    .as_ref()
                    .filter(|e| e.run >= run)
                    .cloned()
                    .ok_or(PoolerError::Timeout);
            }
        }
    }
}

impl<B: Backlog> Dispatcher<B> {
    /// Start the dispatcher thread. It holds only a weak reference to the
    /// pool and exits when the pool (and with it the sender) is dropped.
    pub(crate) fn spawn(self, pool: Weak<PoolInner<B>>, name: String) -> std::io::Result<()> {
        thread::Builder::new().name(name).spawn(move || {
            debug!("event dispatcher started");
            while let Ok(event) = self.rx.recv() {
                let Some(inner) = pool.upgrade() else {
                    break;
                };
                self.deliver(&Pool::from_inner(inner), &event);
            }
            debug!("event dispatcher exiting");
        })?;
        Ok(())
    }

    fn deliver(&self, pool: &Pool<B>, event: &PoolEvent) {
        match event {
            PoolEvent::TaskDone(e) => {
                let handlers = snapshot(&self.observers.read().task_done);
                notify_all(&handlers, pool, e, "task_done");
            }
            PoolEvent::TaskException(e) => {
                let handlers = snapshot(&self.observers.read().task_exception);
                notify_all(&handlers, pool, e, "task_exception");
            }
            PoolEvent::AllDone(e) => {
                let handlers = snapshot(&self.observers.read().all_done);
                notify_all(&handlers, pool, e, "all_done");
                let (lock, condvar) = self.completion.as_ref();
                lock.lock().delivered = Some(e.clone());
                condvar.notify_all();
            }
        }
    }
}

fn snapshot<H: Clone>(entries: &[(SubscriptionId, H)]) -> Vec<H> {
    entries.iter().map(|(_, h)| h.clone()).collect()
}

fn notify_all<B, E>(handlers: &[Handler<B, E>], pool: &Pool<B>, event: &E, kind: &'static str) {
    for handler in handlers {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(pool, event))) {
            error!(
                pool_id = %pool.id(),
                event = kind,
                panic = %panic_message(payload.as_ref()),
                "observer panicked"
            );
        }
    }
}
