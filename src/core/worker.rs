//! Growable set of worker threads executing admitted task units.
//!
//! Admitted units travel over an unbounded channel. Units are only sent
//! while the pool lock is held, and idle workers are counted in the pool
//! state under the same lock, which keeps this relation true whenever the
//! lock is free:
//!
//! `idle_workers == workers waiting for a unit - units sitting in the channel`
//!
//! Admission reuses an idle worker when the count is positive and spawns a
//! new thread otherwise. A worker that stays idle past the configured
//! timeout retires. Workers only hold a weak reference to the pool: once
//! the last handle is dropped the sender goes away with it, waiting
//! workers see the channel disconnect, and units still queued are dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Weak;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::debug;
use uuid::Uuid;

use super::pool::PoolInner;
use super::{Backlog, Pool, TaskUnit};

pub(crate) struct WorkerSet<B> {
    tx: Sender<TaskUnit<B>>,
    rx: Receiver<TaskUnit<B>>,
    next_worker_id: AtomicUsize,
    idle_timeout: Duration,
    stack_size: usize,
    name_prefix: String,
}

impl<B> WorkerSet<B> {
    pub(crate) fn new(idle_timeout: Duration, stack_size: usize, name_prefix: String) -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            next_worker_id: AtomicUsize::new(0),
            idle_timeout,
            stack_size,
            name_prefix,
        }
    }

    /// Hand a unit to the workers. Must be called with the pool lock held.
    pub(crate) fn dispatch(&self, unit: TaskUnit<B>) {
        // `self.rx` keeps the channel connected for as long as the set exists.
        let _ = self.tx.send(unit);
    }

    /// Take back a unit nobody has picked up. Must be called with the pool
    /// lock held.
    pub(crate) fn reclaim(&self) -> Option<TaskUnit<B>> {
        self.rx.try_recv().ok()
    }
}

impl<B: Backlog> WorkerSet<B> {
    /// Start one more worker thread for `pool`.
    pub(crate) fn spawn(&self, pool: &Pool<B>) -> std::io::Result<()> {
        let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.rx.clone();
        let pool_id = pool.id();
        let pool = pool.downgrade();
        let idle_timeout = self.idle_timeout;

        thread::Builder::new()
            .name(format!("{}-worker-{worker_id}", self.name_prefix))
            .stack_size(self.stack_size)
            .spawn(move || worker_loop(pool_id, worker_id, &pool, &rx, idle_timeout))?;
        Ok(())
    }
}

fn worker_loop<B: Backlog>(
    pool_id: Uuid,
    worker_id: usize,
    pool: &Weak<PoolInner<B>>,
    rx: &Receiver<TaskUnit<B>>,
    idle_timeout: Duration,
) {
    debug!(%pool_id, worker_id, "worker started");
    loop {
        let received = rx.recv_timeout(idle_timeout);
        if matches!(received, Err(RecvTimeoutError::Disconnected)) {
            break;
        }
        let Some(pool) = pool.upgrade().map(Pool::from_inner) else {
            break;
        };
        let unit = match received {
            Ok(unit) => unit,
            Err(_) => {
                if let Some(unit) = pool.retire_idle_worker() {
                    unit
                } else {
                    debug!(%pool_id, worker_id, "worker idle, retiring");
                    break;
                }
            }
        };
        pool.execute(unit);
    }
    debug!(%pool_id, worker_id, "worker exiting");
}
