//! Backlog strategies feeding the scheduler core.
//!
//! [`TaskQueue`] holds heterogeneous units, ordered by priority and FIFO
//! within a priority. [`RepeatBatch`] holds one action and materializes a
//! fresh unit per repetition on demand.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use super::{TaskAction, TaskPriority, TaskUnit};

/// Source of pending work for a pool.
pub trait Backlog: Send + Sized + 'static {
    /// Take the next unit to run.
    fn pop(&mut self) -> Option<TaskUnit<Self>>;
    /// Number of units still pending.
    fn len(&self) -> usize;
    /// Whether nothing is pending.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Drop everything that is pending.
    fn clear(&mut self);
}

/// Heap entry ordering units by priority (highest first), then by
/// enqueue sequence (earliest first).
struct QueuedUnit {
    unit: TaskUnit<TaskQueue>,
}

impl PartialEq for QueuedUnit {
    fn eq(&self, other: &Self) -> bool {
        self.unit.index == other.unit.index
    }
}

impl Eq for QueuedUnit {}

impl PartialOrd for QueuedUnit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedUnit {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.unit.priority.cmp(&other.unit.priority) {
            // Reversed for the max-heap: lower index wins.
            Ordering::Equal => other.unit.index.cmp(&self.unit.index),
            other => other,
        }
    }
}

/// Priority backlog of individually added units.
#[derive(Default)]
pub struct TaskQueue {
    units: BinaryHeap<QueuedUnit>,
    next_index: usize,
}

impl TaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an action and return the index assigned to it.
    pub fn push(&mut self, action: TaskAction<Self>, priority: TaskPriority) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        self.units.push(QueuedUnit {
            unit: TaskUnit {
                index,
                action,
                is_repeating: false,
                priority,
            },
        });
        index
    }

    /// Total number of units ever enqueued.
    #[must_use]
    pub const fn enqueued(&self) -> usize {
        self.next_index
    }
}

impl Backlog for TaskQueue {
    fn pop(&mut self) -> Option<TaskUnit<Self>> {
        self.units.pop().map(|queued| queued.unit)
    }

    fn len(&self) -> usize {
        self.units.len()
    }

    fn clear(&mut self) {
        self.units.clear();
    }
}

/// A single action repeated `count` times with indices `0..count`.
#[derive(Default)]
pub struct RepeatBatch {
    action: Option<TaskAction<Self>>,
    priority: TaskPriority,
    count: usize,
    next_index: usize,
}

impl RepeatBatch {
    /// Replace the batch with `count` repetitions of `action`.
    pub fn arm(&mut self, action: TaskAction<Self>, count: usize, priority: TaskPriority) {
        self.action = Some(action);
        self.priority = priority;
        self.count = count;
        self.next_index = 0;
    }

    /// Number of repetitions in the armed batch.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Whether an action has been set.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.action.is_some()
    }
}

impl Backlog for RepeatBatch {
    fn pop(&mut self) -> Option<TaskUnit<Self>> {
        if self.next_index >= self.count {
            return None;
        }
        let action = Arc::clone(self.action.as_ref()?);
        let index = self.next_index;
        self.next_index += 1;
        Some(TaskUnit {
            index,
            action,
            is_repeating: true,
            priority: self.priority,
        })
    }

    fn len(&self) -> usize {
        if self.action.is_none() {
            return 0;
        }
        self.count - self.next_index
    }

    fn clear(&mut self) {
        self.next_index = self.count;
    }
}
