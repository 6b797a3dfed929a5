//! Scheduler core: task units, the concurrency gate, backlogs, events and
//! the pools built from them.

pub mod backlog;
pub mod error;
pub mod events;
pub mod gate;
pub mod pool;
pub mod pooler;
pub mod repeater;
pub mod task;
mod worker;

pub use backlog::{Backlog, RepeatBatch, TaskQueue};
pub use error::{AppResult, PoolerError, TaskFailure};
pub use events::{AllDoneEvent, SubscriptionId, TaskDoneEvent, TaskExceptionEvent};
pub use gate::ConcurrencyGate;
pub use pool::{Lifecycle, Pool, PoolStats};
pub use pooler::Pooler;
pub use repeater::Repeater;
pub use task::{current_task_index, ExceptionRecord, TaskAction, TaskPriority, TaskUnit};
