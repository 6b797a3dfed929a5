//! # Pooler
//!
//! A bounded-concurrency task pool for in-process work.
//!
//! A pool accepts any number of independent units of work and executes at
//! most N of them at once on its own worker threads. N can be changed while
//! the pool is running. Every unit's success or failure is reported through
//! events, and a final summary is delivered once all work has finished.
//!
//! ## Key Features
//!
//! - **Live concurrency limit**: `set_max_running_tasks` takes effect
//!   immediately; lowering it never interrupts running units, and zero
//!   pauses admission
//! - **Failure isolation**: errors and panics in a unit are captured as
//!   `ExceptionRecord`s; sibling units and the pool keep going
//! - **Lifecycle events**: `TaskDone`, `TaskException` and `AllDone`, delivered
//!   in order on a dedicated dispatcher thread, outside the pool lock
//! - **Consistent counters**: one lock guards every counter, so `stats()` never
//!   shows a torn state
//! - **Two backlogs, one core**: `Pooler` runs individually added units by
//!   priority; `Repeater` runs one action a fixed number of times
//!
//! ## Pooler
//!
//! ```rust,ignore
//! use pooler::core::{Pooler, TaskPriority};
//! use std::time::Duration;
//!
//! let pool = Pooler::create_new(3)?;
//! pool.on_task_exception(|_, e| eprintln!("{}", e.error()));
//! pool.on_all_done(|_, e| println!("peak {}", e.peak_running_count));
//!
//! for i in 0..9 {
//!     pool.add(
//!         move |_| if i % 3 == 0 { anyhow::bail!("task {i} failed") } else { Ok(()) },
//!         false,
//!         TaskPriority::Normal,
//!     )?;
//! }
//! pool.start_processing();
//! pool.set_max_running_tasks(5);
//! let summary = pool.wait_all_done(Duration::from_secs(10))?;
//! assert_eq!(summary.exception_count(), 3);
//! ```
//!
//! ## Repeater
//!
//! ```rust,ignore
//! use pooler::core::{current_task_index, Repeater, TaskPriority};
//!
//! let pool = Repeater::create_new(5)?;
//! pool.set(|_| { let _i = current_task_index(); Ok(()) }, 50, TaskPriority::Normal)?;
//! pool.start_processing();
//! ```
//!
//! For complete examples, see:
//! - `tests/pooler_test.rs` - Scenario and invariant tests
//! - `tests/stress_test.rs` - Long run with limit changes mid-flight

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduler core: tasks, gate, backlogs, events and pools.
pub mod core;
/// Configuration models for pools.
pub mod config;
/// Shared utilities.
pub mod util;
