//! Configuration models for pools and their worker threads.

pub mod pool;

pub use pool::PoolerConfig;
