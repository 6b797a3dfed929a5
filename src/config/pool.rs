//! Pool configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest stack size accepted for worker threads.
pub const MIN_THREAD_STACK_SIZE: usize = 64 * 1024;

/// Environment variable holding the initial concurrency limit.
pub const ENV_MAX_RUNNING_TASKS: &str = "POOLER_MAX_RUNNING_TASKS";
/// Environment variable holding the worker idle timeout in milliseconds.
pub const ENV_IDLE_TIMEOUT_MS: &str = "POOLER_IDLE_TIMEOUT_MS";
/// Environment variable holding the worker stack size in bytes.
pub const ENV_THREAD_STACK_SIZE: &str = "POOLER_THREAD_STACK_SIZE";
/// Environment variable enabling re-arming of finished repeaters.
pub const ENV_RE_ARM: &str = "POOLER_RE_ARM";

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolerConfig {
    /// Initial number of tasks allowed to execute at the same time.
    #[serde(default = "default_max_running_tasks")]
    pub max_running_tasks: usize,
    /// How long an idle worker thread waits for work before exiting.
    #[serde(default = "default_worker_idle_timeout_ms")]
    pub worker_idle_timeout_ms: u64,
    /// Stack size for worker threads in bytes.
    #[serde(default = "default_thread_stack_size")]
    pub thread_stack_size: usize,
    /// Prefix for worker and dispatcher thread names.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// Whether a finished repeater may be armed again.
    #[serde(default)]
    pub re_arm: bool,
}

fn default_max_running_tasks() -> usize {
    num_cpus::get()
}

const fn default_worker_idle_timeout_ms() -> u64 {
    5_000
}

const fn default_thread_stack_size() -> usize {
    2 * 1024 * 1024
}

fn default_thread_name_prefix() -> String {
    "pooler".into()
}

impl Default for PoolerConfig {
    fn default() -> Self {
        Self {
            max_running_tasks: default_max_running_tasks(),
            worker_idle_timeout_ms: default_worker_idle_timeout_ms(),
            thread_stack_size: default_thread_stack_size(),
            thread_name_prefix: default_thread_name_prefix(),
            re_arm: false,
        }
    }
}

impl PoolerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial concurrency limit.
    #[must_use]
    pub const fn with_max_running_tasks(mut self, max_running_tasks: usize) -> Self {
        self.max_running_tasks = max_running_tasks;
        self
    }

    /// Set the worker idle timeout.
    #[must_use]
    pub fn with_worker_idle_timeout(mut self, timeout: Duration) -> Self {
        self.worker_idle_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Allow or forbid re-arming a finished repeater.
    #[must_use]
    pub const fn with_re_arm(mut self, re_arm: bool) -> Self {
        self.re_arm = re_arm;
        self
    }

    /// Worker idle timeout as a `Duration`.
    #[must_use]
    pub const fn worker_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_idle_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_idle_timeout_ms == 0 {
            return Err("worker_idle_timeout_ms must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_THREAD_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {MIN_THREAD_STACK_SIZE} bytes"
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `POOLER_*` environment variables, loading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a description of the first unparsable or invalid value.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = parse_var(&lookup, ENV_MAX_RUNNING_TASKS)? {
            cfg.max_running_tasks = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_IDLE_TIMEOUT_MS)? {
            cfg.worker_idle_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_THREAD_STACK_SIZE)? {
            cfg.thread_stack_size = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_RE_ARM)? {
            cfg.re_arm = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| format!("{key}={raw:?} is invalid: {e}"))
        })
        .transpose()
}
