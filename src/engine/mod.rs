// src/engine/mod.rs

//! Task execution engine for datamill.
//!
//! This module ties together:
//! - the loaded manifest and its target resolver
//! - the root namespace and per-target private namespaces
//! - the three fingerprint cache snapshots (live, initial, aggregate)
//! - the task data cache
//! - the handler table that performs the actual work
//!
//! The [`Environment`] is the entry point. Dependency resolution lives in
//! [`task`], staleness checks in [`staleness`], and cache lifecycle in
//! [`caches`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

pub mod caches;
pub mod environment;
pub mod namespaces;
pub mod staleness;
pub mod task;

pub use environment::Environment;

/// Shared handle for driving one environment from several threads.
///
/// Every operation on an [`Environment`] takes `&mut self`, so requests
/// from different threads are serialized by the mutex.
pub type SharedEnvironment = Arc<Mutex<Environment>>;

/// Outcome of one task execution.
///
/// `fresh == false` with `success == true` means the task was already
/// satisfied and no work was performed.
#[derive(Debug, Clone, Copy)]
pub struct TaskResult {
    pub success: bool,
    pub fresh: bool,
    pub duration: Duration,
}

impl TaskResult {
    pub fn new(success: bool, fresh: bool) -> Self {
        Self {
            success,
            fresh,
            duration: Duration::ZERO,
        }
    }

    /// Work was performed and succeeded.
    pub fn executed() -> Self {
        Self::new(true, true)
    }

    /// Nothing to do.
    pub fn satisfied() -> Self {
        Self::new(true, false)
    }

    pub fn failed() -> Self {
        Self::new(false, false)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// `(success, fresh)`, handy for assertions and logging.
    pub fn outcome(&self) -> (bool, bool) {
        (self.success, self.fresh)
    }
}
