//! Concurrent report harvesting.
//!
//! Two levels of bounded fan-out: the [`Orchestrator`] runs one
//! [`SubjectWorker`] per subject, and each worker runs one report task
//! per report kind. Every report task settles to a table, so failures
//! stay local to the (subject, report) pair that hit them.

pub mod orchestrator;
pub mod report_task;
pub mod subject_worker;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::Orchestrator;
pub use subject_worker::SubjectWorker;

use std::time::Duration;

/// Pool and deadline settings for a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Deadline for a single report fetch.
    pub task_timeout: Duration,
    /// Cap on concurrently running subjects (unset = one slot per subject).
    pub subject_concurrency: Option<usize>,
    /// Cap on concurrently running reports per subject (unset = one slot per kind).
    pub report_concurrency: Option<usize>,
    /// Draw a progress bar advanced once per completed subject.
    pub show_progress: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(2),
            subject_concurrency: None,
            report_concurrency: None,
            show_progress: false,
        }
    }
}

impl From<&crate::config::Config> for HarvestConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            task_timeout: Duration::from_secs_f64(config.fetch.task_timeout_seconds),
            subject_concurrency: config.pool.subject_concurrency,
            report_concurrency: config.pool.report_concurrency,
            show_progress: false,
        }
    }
}

/// Pool width for `requested` jobs under an optional cap, never below one.
pub(crate) fn pool_width(requested: usize, cap: Option<usize>) -> usize {
    cap.map_or(requested, |c| c.min(requested)).max(1)
}
