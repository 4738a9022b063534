//! Worker pool settings.

use std::time::Duration;

/// Sizing and timing for the supervisor's worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Workers spawned at start.
    pub worker_count: usize,
    /// Delay between an idle worker's dequeue attempts.
    pub poll_interval: Duration,
    /// Longest a single handler run may take before it counts as a failure.
    pub job_timeout: Duration,
    /// Period of the supervisor's housekeeping tick.
    pub tick_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            poll_interval: Duration::from_millis(100),
            job_timeout: Duration::from_secs(300),
            tick_interval: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }
}
