//! Priority job queue with explicit lifecycle states and bounded retry.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::RwLock;

use kernel_core::{Job, JobId, JobSpec, JobState, QueueMetrics};

use crate::config::{ConfigError, QueueConfig};
use crate::sync;

/// Outcome of reporting a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Attempts remained; the job is back in the pending set.
    Requeued { attempts: u32 },
    /// The attempt budget is spent; the job is terminally `failed`.
    Exhausted { attempts: u32 },
    /// The job was not in flight, nothing changed.
    NotInFlight,
}

impl FailOutcome {
    /// Whether the job was put back in the pending set.
    pub fn requeued(&self) -> bool {
        matches!(self, FailOutcome::Requeued { .. })
    }
}

/// Wrapper for priority queue ordering (higher priority first, then insertion order).
#[derive(Debug, Clone)]
struct PendingJob {
    seq: u64,
    job: Job,
}

impl PartialEq for PendingJob {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PendingJob {}

impl PartialOrd for PendingJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first
        match self.job.priority.cmp(&other.job.priority) {
            // Earlier submission first; seq is unique so this never ties
            Ordering::Equal => other.seq.cmp(&self.seq),
            other => other,
        }
    }
}

/// All three job sets live behind one lock so a move between sets is atomic.
#[derive(Debug, Default)]
struct QueueState {
    next_seq: u64,
    pending: BinaryHeap<PendingJob>,
    in_flight: HashMap<JobId, Job>,
    terminal: HashMap<JobId, Job>,
}

impl QueueState {
    fn push_pending(&mut self, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(PendingJob { seq, job });
    }

    fn take_pending(&mut self, job_id: JobId) -> Option<Job> {
        let mut found = None;
        self.pending.retain(|pj| {
            if pj.job.id == job_id {
                found = Some(pj.job.clone());
                false
            } else {
                true
            }
        });
        found
    }

    fn find_pending(&self, job_id: JobId) -> Option<&Job> {
        self.pending
            .iter()
            .map(|pj| &pj.job)
            .find(|job| job.id == job_id)
    }

    /// Pending jobs in the order `dequeue` would return them.
    fn pending_in_order(&self) -> Vec<&Job> {
        let mut pending: Vec<&PendingJob> = self.pending.iter().collect();
        pending.sort_by(|a, b| b.cmp(a));
        pending.into_iter().map(|pj| &pj.job).collect()
    }
}

/// Priority-ordered scheduler.
///
/// A job lives in exactly one of three sets: pending, in-flight or terminal.
/// Jobs of equal priority are released in submission order, including jobs
/// that come back after a failed attempt (they rejoin at the back of their tier).
#[derive(Debug)]
pub struct JobQueue {
    config: QueueConfig,
    state: RwLock<QueueState>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self {
            config: QueueConfig::default(),
            state: RwLock::new(QueueState::default()),
        }
    }
}

impl JobQueue {
    /// Create a queue, rejecting a malformed configuration.
    pub fn new(config: QueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: RwLock::new(QueueState::default()),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Add a job to the pending set and return its id.
    pub fn enqueue(&self, spec: JobSpec) -> JobId {
        self.enqueue_snapshot(spec).id
    }

    /// Add a job to the pending set and return the job as it was stored.
    pub(crate) fn enqueue_snapshot(&self, spec: JobSpec) -> Job {
        let job = Job::from_spec(spec, self.config.default_max_attempts);
        tracing::debug!(
            "Enqueued job {} ({}, priority {})",
            job.id,
            job.kind,
            job.priority
        );
        sync::write(&self.state).push_pending(job.clone());
        job
    }

    /// Release the highest-priority pending job, or `None` when nothing is pending.
    pub fn dequeue(&self) -> Option<Job> {
        let mut state = sync::write(&self.state);
        let mut job = state.pending.pop()?.job;
        job.mark_working();
        state.in_flight.insert(job.id, job.clone());
        tracing::debug!("Dequeued job {} (attempt {})", job.id, job.attempts);
        Some(job)
    }

    /// Record success for an in-flight job. Returns `false` if it was not in flight.
    pub fn complete(&self, job_id: JobId, result: serde_json::Value) -> bool {
        self.complete_snapshot(job_id, result).is_some()
    }

    /// Complete an in-flight job and return the snapshot taken under the lock.
    pub(crate) fn complete_snapshot(&self, job_id: JobId, result: serde_json::Value) -> Option<Job> {
        let mut state = sync::write(&self.state);
        let mut job = state.in_flight.remove(&job_id)?;
        job.mark_completed(result);
        state.terminal.insert(job_id, job.clone());
        tracing::debug!("Completed job {}", job_id);
        Some(job)
    }

    /// Record a failed attempt for an in-flight job.
    ///
    /// The job is requeued while `attempts < max_attempts`, otherwise it
    /// becomes terminally `failed` with `last_error` set.
    pub fn fail(&self, job_id: JobId, reason: impl Into<String>) -> FailOutcome {
        let reason = reason.into();
        let mut state = sync::write(&self.state);
        let Some(mut job) = state.in_flight.remove(&job_id) else {
            return FailOutcome::NotInFlight;
        };

        let attempts = job.attempts;
        if job.has_attempts_left() {
            tracing::debug!(
                "Job {} failed attempt {}/{}: {}",
                job_id,
                attempts,
                job.max_attempts,
                reason
            );
            job.mark_requeued(reason);
            state.push_pending(job);
            FailOutcome::Requeued { attempts }
        } else {
            tracing::info!(
                "Job {} exhausted {} attempt(s): {}",
                job_id,
                attempts,
                reason
            );
            job.mark_failed(reason);
            state.terminal.insert(job_id, job);
            FailOutcome::Exhausted { attempts }
        }
    }

    /// Cancel a pending or in-flight job.
    ///
    /// Returns `true` when this call moved the job to `canceled`; later calls
    /// and calls on unknown or terminal jobs return `false` and change nothing.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let mut state = sync::write(&self.state);
        let job = match state.take_pending(job_id) {
            Some(job) => Some(job),
            None => state.in_flight.remove(&job_id),
        };
        let Some(mut job) = job else {
            return false;
        };
        job.mark_canceled();
        state.terminal.insert(job_id, job);
        tracing::debug!("Canceled job {}", job_id);
        true
    }

    /// Snapshot of a job, searching pending, then in-flight, then terminal.
    pub fn status(&self, job_id: JobId) -> Option<Job> {
        let state = sync::read(&self.state);
        state
            .find_pending(job_id)
            .or_else(|| state.in_flight.get(&job_id))
            .or_else(|| state.terminal.get(&job_id))
            .cloned()
    }

    pub fn metrics(&self) -> QueueMetrics {
        let state = sync::read(&self.state);
        let mut metrics = QueueMetrics {
            pending: state.pending.len() as u64,
            in_flight: state.in_flight.len() as u64,
            terminal: state.terminal.len() as u64,
            ..Default::default()
        };
        for job in state.terminal.values() {
            match job.state {
                JobState::Completed => metrics.completed += 1,
                JobState::Failed => metrics.failed += 1,
                JobState::Canceled => metrics.canceled += 1,
                JobState::Submitted | JobState::Working => {}
            }
        }
        metrics
    }

    /// List job snapshots, optionally filtered by state.
    ///
    /// Pending jobs come first in dequeue order, then in-flight and terminal
    /// jobs by last update.
    pub fn list(&self, state_filter: Option<JobState>, limit: usize) -> Vec<Job> {
        let state = sync::read(&self.state);
        let mut settled: Vec<&Job> = state
            .in_flight
            .values()
            .chain(state.terminal.values())
            .collect();
        settled.sort_by_key(|job| job.updated_at);

        state
            .pending_in_order()
            .into_iter()
            .chain(settled)
            .filter(|job| state_filter.is_none_or(|s| job.state == s))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Drop every terminal job, returning how many were dropped.
    pub fn clear_terminal(&self) -> usize {
        let mut state = sync::write(&self.state);
        let cleared = state.terminal.len();
        state.terminal.clear();
        cleared
    }
}
