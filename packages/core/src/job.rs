//! Job domain types for scheduled work items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Priority tier for job execution order.
///
/// Ordering follows precedence: `Critical > High > Normal > Low`. Conversion
/// from a string is lenient and maps anything unrecognized to `Normal`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    /// Dequeue rank, lower dequeues first (critical = 0, low = 3).
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl From<&str> for Priority {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Priority::Critical,
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

impl From<String> for Priority {
    fn from(value: String) -> Self {
        Priority::from(value.as_str())
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a job.
///
/// ```text
/// submitted -> working -> completed
/// working -> submitted            (failed, attempts remain)
/// working -> failed               (failed, attempts exhausted)
/// submitted | working -> canceled
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the pending set.
    #[default]
    Submitted,
    /// Handed out by `dequeue` and not yet reported.
    Working,
    Completed,
    Failed,
    Canceled,
}

impl JobState {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Canceled
        )
    }

    /// Get a simple state string for display and filtering.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Working => "working",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to enqueue a job.
///
/// Unset fields fall back to the queue's defaults when enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Task-type tag, opaque to the queue.
    pub kind: String,
    /// Payload passed through untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl JobSpec {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            priority: None,
            max_attempts: None,
        }
    }

    /// Set the priority for this job.
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Set the attempt ceiling for this job.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// A job represents a unit of work tracked by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Type of job (used for routing to handlers).
    pub kind: String,
    /// Job payload as JSON.
    pub payload: serde_json::Value,
    /// Execution priority.
    pub priority: Priority,
    /// Current lifecycle state.
    pub state: JobState,
    /// Number of dequeues so far.
    #[serde(default)]
    pub attempts: u32,
    /// Attempt ceiling before the job fails terminally.
    pub max_attempts: u32,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job last changed state.
    pub updated_at: DateTime<Utc>,
    /// Reason given by the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Output stored on completion. A job completed with `null` keeps `Some(Null)`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub result: Option<serde_json::Value>,
}

/// A field that is present is `Some`, even when it holds `null`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl Job {
    /// Create a new submitted job from a spec, resolving defaults.
    pub fn from_spec(spec: JobSpec, default_max_attempts: u32) -> Self {
        let now = Utc::now();
        let max_attempts = spec
            .max_attempts
            .filter(|n| *n > 0)
            .unwrap_or(default_max_attempts);
        Self {
            id: JobId::new(),
            kind: spec.kind,
            payload: spec.payload,
            priority: spec.priority.unwrap_or_default(),
            state: JobState::Submitted,
            attempts: 0,
            max_attempts,
            created_at: now,
            updated_at: now,
            last_error: None,
            result: None,
        }
    }

    /// Whether another failure would still be retried.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub(crate) fn touch(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Mark the job as handed to a worker.
    pub fn mark_working(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
        self.touch(JobState::Working);
    }

    /// Mark the job as resubmitted after a failed attempt.
    pub fn mark_requeued(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
        self.touch(JobState::Submitted);
    }

    pub fn mark_completed(&mut self, result: serde_json::Value) {
        self.result = Some(result);
        self.touch(JobState::Completed);
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
        self.touch(JobState::Failed);
    }

    pub fn mark_canceled(&mut self) {
        self.touch(JobState::Canceled);
    }
}
