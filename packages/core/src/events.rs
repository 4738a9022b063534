//! Event types for publish/subscribe notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, Priority, SubscriptionId};

/// Emitter tag recorded when a publisher does not name itself.
pub const DEFAULT_EMITTER: &str = "system";

/// Owner tag recorded when a subscriber does not name itself.
pub const DEFAULT_OWNER: &str = "anon";

/// Topic names for job lifecycle events.
pub mod topics {
    pub const JOB_SUBMITTED: &str = "job.submitted";
    pub const JOB_STARTED: &str = "job.started";
    pub const JOB_COMPLETED: &str = "job.completed";
    pub const JOB_REQUEUED: &str = "job.requeued";
    pub const JOB_FAILED: &str = "job.failed";
    pub const JOB_CANCELED: &str = "job.canceled";

    /// Every job lifecycle topic, in lifecycle order.
    pub const ALL_JOB_TOPICS: [&str; 6] = [
        JOB_SUBMITTED,
        JOB_STARTED,
        JOB_COMPLETED,
        JOB_REQUEUED,
        JOB_FAILED,
        JOB_CANCELED,
    ];
}

/// A subscriber callback that reported an error or panicked during delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub subscription_id: SubscriptionId,
    pub owner: String,
    pub error: String,
}

/// History entry appended after every publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_name: String,
    pub payload: serde_json::Value,
    pub emitter: String,
    pub timestamp: DateTime<Utc>,
    /// Handlers that returned successfully.
    pub delivered_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DeliveryFailure>,
}

/// Job lifecycle transitions published by the kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A new job entered the pending set.
    Submitted {
        job_id: JobId,
        kind: String,
        priority: Priority,
        timestamp: DateTime<Utc>,
    },
    /// A job was dequeued for execution.
    Started {
        job_id: JobId,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    Completed {
        job_id: JobId,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
    /// A failed attempt was put back in the pending set.
    Requeued {
        job_id: JobId,
        error: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
    /// A job exhausted its attempts.
    Failed {
        job_id: JobId,
        error: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
    Canceled {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Topic this event is published under.
    pub fn topic(&self) -> &'static str {
        match self {
            JobEvent::Submitted { .. } => topics::JOB_SUBMITTED,
            JobEvent::Started { .. } => topics::JOB_STARTED,
            JobEvent::Completed { .. } => topics::JOB_COMPLETED,
            JobEvent::Requeued { .. } => topics::JOB_REQUEUED,
            JobEvent::Failed { .. } => topics::JOB_FAILED,
            JobEvent::Canceled { .. } => topics::JOB_CANCELED,
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Submitted { job_id, .. }
            | JobEvent::Started { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Requeued { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Canceled { job_id, .. } => *job_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::Submitted { timestamp, .. }
            | JobEvent::Started { timestamp, .. }
            | JobEvent::Completed { timestamp, .. }
            | JobEvent::Requeued { timestamp, .. }
            | JobEvent::Failed { timestamp, .. }
            | JobEvent::Canceled { timestamp, .. } => *timestamp,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::Submitted {
                job_id,
                kind,
                priority,
                ..
            } => format!("Job {} ({}, {}) submitted", job_id, kind, priority),
            JobEvent::Started {
                job_id, attempt, ..
            } => format!("Job {} started (attempt {})", job_id, attempt),
            JobEvent::Completed {
                job_id, attempts, ..
            } => format!("Job {} completed after {} attempt(s)", job_id, attempts),
            JobEvent::Requeued { job_id, error, .. } => {
                format!("Job {} failed: {} (will retry)", job_id, error)
            }
            JobEvent::Failed {
                job_id,
                error,
                attempts,
                ..
            } => format!("Job {} failed after {} attempt(s): {}", job_id, attempts, error),
            JobEvent::Canceled { job_id, .. } => format!("Job {} canceled", job_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_match_variants() {
        let job_id = JobId::new();
        let now = Utc::now();
        let events = [
            JobEvent::Submitted {
                job_id,
                kind: "ingest".into(),
                priority: Priority::High,
                timestamp: now,
            },
            JobEvent::Started {
                job_id,
                attempt: 1,
                timestamp: now,
            },
            JobEvent::Completed {
                job_id,
                attempts: 1,
                timestamp: now,
            },
            JobEvent::Requeued {
                job_id,
                error: "boom".into(),
                attempts: 1,
                timestamp: now,
            },
            JobEvent::Failed {
                job_id,
                error: "boom".into(),
                attempts: 3,
                timestamp: now,
            },
            JobEvent::Canceled {
                job_id,
                timestamp: now,
            },
        ];

        let observed: Vec<&str> = events.iter().map(JobEvent::topic).collect();
        assert_eq!(observed, topics::ALL_JOB_TOPICS);
        assert!(events.iter().all(|e| e.job_id() == job_id));
    }

    #[test]
    fn serializes_with_event_tag() {
        let event = JobEvent::Canceled {
            job_id: JobId::new(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "canceled");
        assert!(event.description().ends_with("canceled"));
    }
}
