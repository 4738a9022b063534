//! Facade that composes the three components and publishes job transitions.

use chrono::Utc;
use kernel_core::{Job, JobEvent, JobId, JobSpec};

use crate::config::{ConfigError, KernelConfig};
use crate::{EventBus, FailOutcome, JobQueue, SessionManager};

/// Emitter tag used for job lifecycle events.
pub const KERNEL_EMITTER: &str = "kernel";

/// One independent queue, bus and session store.
///
/// The job operations here mirror [`JobQueue`] and, when
/// `publish_job_events` is enabled, publish the matching [`JobEvent`] on the
/// bus after the queue has changed. Use [`Kernel::queue`] to bypass
/// publication.
///
/// Events are published after the queue lock is released, so subscribers may
/// call back into the kernel. Per job, events reach the bus in lifecycle order
/// as long as each transition is driven by the caller that observed the
/// previous one. When one thread enqueues while another dequeues, the other
/// thread's `job.started` can be published before this thread's
/// `job.submitted`. Order by the event `timestamp`, not by history position:
/// submit, start and completion times come from the job snapshot taken under
/// the queue lock.
#[derive(Debug)]
pub struct Kernel {
    queue: JobQueue,
    bus: EventBus,
    sessions: SessionManager,
    publish_job_events: bool,
}

impl Default for Kernel {
    fn default() -> Self {
        Self {
            queue: JobQueue::default(),
            bus: EventBus::default(),
            sessions: SessionManager::default(),
            publish_job_events: KernelConfig::default().publish_job_events,
        }
    }
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            queue: JobQueue::new(config.queue)?,
            bus: EventBus::new(config.bus)?,
            sessions: SessionManager::new(config.sessions)?,
            publish_job_events: config.publish_job_events,
        })
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn enqueue(&self, spec: JobSpec) -> JobId {
        let job = self.queue.enqueue_snapshot(spec);
        let job_id = job.id;
        self.emit(JobEvent::Submitted {
            job_id,
            kind: job.kind,
            priority: job.priority,
            timestamp: job.created_at,
        });
        job_id
    }

    pub fn dequeue(&self) -> Option<Job> {
        let job = self.queue.dequeue()?;
        self.emit(JobEvent::Started {
            job_id: job.id,
            attempt: job.attempts,
            timestamp: job.updated_at,
        });
        Some(job)
    }

    pub fn complete(&self, job_id: JobId, result: serde_json::Value) -> bool {
        let Some(job) = self.queue.complete_snapshot(job_id, result) else {
            return false;
        };
        self.emit(JobEvent::Completed {
            job_id,
            attempts: job.attempts,
            timestamp: job.updated_at,
        });
        true
    }

    pub fn fail(&self, job_id: JobId, reason: impl Into<String>) -> FailOutcome {
        let reason = reason.into();
        let outcome = self.queue.fail(job_id, reason.clone());
        let timestamp = Utc::now();
        match outcome {
            FailOutcome::Requeued { attempts } => self.emit(JobEvent::Requeued {
                job_id,
                error: reason,
                attempts,
                timestamp,
            }),
            FailOutcome::Exhausted { attempts } => self.emit(JobEvent::Failed {
                job_id,
                error: reason,
                attempts,
                timestamp,
            }),
            FailOutcome::NotInFlight => {}
        }
        outcome
    }

    pub fn cancel(&self, job_id: JobId) -> bool {
        let canceled = self.queue.cancel(job_id);
        if canceled {
            self.emit(JobEvent::Canceled {
                job_id,
                timestamp: Utc::now(),
            });
        }
        canceled
    }

    fn emit(&self, event: JobEvent) {
        if !self.publish_job_events {
            return;
        }
        let topic = event.topic();
        match serde_json::to_value(&event) {
            Ok(payload) => {
                self.bus.publish(topic, payload, Some(KERNEL_EMITTER));
            }
            Err(e) => tracing::warn!("Failed to encode {}: {}", event.description(), e),
        }
    }
}
