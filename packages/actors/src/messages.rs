//! Message types for actor communication.

use std::time::Duration;

use kernel_core::QueueMetrics;
use ractor::RpcReplyPort;

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Poll tick. An idle worker dequeues and runs one job.
    Heartbeat,

    /// Number of jobs this worker has finished, successfully or not.
    Processed { reply: RpcReplyPort<u64> },

    /// Shutdown the worker.
    Shutdown,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Current queue counters.
    GetMetrics { reply: RpcReplyPort<QueueMetrics> },

    /// Ids of the live workers.
    ListWorkers { reply: RpcReplyPort<Vec<String>> },

    /// Stop every worker, then the supervisor.
    Shutdown,

    /// Periodic tick for housekeeping.
    Tick,
}

/// Error type for actor operations.
///
/// Execution failures are rendered to strings and handed to the queue as the
/// job's failure reason.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("No handler for job kind: {0}")]
    NoHandler(String),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Handler(String),

    #[error("Failed to spawn actor: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("Record store error: {0}")]
    Records(#[from] records::RecordError),
}
