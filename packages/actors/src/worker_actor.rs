//! Worker actor for executing jobs.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use kernel::{FailOutcome, Kernel};
use kernel_core::Job;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use records::repositories::JobRepository;

use crate::handler::JobHandlerRegistry;
use crate::messages::{ActorError, WorkerMessage};

/// State for the worker actor.
pub struct WorkerActorState {
    pub worker_id: String,
    kernel: Arc<Kernel>,
    handlers: Arc<JobHandlerRegistry>,
    repository: Option<JobRepository>,
    job_timeout: Duration,
    /// Jobs finished by this worker.
    pub processed: u64,
    /// Whether the worker should continue running.
    pub running: bool,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub kernel: Arc<Kernel>,
    pub handlers: Arc<JobHandlerRegistry>,
    pub repository: Option<JobRepository>,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
}

/// Worker actor that executes jobs.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        // Start the work loop
        let myself_clone = myself.clone();
        let poll_interval = args.poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                if myself_clone.send_message(WorkerMessage::Heartbeat).is_err() {
                    break;
                }
            }
        });

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            kernel: args.kernel,
            handlers: args.handlers,
            repository: args.repository,
            job_timeout: args.job_timeout,
            processed: 0,
            running: true,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Heartbeat => {
                if !state.running {
                    myself.stop(None);
                    return Ok(());
                }
                if let Some(job) = state.kernel.dequeue() {
                    process(state, job).await;
                }
            }

            WorkerMessage::Processed { reply } => {
                let _ = reply.send(state.processed);
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                state.running = false;
                myself.stop(None);
            }
        }

        Ok(())
    }
}

/// Run one dequeued job to a report on the queue.
async fn process(state: &mut WorkerActorState, job: Job) {
    tracing::debug!(
        "Worker {} running job {} ({}), attempt {}",
        state.worker_id,
        job.id,
        job.kind,
        job.attempts
    );

    match execute(&state.handlers, &job, state.job_timeout).await {
        Ok(result) => {
            state.kernel.complete(job.id, result);
        }
        Err(error) => {
            tracing::warn!("Job {} ({}) failed: {}", job.id, job.kind, error);
            if let FailOutcome::Exhausted { attempts } = state.kernel.fail(job.id, error.to_string())
            {
                tracing::info!("Job {} gave up after {} attempts", job.id, attempts);
            }
        }
    }
    state.processed += 1;

    if let Some(repository) = &state.repository
        && let Some(snapshot) = state.kernel.queue().status(job.id)
        && let Err(e) = repository.save(&snapshot).await
    {
        tracing::warn!("Failed to persist job {}: {}", job.id, e);
    }
}

/// Run the handler for the job's kind, turning timeouts and panics into errors.
async fn execute(
    handlers: &JobHandlerRegistry,
    job: &Job,
    timeout: Duration,
) -> Result<serde_json::Value, ActorError> {
    let handler = handlers
        .get(&job.kind)
        .ok_or_else(|| ActorError::NoHandler(job.kind.clone()))?;

    let future = std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle(job)))
        .map_err(|panic| ActorError::Panicked(panic_message(panic.as_ref())))?;

    match tokio::time::timeout(timeout, AssertUnwindSafe(future).catch_unwind()).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(error))) => Err(ActorError::Handler(error)),
        Ok(Err(panic)) => Err(ActorError::Panicked(panic_message(panic.as_ref()))),
        Err(_) => Err(ActorError::Timeout(timeout)),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
