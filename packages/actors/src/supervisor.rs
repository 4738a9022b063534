//! Supervisor actor for the worker pool.

use std::sync::Arc;

use kernel::Kernel;
use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};
use records::repositories::JobRepository;

use crate::config::WorkerConfig;
use crate::handler::JobHandlerRegistry;
use crate::messages::{ActorError, SupervisorMessage, WorkerMessage};
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Supervisor start-up arguments.
pub struct SupervisorArgs {
    pub kernel: Arc<Kernel>,
    pub handlers: JobHandlerRegistry,
    pub config: WorkerConfig,
    /// When set, every worker saves a job snapshot after reporting it.
    pub repository: Option<JobRepository>,
}

impl SupervisorArgs {
    pub fn new(kernel: Arc<Kernel>, handlers: JobHandlerRegistry, config: WorkerConfig) -> Self {
        Self {
            kernel,
            handlers,
            config,
            repository: None,
        }
    }

    pub fn with_repository(mut self, repository: JobRepository) -> Self {
        self.repository = Some(repository);
        self
    }
}

/// State for the supervisor actor.
pub struct SupervisorState {
    kernel: Arc<Kernel>,
    /// Live workers by id.
    workers: Vec<(String, ActorRef<WorkerMessage>)>,
}

/// Supervisor actor that owns the workers.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting worker supervisor with {} workers",
            args.config.worker_count
        );

        // Start periodic tick
        let myself_clone = myself.clone();
        let tick_interval = args.config.tick_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                interval.tick().await;
                if myself_clone.send_message(SupervisorMessage::Tick).is_err() {
                    break;
                }
            }
        });

        let handlers = Arc::new(args.handlers);
        let mut workers = Vec::with_capacity(args.config.worker_count);
        for n in 1..=args.config.worker_count {
            let worker_id = format!("worker-{}", n);
            let worker_args = WorkerArgs {
                worker_id: worker_id.clone(),
                kernel: args.kernel.clone(),
                handlers: handlers.clone(),
                repository: args.repository.clone(),
                poll_interval: args.config.poll_interval,
                job_timeout: args.config.job_timeout,
            };
            let (worker, _handle) =
                Actor::spawn_linked(None, WorkerActor, worker_args, myself.get_cell())
                    .await
                    .map_err(ActorError::from)?;
            workers.push((worker_id, worker));
        }

        Ok(SupervisorState {
            kernel: args.kernel,
            workers,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::GetMetrics { reply } => {
                let _ = reply.send(state.kernel.queue().metrics());
            }

            SupervisorMessage::ListWorkers { reply } => {
                let _ = reply.send(state.workers.iter().map(|(id, _)| id.clone()).collect());
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down supervisor");
                for (_, worker) in &state.workers {
                    let _ = worker.send_message(WorkerMessage::Shutdown);
                }
                myself.stop(None);
            }

            SupervisorMessage::Tick => {
                let metrics = state.kernel.queue().metrics();
                tracing::debug!(
                    "Queue: {} pending, {} in flight, {} completed, {} failed, {} canceled",
                    metrics.pending,
                    metrics.in_flight,
                    metrics.completed,
                    metrics.failed,
                    metrics.canceled
                );
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, _) => {
                state.workers.retain(|(_, worker)| worker.get_id() != cell.get_id());
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                tracing::warn!("Worker {} failed: {}", cell.get_id(), error);
                state.workers.retain(|(_, worker)| worker.get_id() != cell.get_id());
            }
            _ => {}
        }
        Ok(())
    }
}

/// Start the supervisor and its workers.
pub async fn start_supervisor(
    args: SupervisorArgs,
) -> Result<(ActorRef<SupervisorMessage>, tokio::task::JoinHandle<()>), ActorError> {
    let (actor, handle) = Actor::spawn(None, Supervisor, args).await?;

    Ok((actor, handle))
}
