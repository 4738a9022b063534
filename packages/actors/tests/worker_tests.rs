#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use actors::{
    Actor, JobHandlerRegistry, SupervisorArgs, SupervisorMessage, WorkerActor, WorkerArgs,
    WorkerConfig, WorkerMessage, job_handler, start_supervisor,
};
use kernel::Kernel;
use kernel_core::{JobSpec, JobState, Priority, topics};
use records::SurrealRecordStore;
use records::repositories::JobRepository;
use serde_json::json;

fn fast_config() -> WorkerConfig {
    WorkerConfig::default()
        .with_worker_count(2)
        .with_poll_interval(Duration::from_millis(5))
        .with_job_timeout(Duration::from_millis(200))
}

#[tokio::test]
async fn test_workers_drain_the_queue() -> Result<(), Box<dyn Error>> {
    common::init_tracing();
    let kernel = Arc::new(Kernel::default());
    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!("sum", |job| {
        let total: i64 = job
            .payload
            .as_array()
            .map(|xs| xs.iter().filter_map(|x| x.as_i64()).sum())
            .unwrap_or(0);
        Ok(json!(total))
    }));

    let ids: Vec<_> = (0..5)
        .map(|i| {
            kernel.enqueue(JobSpec::new("sum", json!([i, i, 1])).with_priority(Priority::High))
        })
        .collect();

    let (supervisor, handle) =
        start_supervisor(SupervisorArgs::new(kernel.clone(), handlers, fast_config())).await?;

    for (i, id) in ids.iter().enumerate() {
        let job = common::wait_for_terminal(&kernel, *id).await?;
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.result, Some(json!(2 * i as i64 + 1)));
    }

    let metrics = ractor::call!(supervisor, |reply| SupervisorMessage::GetMetrics { reply })
        .map_err(|e| e.to_string())?;
    assert_eq!(metrics.completed, 5);
    assert_eq!(metrics.active(), 0);

    let workers = ractor::call!(supervisor, |reply| SupervisorMessage::ListWorkers { reply })
        .map_err(|e| e.to_string())?;
    assert_eq!(workers, vec!["worker-1", "worker-2"]);

    let completions = kernel
        .bus()
        .history(Some(usize::MAX))
        .into_iter()
        .filter(|r| r.event_name == topics::JOB_COMPLETED)
        .count();
    assert_eq!(completions, 5);

    supervisor
        .send_message(SupervisorMessage::Shutdown)
        .map_err(|e| e.to_string())?;
    handle.await?;
    Ok(())
}

#[tokio::test]
async fn test_failures_retry_then_exhaust() -> Result<(), Box<dyn Error>> {
    common::init_tracing();
    let kernel = Arc::new(Kernel::default());
    let calls = Arc::new(AtomicU32::new(0));
    let seen = calls.clone();

    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!("flaky", |_job| {
        Err::<serde_json::Value, _>("upstream unavailable".to_string())
    }));
    let second_try = move |_job: &actors::Job| -> actors::HandlerFuture {
        let attempt = seen.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if attempt == 0 {
                Err("cold cache".to_string())
            } else {
                Ok(json!("warm"))
            }
        })
    };
    handlers.register(actors::FnHandler::new("second-try", second_try));
    handlers.register(job_handler!("panicky", |job| {
        if job.kind == "panicky" {
            panic!("handler bug");
        }
        Ok(json!(null))
    }));
    handlers.register(job_handler!("slow", |_job| {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(json!(null))
    }));

    let flaky = kernel.enqueue(JobSpec::new("flaky", json!({})).with_max_attempts(2));
    let second = kernel.enqueue(JobSpec::new("second-try", json!({})));
    let panicky = kernel.enqueue(JobSpec::new("panicky", json!({})).with_max_attempts(1));
    let slow = kernel.enqueue(JobSpec::new("slow", json!({})).with_max_attempts(1));
    let orphan = kernel.enqueue(JobSpec::new("unregistered", json!({})).with_max_attempts(1));

    let (supervisor, handle) =
        start_supervisor(SupervisorArgs::new(kernel.clone(), handlers, fast_config())).await?;

    let job = common::wait_for_terminal(&kernel, flaky).await?;
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts, 2);
    assert_eq!(job.last_error.as_deref(), Some("upstream unavailable"));

    let job = common::wait_for_terminal(&kernel, second).await?;
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let job = common::wait_for_terminal(&kernel, panicky).await?;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.last_error.unwrap_or_default().contains("handler bug"));

    let job = common::wait_for_terminal(&kernel, slow).await?;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.last_error.unwrap_or_default().contains("timed out"));

    let job = common::wait_for_terminal(&kernel, orphan).await?;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.last_error.unwrap_or_default().contains("unregistered"));

    supervisor
        .send_message(SupervisorMessage::Shutdown)
        .map_err(|e| e.to_string())?;
    handle.await?;
    Ok(())
}

#[tokio::test]
async fn test_snapshots_are_persisted() -> Result<(), Box<dyn Error>> {
    common::init_tracing();
    let kernel = Arc::new(Kernel::default());
    let repository = JobRepository::new(Arc::new(SurrealRecordStore::memory().await?));

    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!("report", |job| Ok(json!({ "echo": job.payload }))));

    let id = kernel.enqueue(JobSpec::new("report", json!({"week": 42})));
    let args = SupervisorArgs::new(kernel.clone(), handlers, fast_config().with_worker_count(1))
        .with_repository(repository.clone());
    let (supervisor, handle) = start_supervisor(args).await?;

    common::wait_for_terminal(&kernel, id).await?;
    // the snapshot is saved right after the report
    let mut stored = None;
    for _ in 0..100 {
        if let Ok(job) = repository.get(id).await {
            stored = Some(job);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stored = stored.ok_or("snapshot never written")?;
    assert_eq!(stored.state, JobState::Completed);
    assert_eq!(stored.result, Some(json!({"echo": {"week": 42}})));

    supervisor
        .send_message(SupervisorMessage::Shutdown)
        .map_err(|e| e.to_string())?;
    handle.await?;
    Ok(())
}

#[tokio::test]
async fn test_worker_reports_processed_count() -> Result<(), Box<dyn Error>> {
    common::init_tracing();
    let kernel = Arc::new(Kernel::default());
    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!("ok", |_job| Ok(json!(true))));
    handlers.register(job_handler!("bad", |_job| Err::<serde_json::Value, _>(
        "rejected".to_string()
    )));

    let ok = kernel.enqueue(JobSpec::new("ok", json!({})));
    let bad = kernel.enqueue(JobSpec::new("bad", json!({})).with_max_attempts(1));

    let (worker, handle) = Actor::spawn(
        None,
        WorkerActor,
        WorkerArgs {
            worker_id: "solo".to_string(),
            kernel: kernel.clone(),
            handlers: Arc::new(handlers),
            repository: None,
            poll_interval: Duration::from_millis(5),
            job_timeout: Duration::from_millis(200),
        },
    )
    .await?;

    assert_eq!(common::wait_for_terminal(&kernel, ok).await?.state, JobState::Completed);
    assert_eq!(common::wait_for_terminal(&kernel, bad).await?.state, JobState::Failed);

    // failures count as processed too
    let processed = ractor::call!(worker, |reply| WorkerMessage::Processed { reply })
        .map_err(|e| e.to_string())?;
    assert_eq!(processed, 2);

    worker
        .send_message(WorkerMessage::Shutdown)
        .map_err(|e| e.to_string())?;
    handle.await?;
    Ok(())
}
