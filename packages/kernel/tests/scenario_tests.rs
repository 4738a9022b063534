#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::thread::sleep;
use std::time::Duration;

use kernel::{FailOutcome, JobQueue, Kernel, KernelConfig, SessionManager};
use kernel_core::{JobSpec, JobState, Priority, topics};
use serde_json::json;

#[test]
fn high_priority_ingest_beats_low_priority_cleanup() -> Result<(), Box<dyn Error>> {
    let queue = JobQueue::default();
    let ingest = queue.enqueue(JobSpec::new("ingest", json!({})).with_priority("high"));
    let cleanup = queue.enqueue(JobSpec::new("cleanup", json!({})).with_priority("low"));

    let job = queue.dequeue().ok_or("queue was empty")?;
    assert_eq!(job.id, ingest);
    assert_eq!(job.kind, "ingest");

    let waiting = queue.status(cleanup).ok_or("cleanup missing")?;
    assert_eq!(waiting.state, JobState::Submitted);
    Ok(())
}

#[test]
fn low_priority_waits_for_every_other_tier() -> Result<(), Box<dyn Error>> {
    let queue = JobQueue::default();
    queue.enqueue(JobSpec::new("low", json!(0)).with_priority(Priority::Low));
    for (i, p) in ["normal", "critical", "high", "unheard-of"].iter().enumerate() {
        queue.enqueue(JobSpec::new(*p, json!(i)).with_priority(*p));
    }

    let kinds: Vec<String> = std::iter::from_fn(|| queue.dequeue().map(|j| j.kind)).collect();
    assert_eq!(kinds, vec!["critical", "high", "normal", "unheard-of", "low"]);
    Ok(())
}

#[test]
fn two_attempt_job_fails_terminally_on_second_failure() -> Result<(), Box<dyn Error>> {
    let queue = JobQueue::default();
    let id = queue.enqueue(JobSpec::new("flaky", json!({})).with_max_attempts(2));

    queue.dequeue().ok_or("first dequeue")?;
    assert_eq!(queue.fail(id, "timeout"), FailOutcome::Requeued { attempts: 1 });
    queue.dequeue().ok_or("second dequeue")?;
    assert_eq!(queue.fail(id, "timeout again"), FailOutcome::Exhausted { attempts: 2 });

    let job = queue.status(id).ok_or("job vanished")?;
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts, 2);
    assert_eq!(job.last_error.as_deref(), Some("timeout again"));
    assert!(queue.dequeue().is_none());
    Ok(())
}

#[test]
fn short_lived_session_expires() -> Result<(), Box<dyn Error>> {
    let sessions = SessionManager::default();
    let id = sessions.create(Some(common::context(json!({}))), Some(Duration::from_secs(1)));
    assert!(sessions.list_active().contains(&id));

    sleep(Duration::from_millis(1100));

    assert!(sessions.get(id).is_none());
    assert!(!sessions.list_active().contains(&id));
    assert!(!sessions.update(id, common::context(json!({"k": "v"}))));
    assert!(sessions.get(id).is_none());
    Ok(())
}

#[test]
fn agents_coordinate_through_session_and_events() -> Result<(), Box<dyn Error>> {
    common::init_tracing();
    let kernel = Kernel::new(KernelConfig::default())?;
    let completed = common::capture(kernel.bus(), topics::JOB_COMPLETED, "auditor");
    let requeued = common::capture(kernel.bus(), topics::JOB_REQUEUED, "auditor");

    // Producer: open a context and point a job at it by id.
    let session = kernel
        .sessions()
        .create(Some(common::context(json!({"source": "crm"}))), None);
    let job_id = kernel.enqueue(
        JobSpec::new("ingest", json!({"session_id": session.to_string()}))
            .with_priority(Priority::High),
    );

    // Worker: first attempt fails, second succeeds and writes back to the context.
    let job = kernel.dequeue().ok_or("nothing to do")?;
    assert!(kernel.fail(job.id, "upstream 503").requeued());

    let job = kernel.dequeue().ok_or("retry missing")?;
    let session_id = job.payload["session_id"]
        .as_str()
        .ok_or("payload lost session id")?
        .parse()?;
    let ctx = kernel.sessions().get(session_id).ok_or("session expired")?;
    assert_eq!(ctx.get("source"), Some(&json!("crm")));
    assert!(
        kernel
            .sessions()
            .update(session_id, common::context(json!({"rows": 42})))
    );
    assert!(kernel.complete(job.id, json!({"rows": 42})));

    // Observer saw both transitions without polling.
    assert_eq!(requeued.lock().map_err(|e| e.to_string())?.len(), 1);
    let done = completed.lock().map_err(|e| e.to_string())?.clone();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0]["job_id"], json!(job_id.to_string()));
    assert_eq!(done[0]["attempts"], 2);

    assert_eq!(
        kernel.sessions().get(session).and_then(|c| c.get("rows").cloned()),
        Some(json!(42))
    );
    assert_eq!(kernel.bus().list_subscribers(topics::JOB_COMPLETED), vec!["auditor"]);

    let metrics = kernel.queue().metrics();
    assert_eq!((metrics.pending, metrics.in_flight, metrics.completed), (0, 0, 1));
    Ok(())
}

#[test]
fn config_from_environment_is_validated() {
    let err = KernelConfig::from_lookup(|name| {
        (name == "KERNEL_SESSION_TTL_SECS").then(|| "0".to_string())
    });
    assert!(err.is_err());
    assert!(Kernel::new(KernelConfig::default()).is_ok());
}
