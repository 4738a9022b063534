//! Job repository.

use std::sync::Arc;

use kernel_core::{Job, JobId, JobState};
use serde_json::Value;

use super::find_by_id;
use crate::codec::{from_record, replacing, to_record};
use crate::store::{Record, RecordError, RecordStore, RowRef};

pub const JOBS_TABLE: &str = "jobs";

const STRUCTURED: &[&str] = &["payload", "result"];

/// Repository for job snapshots, keyed by job id.
#[derive(Clone)]
pub struct JobRepository {
    store: Arc<dyn RecordStore>,
}

impl JobRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Insert the job, or replace the row already holding its id.
    pub async fn save(&self, job: &Job) -> Result<RowRef, RecordError> {
        let record = to_record(job, STRUCTURED)?;
        match find_by_id(self.store.as_ref(), JOBS_TABLE, job.id.to_string()).await? {
            Some(existing) => {
                self.store
                    .update(JOBS_TABLE, &existing.row, replacing(&existing.record, record))
                    .await?;
                tracing::debug!("Updated job snapshot {} ({})", job.id, job.state);
                Ok(existing.row)
            }
            None => {
                let row = self.store.insert(JOBS_TABLE, record).await?;
                tracing::debug!("Stored job snapshot {} at {}", job.id, row);
                Ok(row)
            }
        }
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<Job, RecordError> {
        let row = find_by_id(self.store.as_ref(), JOBS_TABLE, id.to_string())
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("Job not found: {}", id)))?;
        from_record(row.record, STRUCTURED)
    }

    pub async fn list(&self) -> Result<Vec<Job>, RecordError> {
        self.store
            .find_all(JOBS_TABLE)
            .await?
            .into_iter()
            .map(|row| from_record(row.record, STRUCTURED))
            .collect()
    }

    pub async fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, RecordError> {
        let mut filter = Record::new();
        filter.insert("state".to_string(), Value::String(state.as_str().to_string()));
        self.store
            .find_where(JOBS_TABLE, &filter)
            .await?
            .into_iter()
            .map(|row| from_record(row.record, STRUCTURED))
            .collect()
    }

    /// Remove a job snapshot. Returns false when none was stored.
    pub async fn delete(&self, id: JobId) -> Result<bool, RecordError> {
        match find_by_id(self.store.as_ref(), JOBS_TABLE, id.to_string()).await? {
            Some(existing) => {
                self.store.remove(JOBS_TABLE, &existing.row).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn count(&self) -> Result<usize, RecordError> {
        self.store.count(JOBS_TABLE).await
    }
}

impl std::fmt::Debug for JobRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRepository").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use crate::SurrealRecordStore;
    use kernel_core::JobSpec;
    use serde_json::json;

    async fn repo() -> (Arc<SurrealRecordStore>, JobRepository) {
        let store = Arc::new(SurrealRecordStore::memory().await.unwrap());
        (store.clone(), JobRepository::new(store))
    }

    #[tokio::test]
    async fn save_flattens_nested_payload() {
        let (store, jobs) = repo().await;
        let job = Job::from_spec(JobSpec::new("ingest", json!({"files": ["a", "b"]})), 3);
        jobs.save(&job).await.unwrap();

        let rows = store.find_all(JOBS_TABLE).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record["payload"], json!(r#"{"files":["a","b"]}"#));
        assert_eq!(rows[0].record["state"], json!("submitted"));
        assert!(rows[0].record["created_at"].is_string());
    }

    #[tokio::test]
    async fn save_upserts_and_clears_dropped_columns() {
        let (_store, jobs) = repo().await;
        let mut job = Job::from_spec(JobSpec::new("ingest", json!(null)), 3);
        job.mark_working();
        job.mark_requeued("flaky");
        let first = jobs.save(&job).await.unwrap();

        job.last_error = None;
        job.mark_working();
        job.mark_completed(json!({"rows": 3}));
        let second = jobs.save(&job).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(jobs.count().await.unwrap(), 1);
        let loaded = jobs.get(job.id).await.unwrap();
        assert_eq!(loaded.state, JobState::Completed);
        assert_eq!(loaded.attempts, 2);
        assert_eq!(loaded.last_error, None);
        assert_eq!(loaded.result, Some(json!({"rows": 3})));
    }

    #[tokio::test]
    async fn null_result_round_trips() {
        let (_store, jobs) = repo().await;
        let mut job = Job::from_spec(JobSpec::new("notify", json!(null)), 3);
        job.mark_working();
        job.mark_completed(json!(null));
        jobs.save(&job).await.unwrap();

        let loaded = jobs.get(job.id).await.unwrap();
        assert_eq!(loaded.result, Some(Value::Null));
        assert_eq!(loaded, job);

        // a job that never produced a result stays without one
        let pending = Job::from_spec(JobSpec::new("notify", json!(null)), 3);
        jobs.save(&pending).await.unwrap();
        assert_eq!(jobs.get(pending.id).await.unwrap().result, None);
    }

    #[tokio::test]
    async fn missing_job_is_not_found() {
        let (_store, jobs) = repo().await;
        assert!(matches!(jobs.get(JobId::new()).await, Err(RecordError::NotFound(_))));
        assert!(!jobs.delete(JobId::new()).await.unwrap());
    }
}
