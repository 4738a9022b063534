//! Repositories for kernel snapshots.

mod job_repo;
mod session_repo;

pub use job_repo::{JOBS_TABLE, JobRepository};
pub use session_repo::{SESSIONS_TABLE, SessionRepository};

use serde_json::Value;

use crate::store::{Record, RecordError, RecordStore, Row};

fn id_filter(id: String) -> Record {
    let mut filter = Record::new();
    filter.insert("id".to_string(), Value::String(id));
    filter
}

async fn find_by_id(
    store: &dyn RecordStore,
    table: &str,
    id: String,
) -> Result<Option<Row>, RecordError> {
    let filter = id_filter(id);
    Ok(store.find_where(table, &filter).await?.into_iter().next())
}
