use std::sync::Arc;

use records::repositories::{JobRepository, SessionRepository};
use records::{RecordError, SurrealRecordStore};

pub async fn setup() -> Result<(Arc<SurrealRecordStore>, JobRepository, SessionRepository), RecordError>
{
    let store = Arc::new(SurrealRecordStore::memory().await?);
    let jobs = JobRepository::new(store.clone());
    let sessions = SessionRepository::new(store.clone());
    Ok((store, jobs, sessions))
}
