//! Session repository.

use std::sync::Arc;

use kernel_core::{Session, SessionId};

use super::find_by_id;
use crate::codec::{from_record, replacing, to_record};
use crate::store::{RecordError, RecordStore, RowRef};

pub const SESSIONS_TABLE: &str = "sessions";

const STRUCTURED: &[&str] = &["context"];

/// Repository for session snapshots, keyed by session id.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn RecordStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, session: &Session) -> Result<RowRef, RecordError> {
        let record = to_record(session, STRUCTURED)?;
        match find_by_id(self.store.as_ref(), SESSIONS_TABLE, session.id.to_string()).await? {
            Some(existing) => {
                self.store
                    .update(
                        SESSIONS_TABLE,
                        &existing.row,
                        replacing(&existing.record, record),
                    )
                    .await?;
                Ok(existing.row)
            }
            None => self.store.insert(SESSIONS_TABLE, record).await,
        }
    }

    pub async fn get(&self, id: SessionId) -> Result<Session, RecordError> {
        let row = find_by_id(self.store.as_ref(), SESSIONS_TABLE, id.to_string())
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("Session not found: {}", id)))?;
        from_record(row.record, STRUCTURED)
    }

    /// Stored sessions that have not yet expired.
    pub async fn list_live(&self) -> Result<Vec<Session>, RecordError> {
        let mut sessions = Vec::new();
        for row in self.store.find_all(SESSIONS_TABLE).await? {
            let session: Session = from_record(row.record, STRUCTURED)?;
            if !session.is_expired() {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    pub async fn delete(&self, id: SessionId) -> Result<bool, RecordError> {
        match find_by_id(self.store.as_ref(), SESSIONS_TABLE, id.to_string()).await? {
            Some(existing) => {
                self.store.remove(SESSIONS_TABLE, &existing.row).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove stored sessions whose TTL has elapsed. Returns how many went.
    pub async fn prune_expired(&self) -> Result<usize, RecordError> {
        let mut pruned = 0;
        for row in self.store.find_all(SESSIONS_TABLE).await? {
            let session: Session = from_record(row.record, STRUCTURED)?;
            if session.is_expired() {
                self.store.remove(SESSIONS_TABLE, &row.row).await?;
                pruned += 1;
            }
        }
        if pruned > 0 {
            tracing::debug!("Pruned {} expired session snapshots", pruned);
        }
        Ok(pruned)
    }
}

impl std::fmt::Debug for SessionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRepository").finish_non_exhaustive()
    }
}
