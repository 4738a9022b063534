//! TTL-scoped context store with expiry computed on access.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use kernel_core::{Context, Session, SessionId};

use crate::config::{ConfigError, SessionConfig};
use crate::sync;

/// Holds short-lived context blobs addressable by id.
///
/// There is no background sweep. `get` purges an expired session when it
/// finds one; `list_active` only filters; `purge_expired` is an explicit,
/// caller-driven sweep. Near the TTL boundary two calls may disagree on
/// whether a session is still alive.
#[derive(Debug)]
pub struct SessionManager {
    config: SessionConfig,
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session. A missing or zero TTL uses the configured default.
    pub fn create(&self, initial: Option<Context>, ttl: Option<Duration>) -> SessionId {
        let ttl = ttl
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or_else(|| self.config.default_ttl());
        let session = Session::new(initial.unwrap_or_default(), ttl);
        let id = session.id;
        tracing::debug!("Created session {} (ttl {:?})", id, ttl);
        sync::write(&self.sessions).insert(id, session);
        id
    }

    /// Copy of the session's context, or `None` if unknown or expired.
    ///
    /// An expired session is removed by this call.
    pub fn get(&self, session_id: SessionId) -> Option<Context> {
        {
            let sessions = sync::read(&self.sessions);
            let session = sessions.get(&session_id)?;
            if !session.is_expired() {
                return Some(session.context.clone());
            }
        }

        let mut sessions = sync::write(&self.sessions);
        if sessions
            .get(&session_id)
            .is_some_and(|session| session.is_expired())
        {
            sessions.remove(&session_id);
            tracing::debug!("Purged expired session {}", session_id);
        }
        None
    }

    /// Shallow-merge `partial` into the session's context.
    ///
    /// Returns `false` without creating anything if the session is unknown
    /// or expired.
    pub fn update(&self, session_id: SessionId, partial: Context) -> bool {
        let mut sessions = sync::write(&self.sessions);
        match sessions.get_mut(&session_id) {
            Some(session) if !session.is_expired() => {
                session.merge(partial);
                true
            }
            _ => false,
        }
    }

    /// Remove a session. Returns `false` if there was nothing to remove.
    pub fn destroy(&self, session_id: SessionId) -> bool {
        let removed = sync::write(&self.sessions).remove(&session_id).is_some();
        if removed {
            tracing::debug!("Destroyed session {}", session_id);
        }
        removed
    }

    /// Ids of all sessions that have not expired, oldest first.
    pub fn list_active(&self) -> Vec<SessionId> {
        let now = Utc::now();
        let mut ids: Vec<SessionId> = sync::read(&self.sessions)
            .values()
            .filter(|session| !session.is_expired_at(now))
            .map(|session| session.id)
            .collect();
        ids.sort();
        ids
    }

    /// Full copy of a live session, for persistence. Does not purge.
    pub fn snapshot(&self, session_id: SessionId) -> Option<Session> {
        sync::read(&self.sessions)
            .get(&session_id)
            .filter(|session| !session.is_expired())
            .cloned()
    }

    /// Remove every expired session now, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = sync::write(&self.sessions);
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        let purged = before - sessions.len();
        if purged > 0 {
            tracing::debug!("Purged {} expired session(s)", purged);
        }
        purged
    }
}
