//! Session domain types for TTL-scoped context.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::SessionId;

/// Open-ended key/value context carried by a session.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// A short-lived, mutable context blob addressable by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub context: Context,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Time to live in milliseconds, measured from `created_at`.
    pub ttl_ms: u64,
}

impl Session {
    pub fn new(context: Context, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            context,
            created_at: now,
            updated_at: now,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Expired once strictly more than the TTL has elapsed since creation.
    ///
    /// Updates do not extend the lifetime.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let ttl = TimeDelta::try_milliseconds(i64::try_from(self.ttl_ms).unwrap_or(i64::MAX))
            .unwrap_or(TimeDelta::MAX);
        now - self.created_at > ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Shallow merge, last write wins per key.
    pub fn merge(&mut self, partial: Context) {
        for (key, value) in partial {
            self.context.insert(key, value);
        }
        self.updated_at = Utc::now();
    }
}
