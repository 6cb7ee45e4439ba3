//! Session middleware configuration.
//!
//! Sessions are held in process memory; a restart logs everybody out.
//! The store is a bounded moka cache: idle sessions are evicted after the
//! cookie expiry, and the least useful entries go first once the capacity
//! is reached.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tower_sessions::cookie::time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, SessionStore};
use tower_sessions::{Expiry, SessionManagerLayer};

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "mm_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Maximum number of live sessions kept in memory.
const SESSION_CAPACITY: u64 = 100_000;

/// In-memory session store backed by a moka cache.
#[derive(Clone)]
pub struct MokaSessionStore {
    records: Cache<Id, Record>,
}

impl MokaSessionStore {
    /// Create a store holding at most `capacity` sessions, each dropped after
    /// `idle` without a save.
    #[must_use]
    pub fn new(capacity: u64, idle: Duration) -> Self {
        Self {
            records: Cache::builder()
                .max_capacity(capacity)
                .time_to_idle(idle)
                .build(),
        }
    }

    /// Number of sessions currently held.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.records.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MokaSessionStore {
    fn default() -> Self {
        Self::new(
            SESSION_CAPACITY,
            Duration::from_secs(SESSION_EXPIRY_SECONDS.unsigned_abs()),
        )
    }
}

impl fmt::Debug for MokaSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MokaSessionStore")
            .field("sessions", &self.records.entry_count())
            .finish()
    }
}

#[async_trait]
impl SessionStore for MokaSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        while self.records.contains_key(&record.id) {
            record.id = Id::default();
        }
        self.records.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.records.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let Some(record) = self.records.get(session_id).await else {
            return Ok(None);
        };
        if record.expiry_date <= OffsetDateTime::now_utc() {
            self.records.invalidate(session_id).await;
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.records.invalidate(session_id).await;
        Ok(())
    }
}

/// Create the session layer over a bounded in-memory store.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MokaSessionStore> {
    SessionManagerLayer::new(MokaSessionStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.uses_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tower_sessions::cookie::time::Duration as TimeDuration;

    use super::*;

    fn record(expires_in: TimeDuration) -> Record {
        Record {
            id: Id::default(),
            data: HashMap::default(),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = MokaSessionStore::default();
        let mut session = record(TimeDuration::hours(1));
        store.create(&mut session).await.expect("create");

        let loaded = store.load(&session.id).await.expect("load");
        assert_eq!(loaded.map(|r| r.id), Some(session.id));

        store.delete(&session.id).await.expect("delete");
        assert!(store.load(&session.id).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn test_expired_record_is_dropped() {
        let store = MokaSessionStore::default();
        let session = record(TimeDuration::seconds(-1));
        store.save(&session).await.expect("save");

        assert!(store.load(&session.id).await.expect("load").is_none());
        store.records.run_pending_tasks().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_bounds_live_sessions() {
        let store = MokaSessionStore::new(2, Duration::from_secs(60));
        for _ in 0..10 {
            store.save(&record(TimeDuration::hours(1))).await.expect("save");
        }
        store.records.run_pending_tasks().await;
        assert!(store.len() <= 2);
    }
}
