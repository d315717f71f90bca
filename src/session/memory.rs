//! In-process session store with a sliding time-to-live

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::{new_session_id, SessionData, SessionStore, StoreError};

pub const DEFAULT_SESSION_TTL_SECS: u64 = 3_600;

#[derive(Debug, Clone)]
struct StoredSession {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, StoredSession>>,
}

impl MemorySessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        let ttl_secs = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Self {
            ttl: Duration::try_seconds(ttl_secs).unwrap_or(Duration::MAX),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StoredSession>>, StoreError> {
        self.sessions
            .lock()
            .map_err(|_| StoreError::Unavailable("session table lock poisoned".to_string()))
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn purge_if_expired(
        sessions: &mut HashMap<String, StoredSession>,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> bool {
        match sessions.get(session_id) {
            Some(session) if session.expires_at <= now => {
                sessions.remove(session_id);
                debug!(session_id, "expired session purged");
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL_SECS)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self) -> Result<String, StoreError> {
        let session_id = new_session_id();
        let now = Utc::now();
        let expires_at = self.expiry_from(now);
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        if sessions.len() < before {
            debug!(purged = before - sessions.len(), "expired sessions purged");
        }
        sessions.insert(
            session_id.clone(),
            StoredSession {
                data: SessionData::new(),
                expires_at,
            },
        );
        Ok(session_id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, StoreError> {
        let mut sessions = self.lock()?;
        if !Self::purge_if_expired(&mut sessions, session_id, Utc::now()) {
            return Ok(None);
        }
        Ok(sessions.get(session_id).map(|session| session.data.clone()))
    }

    async fn update(&self, session_id: &str, data: SessionData) -> Result<bool, StoreError> {
        let now = Utc::now();
        let expires_at = self.expiry_from(now);
        let mut sessions = self.lock()?;
        if !Self::purge_if_expired(&mut sessions, session_id, now) {
            return Ok(false);
        }

        let Some(session) = sessions.get_mut(session_id) else {
            return Ok(false);
        };
        session.data = data;
        session.expires_at = expires_at;
        Ok(true)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut sessions = self.lock()?;
        let live = Self::purge_if_expired(&mut sessions, session_id, Utc::now());
        Ok(live && sessions.remove(session_id).is_some())
    }
}
