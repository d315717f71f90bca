use async_trait::async_trait;

use super::{new_session_id, SessionData, SessionStore, StoreError};

/// Treats every session id as valid and stores nothing.
#[derive(Debug, Default)]
pub struct NoopSessionStore;

impl NoopSessionStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionStore for NoopSessionStore {
    async fn create(&self) -> Result<String, StoreError> {
        Ok(new_session_id())
    }

    async fn get(&self, _session_id: &str) -> Result<Option<SessionData>, StoreError> {
        Ok(Some(SessionData::new()))
    }

    async fn update(&self, _session_id: &str, _data: SessionData) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn delete(&self, _session_id: &str) -> Result<bool, StoreError> {
        Ok(true)
    }

    fn is_noop(&self) -> bool {
        true
    }
}
