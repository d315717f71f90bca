//! Session persistence contract and its in-process backends

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod noop;

pub use memory::MemorySessionStore;
pub use noop::NoopSessionStore;

pub type SessionData = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self) -> Result<String, StoreError>;

    /// Returns `Ok(None)` for unknown or expired sessions.
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, StoreError>;

    /// Replaces the stored data. Returns `false` if the session no longer exists.
    async fn update(&self, session_id: &str, data: SessionData) -> Result<bool, StoreError>;

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Session-less requests are only accepted when this returns `true`.
    fn is_noop(&self) -> bool {
        false
    }
}

pub(crate) fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
