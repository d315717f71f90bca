use thiserror::Error;

use crate::session::StoreError;

/// Faults raised while routing a request. None of these reach the client
/// verbatim; they are reported as a generic `-32000` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("session store failure: {0}")]
    SessionStore(#[from] StoreError),
    #[error("response serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
