use std::{env, net::SocketAddr, str::FromStr, sync::Arc};

use thiserror::Error;

use crate::session::{
    memory::DEFAULT_SESSION_TTL_SECS, MemorySessionStore, NoopSessionStore, SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreKind {
    Memory,
    None,
}

impl FromStr for SessionStoreKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "none" | "noop" => Ok(Self::None),
            _ => Err(ConfigError::InvalidSessionStore),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub session_store: SessionStoreKind,
    pub session_ttl_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("MCP_SESSION_STORE must be one of: memory, none")]
    InvalidSessionStore,
    #[error("MCP_SESSION_TTL_SECS must be a positive integer")]
    InvalidSessionTtl,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let setting = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = setting("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = setting("BIND_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);
        let session_store = setting("MCP_SESSION_STORE")
            .map(|value| value.parse::<SessionStoreKind>())
            .transpose()?
            .unwrap_or(SessionStoreKind::Memory);
        let session_ttl_secs = setting("MCP_SESSION_TTL_SECS")
            .map(|value| {
                value
                    .parse::<u64>()
                    .ok()
                    .filter(|ttl| *ttl > 0)
                    .ok_or(ConfigError::InvalidSessionTtl)
            })
            .transpose()?
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);

        let config = Self {
            bind_addr,
            bind_port,
            session_store,
            session_ttl_secs,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }

    pub fn build_session_store(&self) -> Arc<dyn SessionStore> {
        match self.session_store {
            SessionStoreKind::Memory => Arc::new(MemorySessionStore::new(self.session_ttl_secs)),
            SessionStoreKind::None => Arc::new(NoopSessionStore::new()),
        }
    }
}
