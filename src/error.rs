// src/error.rs
use thiserror::Error;

use crate::cgrates::RpcClientError;

/// Wire strings carried in JSON-RPC error replies
pub mod rpc_codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
    pub const MANDATORY_IE_MISSING: &str = "MANDATORY_IE_MISSING";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] RpcClientError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Error string as seen by JSON-RPC clients
    pub fn rpc_code(&self) -> &str {
        match self {
            EngineError::NotFound(_) => rpc_codes::NOT_FOUND,
            EngineError::NotImplemented(_) => rpc_codes::NOT_IMPLEMENTED,
            EngineError::InvalidRequest(_) => rpc_codes::MANDATORY_IE_MISSING,
            EngineError::Timeout(_) => rpc_codes::TIMEOUT,
            _ => rpc_codes::SERVER_ERROR,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}
