//! Error types for client operations

use saferpc_json_rpc::JsonRpcErrorObject;
use serde_json::Value;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a JSON-RPC error
    #[error("Server error (code {code}): {message}")]
    ServerError {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// Response did not look like a JSON-RPC envelope
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// JSON-RPC error code, if the server produced one
    pub fn code(&self) -> Option<i64> {
        match self {
            ClientError::ServerError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<JsonRpcErrorObject> for ClientError {
    fn from(error: JsonRpcErrorObject) -> Self {
        ClientError::ServerError {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}
