//! # JSON-RPC 2.0 Envelope Types
//!
//! Transport-agnostic JSON-RPC 2.0 types used by the saferpc endpoint and client.
//! This crate knows nothing about method dispatch or the safe serialization
//! scheme; it only models and validates the wire envelopes.
//!
//! ## Features
//! - Request parsing from raw JSON with JSON-RPC compliant error objects
//! - Response envelopes that carry exactly one of `result` or `error`
//! - Notification detection (absent or `null` id)

pub mod error;
pub mod request;
pub mod response;
pub mod types;

pub mod prelude;

// Re-export main types
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use request::JsonRpcRequest;
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}
