//! Error types for the endpoint
//!
//! [`RpcError`] is what handlers and hooks return. [`EndpointError`] covers
//! setup-time failures (registration, schema compilation) and transport IO.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use saferpc_json_rpc::{JsonRpcErrorObject, error_codes};
use serde_json::{Value, json};

use crate::middleware::MiddlewareError;
use crate::schema::SchemaError;

/// Result type for endpoint setup operations
pub type Result<T> = std::result::Result<T, EndpointError>;

/// Setup and transport errors
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Method name must not be empty")]
    EmptyMethodName,

    #[error("Method name \"{name}\" is inside the reserved \"{prefix}\" namespace")]
    ReservedMethodName { name: String, prefix: String },

    #[error("Invalid schema for method \"{method}\": {source}")]
    InvalidSchema {
        method: String,
        #[source]
        source: SchemaError,
    },

    #[error("Middleware error: {0}")]
    Middleware(#[from] MiddlewareError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure raised by a method handler or a hook.
///
/// A handler may set a custom `code` and `data`; both are preserved verbatim in
/// the JSON-RPC error. Without a code the error surfaces as `-32603`.
#[derive(Clone)]
pub struct RpcError {
    pub code: Option<i64>,
    pub message: String,
    pub data: Option<Value>,
    name: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl RpcError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
            name: "RpcError".to_string(),
            source: None,
        }
    }

    /// Wrap any error, keeping it as the source
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let name = std::any::type_name::<E>()
            .rsplit("::")
            .next()
            .unwrap_or("Error")
            .to_string();
        Self {
            code: None,
            message: error.to_string(),
            data: None,
            name,
            source: Some(Arc::new(error)),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(message).with_code(error_codes::INVALID_PARAMS)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message).with_code(error_codes::INTERNAL_ERROR)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages of the wrapped error chain, outermost first
    pub fn causes(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut current = self
            .source
            .as_deref()
            .and_then(|e| e.source());
        while let Some(err) = current {
            causes.push(err.to_string());
            current = err.source();
        }
        causes
    }

    /// Debug payload placed under `data.error`
    pub fn debug_payload(&self, sanitize: bool) -> Value {
        let clean = |s: &str| {
            if sanitize {
                sanitize_text(s)
            } else {
                s.to_string()
            }
        };

        let mut payload = json!({
            "name": self.name,
            "message": clean(&self.message),
        });
        if let Some(code) = self.code {
            payload["code"] = json!(code);
        }
        let causes: Vec<String> = self.causes().iter().map(|c| clean(c)).collect();
        if !causes.is_empty() {
            payload["causes"] = json!(causes);
        }
        payload
    }

    /// Normalize into a JSON-RPC error object
    pub fn to_error_object(&self, expose_details: bool, sanitize: bool) -> JsonRpcErrorObject {
        let data = match &self.data {
            Some(data) => Some(data.clone()),
            None if expose_details => Some(json!({ "error": self.debug_payload(sanitize) })),
            None => None,
        };

        JsonRpcErrorObject {
            code: self.code.unwrap_or(error_codes::INTERNAL_ERROR),
            message: self.message.clone(),
            data,
        }
    }
}

impl fmt::Debug for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("data", &self.data)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<&str> for RpcError {
    fn from(message: &str) -> Self {
        RpcError::new(message)
    }
}

impl From<String> for RpcError {
    fn from(message: String) -> Self {
        RpcError::new(message)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(error: serde_json::Error) -> Self {
        RpcError::from_error(error)
    }
}

impl From<std::io::Error> for RpcError {
    fn from(error: std::io::Error) -> Self {
        RpcError::from_error(error)
    }
}

impl From<JsonRpcErrorObject> for RpcError {
    fn from(error: JsonRpcErrorObject) -> Self {
        RpcError {
            code: Some(error.code),
            message: error.message,
            data: error.data,
            name: "JsonRpcError".to_string(),
            source: None,
        }
    }
}

/// Absolute paths only: the leading slash must start the text or follow a delimiter
static UNIX_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|[\s'"(=])(?:/[\w.\-@]+){2,}/?"#).expect("valid path pattern")
});
static WINDOWS_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]:\\[^\s:]+").expect("valid path pattern"));
static SOCKET_ADDR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}(?::\d{1,5})?\b|\[[0-9A-Fa-f:]+\](?::\d{1,5})?")
        .expect("valid address pattern")
});
static HEX_ADDR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b0x[0-9A-Fa-f]{6,}\b").expect("valid address pattern"));

/// Strip local filesystem paths and network/memory addresses from debug text
pub fn sanitize_text(text: &str) -> String {
    let text = WINDOWS_PATH.replace_all(text, "[redacted]");
    let text = UNIX_PATH.replace_all(&text, "${1}[redacted]");
    let text = SOCKET_ADDR.replace_all(&text, "[redacted]");
    HEX_ADDR.replace_all(&text, "[redacted]").into_owned()
}
