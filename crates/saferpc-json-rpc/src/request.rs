use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JsonRpcError;
use crate::types::{IdField, JsonRpcVersion, RequestId};

/// A JSON-RPC request or notification.
///
/// `id == None` marks a notification: the caller expects no response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: Option<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            method: method.into(),
            params,
        }
    }

    /// Create a request that expects a response
    pub fn call(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::new(Some(id.into()), method, params)
    }

    /// Create a notification (no id, no response)
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::new(None, method, params)
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Structurally validate a raw envelope.
    ///
    /// Checks, in order: the body is an object, `jsonrpc` is exactly `"2.0"`,
    /// `method` is a string and `id` (if present) is a string or integer.
    /// Failures produce an Invalid Request error echoing the id when it is usable.
    pub fn from_value(value: &Value) -> Result<Self, JsonRpcError> {
        let Some(envelope) = value.as_object() else {
            return Err(JsonRpcError::invalid_request(
                None,
                Some("Invalid Request: expected a JSON object".to_string()),
            ));
        };

        let id_field = IdField::from_envelope(envelope);

        match envelope.get("jsonrpc") {
            Some(Value::String(v)) if v == crate::JSONRPC_VERSION => {}
            _ => {
                return Err(JsonRpcError::invalid_request(
                    id_field.request_id(),
                    Some("Invalid Request: jsonrpc must be \"2.0\"".to_string()),
                ));
            }
        }

        let method = match envelope.get("method") {
            Some(Value::String(method)) => method.clone(),
            _ => {
                return Err(JsonRpcError::invalid_request(
                    id_field.request_id(),
                    Some("Invalid Request: method must be a string".to_string()),
                ));
            }
        };

        let id = match id_field {
            IdField::Missing => None,
            IdField::Valid(id) => Some(id),
            IdField::Invalid => {
                return Err(JsonRpcError::invalid_request(
                    None,
                    Some("Invalid Request: id must be a string, integer or null".to_string()),
                ));
            }
        };

        Ok(Self {
            version: JsonRpcVersion::V2_0,
            id,
            method,
            params: envelope.get("params").cloned(),
        })
    }
}
