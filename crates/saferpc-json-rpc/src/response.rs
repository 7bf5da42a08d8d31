use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{JsonRpcError, JsonRpcErrorObject};
use crate::types::{JsonRpcVersion, RequestId};

/// A successful JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: Option<RequestId>,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: Option<RequestId>, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result,
        }
    }
}

/// Union type that represents either a successful response or an error response.
///
/// The two variants keep `result` and `error` apart, so an envelope can never
/// carry both (or neither).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Successful response with result field
    Response(JsonRpcResponse),
    /// Error response with error field
    Error(JsonRpcError),
}

impl JsonRpcMessage {
    /// Create a success message
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self::Response(JsonRpcResponse::new(id, result))
    }

    /// Create an error message
    pub fn error(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self::Error(JsonRpcError::new(id, error))
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        matches!(self, JsonRpcMessage::Error(_))
    }

    /// Get the request ID from either response or error
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Response(resp) => resp.id.as_ref(),
            JsonRpcMessage::Error(err) => err.id.as_ref(),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            JsonRpcMessage::Response(resp) => Some(&resp.result),
            JsonRpcMessage::Error(_) => None,
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcErrorObject> {
        match self {
            JsonRpcMessage::Response(_) => None,
            JsonRpcMessage::Error(err) => Some(&err.error),
        }
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcMessage {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_value, json, to_value};

    #[test]
    fn test_success_envelope_shape() {
        let message = JsonRpcMessage::success(Some(RequestId::Number(1)), json!(8));
        assert_eq!(
            to_value(&message).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "result": 8})
        );
    }

    #[test]
    fn test_null_result_keeps_result_member() {
        let message = JsonRpcMessage::success(Some(RequestId::Number(2)), Value::Null);
        let value = to_value(&message).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("result"));
        assert!(!obj.contains_key("error"));
    }

    #[test]
    fn test_error_envelope_has_no_result() {
        let message = JsonRpcMessage::error(
            Some(RequestId::String("x".into())),
            JsonRpcErrorObject::internal_error(Some("boom".into())),
        );
        let value = to_value(&message).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("error"));
        assert!(!obj.contains_key("result"));
    }

    #[test]
    fn test_message_deserialization_picks_variant() {
        let ok: JsonRpcMessage =
            from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert!(!ok.is_error());
        assert_eq!(ok.result(), Some(&Value::Null));

        let err: JsonRpcMessage = from_value(json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32600, "message": "Invalid Request"}
        }))
        .unwrap();
        assert!(err.is_error());
        assert_eq!(err.id(), None);
        assert_eq!(err.error_object().unwrap().code, -32600);
    }
}
