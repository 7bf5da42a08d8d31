use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A uniquely identifying ID for a JSON-RPC request.
/// Can be a string or a number. A `null` or absent id marks a notification and
/// is modelled as `Option<RequestId>::None` by the envelope types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// The `id` member of an incoming envelope, before it is accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum IdField {
    /// Absent or `null`: the envelope is a notification
    Missing,
    Valid(RequestId),
    /// Present but not accepted: object, array, bool, or a number outside `i64`
    Invalid,
}

impl IdField {
    /// Classify the `id` member of a raw envelope object
    pub fn from_envelope(envelope: &serde_json::Map<String, Value>) -> Self {
        match envelope.get("id") {
            None | Some(Value::Null) => IdField::Missing,
            Some(Value::String(s)) => IdField::Valid(RequestId::String(s.clone())),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(n) => IdField::Valid(RequestId::Number(n)),
                None => IdField::Invalid,
            },
            Some(_) => IdField::Invalid,
        }
    }

    /// The id to echo in a response, if any
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            IdField::Valid(id) => Some(id.clone()),
            _ => None,
        }
    }
}

/// JSON-RPC version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JsonRpcVersion {
    #[default]
    V2_0,
}

impl JsonRpcVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonRpcVersion::V2_0 => "2.0",
        }
    }
}

impl fmt::Display for JsonRpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "2.0" => Ok(JsonRpcVersion::V2_0),
            _ => Err(serde::de::Error::custom(format!(
                "Invalid JSON-RPC version: {}",
                s
            ))),
        }
    }
}
