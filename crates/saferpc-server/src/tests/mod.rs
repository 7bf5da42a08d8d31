//! Test modules for saferpc-server
//!
//! Cross-module tests driving `RpcEndpoint::handle` end to end, without a
//! network transport.

pub mod batch_tests;
pub mod endpoint_tests;

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::context::TransportRequest;
use crate::endpoint::RpcEndpoint;
use crate::error::RpcError;
use crate::method::{MethodCall, method_fn};

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn entries(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Endpoint with `add`, `echo` and `fail` registered
pub(crate) fn calculator(mut endpoint: RpcEndpoint) -> RpcEndpoint {
    endpoint
        .register(
            "add",
            method_fn(|call: MethodCall| async move {
                Ok::<_, RpcError>(call.i64_param("a")? + call.i64_param("b")?)
            }),
        )
        .unwrap();
    endpoint
        .register(
            "echo",
            method_fn(|call: MethodCall| async move { Ok::<_, RpcError>(call.params) }),
        )
        .unwrap();
    endpoint
        .register(
            "fail",
            method_fn(|_: MethodCall| async move {
                Err::<Value, _>(RpcError::new("Insufficient funds").with_code(-32010))
            }),
        )
        .unwrap();
    endpoint
}

/// Dispatch `body` without transport headers and return the response body
pub(crate) async fn dispatch(endpoint: &RpcEndpoint, body: Value) -> Value {
    endpoint
        .handle(body, TransportRequest::new())
        .await
        .body
        .expect("response body")
}

/// Exactly one of `result` / `error`
pub(crate) fn assert_exclusive(envelope: &Value) {
    let has_result = envelope.get("result").is_some();
    let has_error = envelope.get("error").is_some();
    assert!(has_result != has_error, "bad envelope: {}", envelope);
    assert_eq!(envelope["jsonrpc"], "2.0");
}
