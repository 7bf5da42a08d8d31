//! Batch requests
//!
//! Items of a valid batch run concurrently, each with its own context and
//! failure domain. The batch path runs `beforeCall`, the handler and
//! `afterCall`; schema validation and its hooks apply to single requests
//! only.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use saferpc_codec::{SafeOptions, deserialize};
use saferpc_json_rpc::{JsonRpcErrorObject, JsonRpcMessage, JsonRpcRequest};
use serde_json::{Value, json};
use tracing::debug;

use crate::context::{ExecutionContext, ResponseHandle, TransportRequest};
use crate::endpoint::RpcEndpoint;

/// True for a non-empty JSON array
pub fn is_batch_request(body: &Value) -> bool {
    matches!(body, Value::Array(items) if !items.is_empty())
}

/// Check the batch as a whole: it must be a non-empty array whose declared
/// (non-null) ids are unique.
pub fn validate_batch(batch: &Value) -> Result<&[Value], JsonRpcErrorObject> {
    let Some(items) = batch.as_array() else {
        return Err(JsonRpcErrorObject::invalid_request(
            Some("Invalid Request: batch must be an array".to_string()),
            None,
        ));
    };
    if items.is_empty() {
        return Err(JsonRpcErrorObject::invalid_request(
            Some("Invalid Request: batch must not be empty".to_string()),
            None,
        ));
    }

    let mut seen = HashSet::new();
    for id in items.iter().filter_map(|item| item.get("id")) {
        if id.is_null() {
            continue;
        }
        // the JSON text keeps 1 and "1" apart
        if !seen.insert(id.to_string()) {
            return Err(JsonRpcErrorObject::invalid_request(
                Some("Invalid Request: duplicate id in batch".to_string()),
                Some(json!({ "duplicateId": id })),
            ));
        }
    }

    Ok(items)
}

/// Add `batchIndex` to an item error's data
fn tag_batch_index(mut error: JsonRpcErrorObject, index: usize) -> JsonRpcErrorObject {
    match &mut error.data {
        Some(Value::Object(data)) => {
            data.insert("batchIndex".to_string(), json!(index));
        }
        Some(_) => {}
        None => error.data = Some(json!({ "batchIndex": index })),
    }
    error
}

impl RpcEndpoint {
    /// Run every item of `batch` and collect the responses in item order.
    ///
    /// An invalid batch produces a single `-32600` error with a null id.
    /// Notifications produce no entry, so an all-notification batch yields an
    /// empty list.
    pub async fn process_batch(
        &self,
        batch: &Value,
        request: Arc<TransportRequest>,
        response: ResponseHandle,
    ) -> Vec<JsonRpcMessage> {
        let items = match validate_batch(batch) {
            Ok(items) => items,
            Err(error) => return vec![JsonRpcMessage::error(None, error)],
        };

        let client_options = match self.negotiate(&request) {
            Ok(options) => options,
            Err(error) => return vec![JsonRpcMessage::error(None, error)],
        };

        debug!("Processing batch of {} items", items.len());
        let tasks = items.iter().enumerate().map(|(index, item)| {
            self.process_batch_item(index, item, &request, &response, &client_options)
        });

        join_all(tasks).await.into_iter().flatten().collect()
    }

    async fn process_batch_item(
        &self,
        index: usize,
        item: &Value,
        request: &Arc<TransportRequest>,
        response: &ResponseHandle,
        client_options: &SafeOptions,
    ) -> Option<JsonRpcMessage> {
        let call = match JsonRpcRequest::from_value(item) {
            Ok(call) => call,
            Err(error) => {
                return Some(JsonRpcMessage::error(error.id, tag_batch_index(error.error, index)));
            }
        };
        let notification = call.is_notification();

        let Some(target) = self.resolve(&call.method) else {
            if notification {
                return None;
            }
            return Some(JsonRpcMessage::error(
                call.id,
                tag_batch_index(JsonRpcErrorObject::method_not_found(&call.method), index),
            ));
        };

        let params = deserialize(call.params.unwrap_or(Value::Null), client_options);
        let id = call.id.clone();
        let ctx = ExecutionContext::new(
            request.clone(),
            response.clone(),
            self.shared().clone(),
            call.method,
            params,
            call.id,
        )
        .with_batch_index(index);

        let outcome = self.run_call(ctx, &target, false).await;
        if notification {
            return None;
        }
        Some(self.to_message(id, outcome.map_err(|error| tag_batch_index(error, index))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_batch_request() {
        assert!(is_batch_request(&json!([{"jsonrpc": "2.0", "method": "a"}])));
        assert!(!is_batch_request(&json!([])));
        assert!(!is_batch_request(&json!({"jsonrpc": "2.0", "method": "a"})));
    }

    #[test]
    fn test_validate_batch_rejects_empty_and_non_array() {
        assert_eq!(validate_batch(&json!([])).unwrap_err().code, -32600);
        assert_eq!(validate_batch(&json!({"id": 1})).unwrap_err().code, -32600);
    }

    #[test]
    fn test_validate_batch_duplicate_ids() {
        let err = validate_batch(&json!([
            {"jsonrpc": "2.0", "method": "echo", "id": 1},
            {"jsonrpc": "2.0", "method": "echo", "id": 1}
        ]))
        .unwrap_err();
        assert_eq!(err.code, -32600);
        assert_eq!(err.data, Some(json!({"duplicateId": 1})));
    }

    #[test]
    fn test_validate_batch_ignores_null_and_distinguishes_types() {
        let batch = json!([
            {"jsonrpc": "2.0", "method": "a", "id": null},
            {"jsonrpc": "2.0", "method": "a", "id": null},
            {"jsonrpc": "2.0", "method": "a"},
            {"jsonrpc": "2.0", "method": "a", "id": 1},
            {"jsonrpc": "2.0", "method": "a", "id": "1"}
        ]);
        assert_eq!(validate_batch(&batch).unwrap().len(), 5);
    }

    #[test]
    fn test_tag_batch_index() {
        let plain = tag_batch_index(JsonRpcErrorObject::method_not_found("x"), 2);
        assert_eq!(plain.data, Some(json!({"batchIndex": 2})));

        let with_data = tag_batch_index(
            JsonRpcErrorObject::invalid_params("bad", Some(json!({"field": "a"}))),
            0,
        );
        assert_eq!(with_data.data, Some(json!({"field": "a", "batchIndex": 0})));

        let scalar = tag_batch_index(
            JsonRpcErrorObject::internal_error(None).with_data(json!("opaque")),
            1,
        );
        assert_eq!(scalar.data, Some(json!("opaque")));
    }
}
