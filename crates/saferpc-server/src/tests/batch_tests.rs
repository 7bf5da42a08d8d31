//! Batch dispatch through `RpcEndpoint::handle`

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use saferpc_codec::{RichValue, SAFE_ENABLED_HEADER};
use serde_json::{Value, json};
use tokio::sync::Barrier;

use super::{assert_exclusive, call_log, calculator, dispatch, entries};
use crate::context::TransportRequest;
use crate::endpoint::RpcEndpoint;
use crate::error::RpcError;
use crate::method::{MethodCall, MethodSpec, method_fn};
use crate::middleware::{HookFlow, HookStage, hook_fn};

#[tokio::test]
async fn test_mixed_batch_keeps_order_and_drops_notifications() {
    let endpoint = calculator(RpcEndpoint::new());

    let response = dispatch(
        &endpoint,
        json!([
            {"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 2}, "id": 1},
            {"jsonrpc": "2.0", "method": "echo", "params": {"quiet": true}},
            {"jsonrpc": "2.0", "method": "ghost", "id": 2},
            {"jsonrpc": "1.0", "method": "add", "id": 3},
            {"jsonrpc": "2.0", "method": "echo", "params": ["x"], "id": "last"}
        ]),
    )
    .await;

    let items = response.as_array().unwrap();
    assert_eq!(items.len(), 4);
    items.iter().for_each(assert_exclusive);

    assert_eq!(items[0], json!({"jsonrpc": "2.0", "id": 1, "result": 3}));

    assert_eq!(items[1]["id"], 2);
    assert_eq!(items[1]["error"]["code"], -32601);
    assert_eq!(items[1]["error"]["data"]["batchIndex"], 2);

    assert_eq!(items[2]["id"], 3);
    assert_eq!(items[2]["error"]["code"], -32600);
    assert_eq!(items[2]["error"]["data"]["batchIndex"], 3);

    assert_eq!(items[3], json!({"jsonrpc": "2.0", "id": "last", "result": ["x"]}));
}

#[tokio::test]
async fn test_duplicate_ids_reject_whole_batch() {
    let endpoint = calculator(RpcEndpoint::new());

    let response = dispatch(
        &endpoint,
        json!([
            {"jsonrpc": "2.0", "method": "echo", "params": {"a": 1}, "id": 1},
            {"jsonrpc": "2.0", "method": "echo", "params": {"a": 2}, "id": 1}
        ]),
    )
    .await;

    let items = response.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], Value::Null);
    assert_eq!(items[0]["error"]["code"], -32600);
}

#[tokio::test]
async fn test_all_notification_batch_has_no_content() {
    let endpoint = calculator(RpcEndpoint::new());

    let response = endpoint
        .handle(
            json!([
                {"jsonrpc": "2.0", "method": "echo", "params": {"a": 1}},
                {"jsonrpc": "2.0", "method": "fail"},
                {"jsonrpc": "2.0", "method": "ghost", "id": null}
            ]),
            TransportRequest::new(),
        )
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_none());
}

#[tokio::test]
async fn test_failures_are_isolated_per_item() {
    let endpoint = calculator(RpcEndpoint::new());

    let response = dispatch(
        &endpoint,
        json!([
            {"jsonrpc": "2.0", "method": "fail", "id": "a"},
            {"jsonrpc": "2.0", "method": "add", "params": {"a": 2, "b": 2}, "id": "b"}
        ]),
    )
    .await;

    let items = response.as_array().unwrap();
    assert_eq!(items[0]["error"]["code"], -32010);
    assert_eq!(items[0]["error"]["data"]["batchIndex"], 0);
    assert_eq!(items[1]["result"], 4);
}

#[tokio::test]
async fn test_items_run_concurrently() {
    // both items must be in flight at once to get past the barrier
    let barrier = Arc::new(Barrier::new(2));
    let mut endpoint = RpcEndpoint::new();
    endpoint
        .register(
            "rendezvous",
            method_fn(move |call: MethodCall| {
                let barrier = barrier.clone();
                async move {
                    barrier.wait().await;
                    Ok::<_, RpcError>(call.params)
                }
            }),
        )
        .unwrap();

    let batch = json!([
        {"jsonrpc": "2.0", "method": "rendezvous", "params": [1], "id": 1},
        {"jsonrpc": "2.0", "method": "rendezvous", "params": [2], "id": 2}
    ]);
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        endpoint.handle(batch, TransportRequest::new()),
    )
    .await
    .expect("batch items should not run one after another");

    assert_eq!(
        response.body.unwrap(),
        json!([
            {"jsonrpc": "2.0", "id": 1, "result": [1]},
            {"jsonrpc": "2.0", "id": 2, "result": [2]}
        ])
    );
}

#[tokio::test]
async fn test_batch_path_skips_schema_validation() {
    let log = call_log();
    let mut endpoint = RpcEndpoint::new();
    endpoint
        .register(
            "square",
            MethodSpec::new(method_fn(|call: MethodCall| async move {
                Ok::<_, RpcError>(call.params)
            }))
            .with_schema(json!({
                "type": "object",
                "properties": {"n": {"type": "number"}},
                "required": ["n"]
            })),
        )
        .unwrap();
    for stage in [HookStage::BeforeValidation, HookStage::AfterValidation] {
        let log = log.clone();
        endpoint.use_hook(
            stage,
            hook_fn(move |_| {
                log.lock().unwrap().push(stage.to_string());
                Ok(HookFlow::Continue)
            }),
        );
    }

    let single = dispatch(
        &endpoint,
        json!({"jsonrpc": "2.0", "method": "square", "params": {"n": "abc"}, "id": 1}),
    )
    .await;
    assert_eq!(single["error"]["code"], -32602);
    assert_eq!(entries(&log), vec!["beforeValidation"]);

    let batch = dispatch(
        &endpoint,
        json!([{"jsonrpc": "2.0", "method": "square", "params": {"n": "abc"}, "id": 1}]),
    )
    .await;
    assert_eq!(batch[0]["result"], json!({"n": "abc"}));
    assert_eq!(entries(&log), vec!["beforeValidation"]);
}

#[tokio::test]
async fn test_strict_gate_applies_to_whole_batch() {
    let endpoint = calculator(RpcEndpoint::builder().safe_enabled(true).strict_mode(true).build());
    let batch = json!([
        {"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 2}, "id": 1},
        {"jsonrpc": "2.0", "method": "add", "params": {"a": 3, "b": 4}, "id": 2}
    ]);

    let rejected = dispatch(&endpoint, batch.clone()).await;
    let items = rejected.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], Value::Null);
    assert_eq!(items[0]["error"]["data"]["requiredHeader"], "X-RPC-Safe-Enabled");

    let accepted = endpoint
        .handle(batch, TransportRequest::new().with_header(SAFE_ENABLED_HEADER, "true"))
        .await;
    let body = accepted.body.unwrap();
    assert_eq!(body[0]["result"], 3);
    assert_eq!(body[1]["result"], 7);
}

#[tokio::test]
async fn test_batch_hooks_see_item_index() {
    let log = call_log();
    let mut endpoint = calculator(RpcEndpoint::new());
    let before = log.clone();
    endpoint.use_hook(
        HookStage::BeforeCall,
        hook_fn(move |ctx| {
            before
                .lock()
                .unwrap()
                .push(format!("{}@{:?}", ctx.method, ctx.batch_index));
            Ok(HookFlow::Continue)
        }),
    );
    endpoint.use_hook(
        HookStage::AfterCall,
        hook_fn(|ctx| {
            if ctx.batch_index == Some(1) {
                ctx.result = Some(RichValue::from("replaced"));
            }
            Ok(HookFlow::Continue)
        }),
    );

    let response = dispatch(
        &endpoint,
        json!([
            {"jsonrpc": "2.0", "method": "echo", "params": 1, "id": 1},
            {"jsonrpc": "2.0", "method": "echo", "params": 2, "id": 2}
        ]),
    )
    .await;

    assert_eq!(response[0]["result"], 1);
    assert_eq!(response[1]["result"], "replaced");

    let mut seen = entries(&log);
    seen.sort();
    assert_eq!(seen, vec!["echo@Some(0)", "echo@Some(1)"]);
}
