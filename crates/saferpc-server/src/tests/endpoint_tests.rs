//! Single-request dispatch: envelopes, errors, negotiation, validation,
//! introspection

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::TimeZone;
use http::StatusCode;
use saferpc_codec::{
    BigInt, RichValue, SAFE_DATE_HEADER, SAFE_ENABLED_HEADER, SAFE_STRING_HEADER, SafeOptions,
    Utc, deserialize,
};
use serde_json::{Value, json};

use super::{assert_exclusive, calculator, dispatch};
use crate::context::TransportRequest;
use crate::endpoint::RpcEndpoint;
use crate::error::RpcError;
use crate::method::{MethodCall, MethodSpec, method_fn};
use crate::schema::ValidatorConfig;

#[tokio::test]
async fn test_add_returns_sum() {
    let endpoint = calculator(RpcEndpoint::new());

    let response = dispatch(
        &endpoint,
        json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 5, "b": 3}, "id": 1}),
    )
    .await;

    assert_eq!(response, json!({"jsonrpc": "2.0", "id": 1, "result": 8}));
}

#[tokio::test]
async fn test_unknown_method_echoes_id() {
    let endpoint = calculator(RpcEndpoint::new());

    let response = dispatch(
        &endpoint,
        json!({"jsonrpc": "2.0", "method": "ghost", "id": "req-7"}),
    )
    .await;

    assert_exclusive(&response);
    assert_eq!(response["id"], "req-7");
    assert_eq!(response["error"]["code"], -32601);
    assert_eq!(response["error"]["message"], "Method \"ghost\" not found");
}

#[tokio::test]
async fn test_malformed_envelopes_are_invalid_requests() {
    let endpoint = calculator(RpcEndpoint::new());

    let wrong_version = dispatch(&endpoint, json!({"jsonrpc": "1.0", "method": "add", "id": 3})).await;
    assert_eq!(wrong_version["error"]["code"], -32600);
    assert_eq!(wrong_version["id"], 3);

    let numeric_method = dispatch(&endpoint, json!({"jsonrpc": "2.0", "method": 42, "id": 4})).await;
    assert_eq!(numeric_method["error"]["code"], -32600);
    assert_eq!(numeric_method["id"], 4);

    for body in [json!(42), json!("add"), json!([])] {
        let response = dispatch(&endpoint, body).await;
        assert_exclusive(&response);
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(response["id"], Value::Null);
    }
}

#[tokio::test]
async fn test_unparseable_body_is_parse_error() {
    let endpoint = calculator(RpcEndpoint::new());

    let response = endpoint
        .handle_text("{\"jsonrpc\": \"2.0\", ", TransportRequest::new())
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.body.unwrap();
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_notification_runs_without_response() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut endpoint = RpcEndpoint::new();
    let counter = calls.clone();
    endpoint
        .register(
            "log",
            method_fn(move |_: MethodCall| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, RpcError>(RichValue::Null)
                }
            }),
        )
        .unwrap();

    for body in [
        json!({"jsonrpc": "2.0", "method": "log"}),
        json!({"jsonrpc": "2.0", "method": "log", "id": null}),
    ] {
        let response = endpoint.handle(body, TransportRequest::new()).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(response.body.is_none());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // unknown method notifications stay silent as well
    let response = endpoint
        .handle(json!({"jsonrpc": "2.0", "method": "ghost"}), TransportRequest::new())
        .await;
    assert!(response.body.is_none());
}

#[tokio::test]
async fn test_strict_mode_requires_safe_header() {
    let endpoint = calculator(RpcEndpoint::builder().safe_enabled(true).strict_mode(true).build());
    let body = json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 2}, "id": 1});

    let rejected = dispatch(&endpoint, body.clone()).await;
    assert_eq!(rejected["error"]["code"], -32600);
    assert_eq!(rejected["error"]["data"]["requiredHeader"], "X-RPC-Safe-Enabled");
    assert_eq!(rejected["error"]["data"]["serverSafeString"], true);
    assert_eq!(rejected["id"], 1);

    let accepted = endpoint
        .handle(body, TransportRequest::new().with_header(SAFE_ENABLED_HEADER, "false"))
        .await;
    assert_eq!(accepted.body.unwrap()["result"], 3);
}

#[tokio::test]
async fn test_strict_mode_without_safe_serialization_is_open() {
    let endpoint = calculator(RpcEndpoint::builder().strict_mode(true).build());
    let response = dispatch(
        &endpoint,
        json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 2}, "id": 1}),
    )
    .await;
    assert_eq!(response["result"], 3);
}

#[tokio::test]
async fn test_result_encoded_with_server_policy() {
    let mut endpoint = RpcEndpoint::builder().safe_enabled(true).build();
    endpoint
        .register(
            "profile",
            method_fn(|_: MethodCall| async {
                let joined = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
                Ok::<_, RpcError>(RichValue::object([
                    ("name", RichValue::from("ada")),
                    ("joined", RichValue::from(joined)),
                    ("balance", RichValue::from(BigInt::from(42))),
                ]))
            }),
        )
        .unwrap();

    let response = endpoint
        .handle(
            json!({"jsonrpc": "2.0", "method": "profile", "id": 1}),
            TransportRequest::new(),
        )
        .await;

    assert_eq!(response.headers.get(SAFE_ENABLED_HEADER).unwrap(), "true");
    assert_eq!(response.headers.get(SAFE_STRING_HEADER).unwrap(), "true");
    assert_eq!(response.headers.get(SAFE_DATE_HEADER).unwrap(), "true");
    assert_eq!(
        response.body.unwrap()["result"],
        json!({"name": "S:ada", "joined": "D:2024-01-02T03:04:05.000Z", "balance": "42n"})
    );
}

#[tokio::test]
async fn test_params_decoded_with_client_flags() {
    let endpoint = calculator(RpcEndpoint::new());
    let body = json!({
        "jsonrpc": "2.0",
        "method": "echo",
        "params": {"name": "S:bob", "amount": "7n", "zip": "0123456"},
        "id": 1
    });

    // client declares safe mode: prefixes are stripped on the way in
    let safe = endpoint
        .handle(body.clone(), TransportRequest::new().with_header(SAFE_ENABLED_HEADER, "true"))
        .await;
    assert_eq!(
        safe.body.unwrap()["result"],
        json!({"name": "bob", "amount": "7n", "zip": "0123456"})
    );

    // undeclared client: the string is taken literally
    let plain = dispatch(&endpoint, body).await;
    assert_eq!(plain["result"]["name"], "S:bob");
    assert_eq!(plain["result"]["zip"], "0123456");
}

#[tokio::test]
async fn test_bigint_result_without_safe_mode() {
    let mut endpoint = RpcEndpoint::new();
    endpoint
        .register(
            "big",
            method_fn(|_: MethodCall| async {
                let value: BigInt = "123456789012345678901234567890".parse().unwrap();
                Ok::<_, RpcError>(value)
            }),
        )
        .unwrap();

    let response = endpoint
        .handle(json!({"jsonrpc": "2.0", "method": "big", "id": 1}), TransportRequest::new())
        .await;

    assert_eq!(response.headers.get(SAFE_ENABLED_HEADER).unwrap(), "false");
    let result = response.body.unwrap()["result"].clone();
    assert_eq!(result, json!("123456789012345678901234567890n"));

    let decoded = deserialize(result, &SafeOptions::disabled());
    assert_eq!(
        decoded.as_bigint().map(ToString::to_string).as_deref(),
        Some("123456789012345678901234567890")
    );
}

#[tokio::test]
async fn test_handler_code_and_data_preserved() {
    let mut endpoint = RpcEndpoint::new();
    endpoint
        .register(
            "withdraw",
            method_fn(|_: MethodCall| async {
                Err::<Value, _>(
                    RpcError::new("Insufficient funds")
                        .with_code(-32010)
                        .with_data(json!({"balance": 3})),
                )
            }),
        )
        .unwrap();

    let response = dispatch(&endpoint, json!({"jsonrpc": "2.0", "method": "withdraw", "id": 9})).await;

    assert_exclusive(&response);
    assert_eq!(
        response["error"],
        json!({"code": -32010, "message": "Insufficient funds", "data": {"balance": 3}})
    );
}

#[tokio::test]
async fn test_unannotated_error_is_internal_with_sanitized_details() {
    let mut endpoint = RpcEndpoint::new();
    endpoint
        .register(
            "load",
            method_fn(|_: MethodCall| async {
                let err = std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "cannot open /srv/app/data/ledger.db",
                );
                Err::<Value, _>(RpcError::from(err))
            }),
        )
        .unwrap();

    let response = dispatch(&endpoint, json!({"jsonrpc": "2.0", "method": "load", "id": 1})).await;

    let error = &response["error"];
    assert_eq!(error["code"], -32603);
    assert_eq!(error["data"]["error"]["name"], "Error");
    assert_eq!(error["data"]["error"]["message"], "cannot open [redacted]");
}

#[tokio::test]
async fn test_error_details_can_be_hidden() {
    let endpoint = calculator(RpcEndpoint::builder().expose_error_details(false).build());
    let mut hidden = RpcEndpoint::builder().expose_error_details(false).build();
    hidden
        .register(
            "boom",
            method_fn(|_: MethodCall| async { Err::<Value, _>(RpcError::new("boom")) }),
        )
        .unwrap();

    let response = dispatch(&hidden, json!({"jsonrpc": "2.0", "method": "boom", "id": 1})).await;
    assert_eq!(response["error"], json!({"code": -32603, "message": "boom"}));

    // custom codes are unaffected
    let custom = dispatch(&endpoint, json!({"jsonrpc": "2.0", "method": "fail", "id": 1})).await;
    assert_eq!(custom["error"]["code"], -32010);
}

#[tokio::test]
async fn test_schema_rejects_invalid_params() {
    let mut endpoint = RpcEndpoint::new();
    endpoint
        .register(
            "transfer",
            MethodSpec::new(method_fn(|call: MethodCall| async move {
                Ok::<_, RpcError>(call.params)
            }))
            .with_schema(json!({
                "type": "object",
                "properties": {"to": {"type": "string"}, "amount": {"type": "integer"}},
                "required": ["to", "amount"]
            })),
        )
        .unwrap();

    let response = dispatch(
        &endpoint,
        json!({"jsonrpc": "2.0", "method": "transfer", "params": {"amount": "lots"}, "id": 5}),
    )
    .await;

    assert_exclusive(&response);
    assert_eq!(response["id"], 5);
    assert_eq!(response["error"]["code"], -32602);
    let errors = response["error"]["data"]["validationErrors"].as_array().unwrap();
    let mut fields: Vec<&str> = errors.iter().map(|e| e["field"].as_str().unwrap()).collect();
    fields.sort();
    assert_eq!(fields, vec!["amount", "to"]);
}

#[tokio::test]
async fn test_schema_coerces_before_handler() {
    let mut endpoint = RpcEndpoint::builder()
        .validation(ValidatorConfig::default().with_remove_additional(crate::RemoveAdditional::All))
        .build();
    endpoint
        .register(
            "scale",
            MethodSpec::new(method_fn(|call: MethodCall| async move {
                Ok::<_, RpcError>(call.params)
            }))
            .with_schema(json!({
                "type": "object",
                "properties": {"factor": {"type": "number"}, "label": {"type": "string"}}
            })),
        )
        .unwrap();

    let response = dispatch(
        &endpoint,
        json!({
            "jsonrpc": "2.0",
            "method": "scale",
            "params": {"factor": "2.5", "label": 10, "debug": true},
            "id": 1
        }),
    )
    .await;

    assert_eq!(response["result"], json!({"factor": 2.5, "label": "10"}));
}

#[tokio::test]
async fn test_shared_context_reaches_handler() {
    struct Bank {
        name: &'static str,
    }

    let mut endpoint = RpcEndpoint::builder().shared(Bank { name: "first" }).build();
    endpoint
        .register(
            "bank",
            method_fn(|call: MethodCall| async move {
                let bank = call
                    .shared
                    .get::<Bank>()
                    .ok_or_else(|| RpcError::internal("no bank"))?;
                Ok::<_, RpcError>(bank.name)
            }),
        )
        .unwrap();

    let response = dispatch(&endpoint, json!({"jsonrpc": "2.0", "method": "bank", "id": 1})).await;
    assert_eq!(response["result"], "first");
}

#[tokio::test]
async fn test_introspection() {
    let mut endpoint = calculator(RpcEndpoint::new());
    endpoint
        .register(
            "transfer",
            MethodSpec::new(method_fn(|call: MethodCall| async move {
                Ok::<_, RpcError>(call.params)
            }))
            .with_schema(json!({"type": "object"}))
            .with_description("Move funds")
            .expose_schema(true),
        )
        .unwrap();
    endpoint
        .register(
            "secret",
            MethodSpec::new(method_fn(|_: MethodCall| async { Ok::<_, RpcError>(true) }))
                .with_schema(json!({"type": "object"})),
        )
        .unwrap();

    let list = dispatch(&endpoint, json!({"jsonrpc": "2.0", "method": "__rpc.listMethods", "id": 1})).await;
    let methods = list["result"].as_array().unwrap();
    let names: Vec<&str> = methods.iter().map(|m| m["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["add", "echo", "fail", "secret", "transfer"]);
    assert_eq!(methods[4], json!({"name": "transfer", "description": "Move funds", "hasSchema": true}));

    let described = dispatch(
        &endpoint,
        json!({"jsonrpc": "2.0", "method": "__rpc.describe", "params": {"method": "transfer"}, "id": 2}),
    )
    .await;
    assert_eq!(described["result"]["schema"], json!({"type": "object"}));

    let hidden = dispatch(
        &endpoint,
        json!({"jsonrpc": "2.0", "method": "__rpc.describe", "params": {"method": "secret"}, "id": 3}),
    )
    .await;
    assert!(hidden["result"].get("schema").is_none());

    let missing = dispatch(
        &endpoint,
        json!({"jsonrpc": "2.0", "method": "__rpc.describe", "params": {"method": "ghost"}, "id": 4}),
    )
    .await;
    assert_eq!(missing["error"]["code"], -32601);
}

#[tokio::test]
async fn test_metrics_counts_requests() {
    let endpoint = calculator(RpcEndpoint::new());
    dispatch(&endpoint, json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 1}, "id": 1})).await;
    dispatch(&endpoint, json!({"jsonrpc": "2.0", "method": "ghost", "id": 2})).await;
    dispatch(
        &endpoint,
        json!([
            {"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 1}, "id": 1},
            {"jsonrpc": "2.0", "method": "fail", "id": 2}
        ]),
    )
    .await;

    let metrics = endpoint.metrics();
    assert_eq!(metrics["methods"], 3);
    assert_eq!(metrics["requests"], json!({"total": 3, "errors": 2, "batches": 1}));
    assert_eq!(metrics["hooks"]["beforeCall"], 0);
}
