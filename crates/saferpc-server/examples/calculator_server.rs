//! Calculator Server
//!
//! JSON-RPC calculator with schema-validated params, BigInt results and a
//! couple of lifecycle hooks.
//!
//! Usage:
//! ```bash
//! RUST_LOG=info cargo run --package saferpc-server --example calculator_server
//!
//! curl -s localhost:8647/rpc -H 'Content-Type: application/json' \
//!   -d '{"jsonrpc":"2.0","method":"add","params":{"a":5,"b":"3"},"id":1}'
//! ```

use std::sync::Arc;

use anyhow::Result;
use num_bigint::BigInt;
use saferpc_server::prelude::*;
use serde_json::json;
use tracing::info;

fn number_pair_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "number"},
            "b": {"type": "number"}
        },
        "required": ["a", "b"],
        "additionalProperties": false
    })
}

fn build_endpoint() -> Result<RpcEndpoint> {
    let mut endpoint = RpcEndpoint::builder()
        .safe_enabled(true)
        .validation(
            ValidatorConfig::default().with_remove_additional(RemoveAdditional::Restricted),
        )
        .build();

    endpoint.register(
        "add",
        MethodSpec::new(method_fn(|call: MethodCall| async move {
            Ok::<_, RpcError>(call.f64_param("a")? + call.f64_param("b")?)
        }))
        .with_schema(number_pair_schema())
        .with_description("Add two numbers")
        .expose_schema(true),
    )?;

    endpoint.register(
        "divide",
        MethodSpec::new(method_fn(|call: MethodCall| async move {
            let divisor = call.f64_param("b")?;
            if divisor == 0.0 {
                return Err(RpcError::new("Division by zero")
                    .with_code(-32001)
                    .with_data(json!({"dividend": call.f64_param("a")?})));
            }
            Ok::<_, RpcError>(call.f64_param("a")? / divisor)
        }))
        .with_schema(number_pair_schema())
        .with_description("Divide a by b"),
    )?;

    endpoint.register(
        "factorial",
        MethodSpec::new(method_fn(|call: MethodCall| async move {
            let n = call.i64_param("n")?;
            let result = (1..=n).fold(BigInt::from(1), |acc, k| acc * k);
            Ok::<_, RpcError>(result)
        }))
        .with_schema(json!({
            "type": "object",
            "properties": {"n": {"type": "integer", "minimum": 0, "maximum": 500}},
            "required": ["n"]
        }))
        .with_description("n! as an arbitrary precision integer"),
    )?;

    endpoint.register(
        "now",
        method_fn(|_: MethodCall| async move { Ok::<_, RpcError>(Utc::now()) }),
    )?;

    endpoint.use_hook(
        HookStage::BeforeCall,
        hook_fn(|ctx| {
            info!(method = %ctx.method, batch_index = ?ctx.batch_index, "call received");
            Ok(HookFlow::Continue)
        }),
    );
    endpoint.use_hook(
        HookStage::OnError,
        hook_fn(|ctx| {
            if let Some(error) = &ctx.error {
                info!(method = %ctx.method, error = %error, "call failed");
            }
            Ok(HookFlow::Continue)
        }),
    );

    Ok(endpoint)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let endpoint = build_endpoint()?;
    info!("Registered methods: {:?}", endpoint.method_names());

    let server = RpcHttpServer::builder(Arc::new(endpoint))
        .bind_address("127.0.0.1:8647".parse()?)
        .metrics(true)
        .build();

    server.run().await?;
    Ok(())
}
