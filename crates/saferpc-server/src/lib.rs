//! # SafeRPC Server
//!
//! JSON-RPC 2.0 endpoint with an ordered hook pipeline, JSON Schema parameter
//! validation, concurrent batch processing and negotiated safe serialization
//! of BigInt and Date values.
//!
//! ## Features
//! - Single and batch requests, notifications, standard error codes
//! - Five hook stages: `beforeCall`, `afterCall`, `onError`,
//!   `beforeValidation`, `afterValidation`
//! - Per-method JSON Schema with type coercion and property stripping
//! - `X-RPC-Safe-Enabled` negotiation with an optional strict gate
//! - Built-in `__rpc.listMethods` / `__rpc.describe` introspection
//! - hyper-based HTTP transport with `/health` and `/metrics` (feature `http`)
//!
//! ```rust
//! use saferpc_server::prelude::*;
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let mut endpoint = RpcEndpoint::new();
//! endpoint
//!     .register("add", method_fn(|call: MethodCall| async move {
//!         Ok::<_, RpcError>(call.f64_param("a")? + call.f64_param("b")?)
//!     }))
//!     .unwrap();
//!
//! let response = endpoint
//!     .handle(
//!         json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 5, "b": 3}, "id": 1}),
//!         TransportRequest::new(),
//!     )
//!     .await;
//! assert_eq!(response.body.unwrap()["result"], json!(8.0));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod logger;
pub mod method;
pub mod middleware;
pub mod schema;
#[cfg(feature = "http")]
pub mod server;

pub mod prelude;

#[cfg(test)]
mod tests;

// Re-export main types
pub use batch::{is_batch_request, validate_batch};
pub use config::{DEFAULT_INTROSPECTION_PREFIX, EndpointConfig};
pub use context::{ExecutionContext, ResponseHandle, SharedContext, TransportRequest};
pub use endpoint::{EndpointResponse, RpcEndpoint, RpcEndpointBuilder};
pub use error::{EndpointError, Result, RpcError, sanitize_text};
pub use logger::{RpcLogger, TracingRpcLogger};
pub use method::{
    FnMethod, MethodCall, MethodDefinition, MethodEntry, MethodHandler, MethodRegistry, MethodSpec,
    method_fn,
};
pub use middleware::{Hook, HookFlow, HookId, HookStage, MiddlewareManager, hook_fn};
pub use schema::{
    FieldError, RemoveAdditional, SchemaError, SchemaValidator, ValidationOutcome, ValidatorConfig,
};
#[cfg(feature = "http")]
pub use server::{HttpServerConfig, RpcHttpServer, RpcHttpServerBuilder};

// Re-export foundational types
pub use saferpc_codec::{BigInt, DateTime, RichValue, SafeOptions, Utc};
pub use saferpc_json_rpc::{JsonRpcErrorObject, JsonRpcMessage, RequestId};
