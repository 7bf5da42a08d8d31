//! # SafeRPC Server Prelude
//!
//! ```rust
//! use saferpc_server::prelude::*;
//! ```

// Endpoint and registration
pub use crate::endpoint::{EndpointResponse, RpcEndpoint, RpcEndpointBuilder};
pub use crate::method::{MethodCall, MethodHandler, MethodSpec, method_fn};
pub use crate::config::EndpointConfig;

// Hooks
pub use crate::context::{ExecutionContext, SharedContext, TransportRequest};
pub use crate::middleware::{Hook, HookFlow, HookStage, hook_fn};

// Validation
pub use crate::schema::{RemoveAdditional, ValidatorConfig};

#[cfg(feature = "http")]
pub use crate::server::{HttpServerConfig, RpcHttpServer};

// Values
pub use saferpc_codec::{BigInt, DateTime, RichValue, SAFE_ENABLED_HEADER, SafeOptions, Utc};

// Error types
pub use crate::{EndpointError, Result, RpcError};
