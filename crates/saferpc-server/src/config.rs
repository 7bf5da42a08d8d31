//! Endpoint configuration

use saferpc_codec::SafeOptions;
use serde::Deserialize;

use crate::schema::ValidatorConfig;

/// Default namespace for built-in introspection methods
pub const DEFAULT_INTROSPECTION_PREFIX: &str = "__rpc";

/// Dispatch configuration for an [`RpcEndpoint`](crate::RpcEndpoint)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Encode policy for results; also advertised in response headers
    pub serialization: SafeOptions,
    /// Reject safe-mode requests from clients that do not declare their policy
    pub strict_mode: bool,
    /// Reserved method namespace
    pub introspection_prefix: String,
    pub enable_introspection: bool,
    /// Attach `data.error` debug payloads to handler errors
    pub expose_error_details: bool,
    /// Redact paths and addresses inside debug payloads
    pub sanitize_errors: bool,
    pub validation: ValidatorConfig,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            serialization: SafeOptions::default(),
            strict_mode: false,
            introspection_prefix: DEFAULT_INTROSPECTION_PREFIX.to_string(),
            enable_introspection: true,
            expose_error_details: true,
            sanitize_errors: true,
            validation: ValidatorConfig::default(),
        }
    }
}

impl EndpointConfig {
    /// Whether the strict negotiation gate applies at all
    pub fn requires_safe_headers(&self) -> bool {
        self.strict_mode && self.serialization.any()
    }

    pub fn is_reserved(&self, method: &str) -> bool {
        method.starts_with(&self.introspection_prefix)
    }
}
