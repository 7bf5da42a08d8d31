//! The JSON-RPC dispatcher
//!
//! [`RpcEndpoint`] owns the method table, the hook pipeline and the schema
//! validator. Transports hand it a decoded body plus the transport request
//! and get back an [`EndpointResponse`] to write out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use http::{HeaderMap, StatusCode};
use saferpc_codec::{
    RichValue, SafeOptions, apply_safe_headers, deserialize, safe_options_from_headers, serialize,
};
use saferpc_json_rpc::{JsonRpcError, JsonRpcErrorObject, JsonRpcMessage, JsonRpcRequest, RequestId};
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::batch::is_batch_request;
use crate::config::EndpointConfig;
use crate::context::{ExecutionContext, ResponseHandle, SharedContext, TransportRequest};
use crate::error::{EndpointError, Result, RpcError};
use crate::logger::{RpcLogger, TracingRpcLogger};
use crate::method::{MethodCall, MethodDefinition, MethodEntry, MethodRegistry};
use crate::middleware::{Hook, HookFlow, HookId, HookStage, MiddlewareManager};
use crate::schema::{SchemaValidator, ValidatorConfig};

/// What the transport should write back
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: StatusCode,
    /// Safe-mode advertisement plus anything hooks set
    pub headers: HeaderMap,
    /// `None` when nothing is to be sent (notifications)
    pub body: Option<Value>,
}

/// A resolved call target
pub(crate) enum Target {
    Method(Arc<MethodEntry>),
    ListMethods,
    Describe,
}

impl Target {
    fn schema(&self) -> Option<&Value> {
        match self {
            Target::Method(entry) => entry.schema.as_ref(),
            Target::ListMethods | Target::Describe => None,
        }
    }
}

/// Why a call did not produce a result
enum CallFailure {
    /// Parameter validation failed; reported as-is without `onError`
    Validation(JsonRpcErrorObject),
    /// Handler or hook failure; goes through `onError`
    Handler(RpcError),
}

#[derive(Debug)]
struct EndpointStats {
    started: Instant,
    total: AtomicU64,
    errors: AtomicU64,
    batches: AtomicU64,
}

impl Default for EndpointStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            total: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        }
    }
}

/// Builder for [`RpcEndpoint`]
pub struct RpcEndpointBuilder {
    config: EndpointConfig,
    logger: Arc<dyn RpcLogger>,
    shared: SharedContext,
}

impl RpcEndpointBuilder {
    pub fn new() -> Self {
        Self {
            config: EndpointConfig::default(),
            logger: Arc::new(TracingRpcLogger),
            shared: SharedContext::empty(),
        }
    }

    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Result encode policy
    pub fn serialization(mut self, options: SafeOptions) -> Self {
        self.config.serialization = options;
        self
    }

    /// Turn both safe prefixes on or off
    pub fn safe_enabled(mut self, enabled: bool) -> Self {
        self.config.serialization.safe_string = enabled;
        self.config.serialization.safe_date = enabled;
        self
    }

    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.config.strict_mode = strict;
        self
    }

    pub fn introspection_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.introspection_prefix = prefix.into();
        self
    }

    pub fn introspection(mut self, enable: bool) -> Self {
        self.config.enable_introspection = enable;
        self
    }

    pub fn expose_error_details(mut self, expose: bool) -> Self {
        self.config.expose_error_details = expose;
        self
    }

    pub fn sanitize_errors(mut self, sanitize: bool) -> Self {
        self.config.sanitize_errors = sanitize;
        self
    }

    pub fn validation(mut self, validation: ValidatorConfig) -> Self {
        self.config.validation = validation;
        self
    }

    pub fn logger<L>(mut self, logger: L) -> Self
    where
        L: RpcLogger + 'static,
    {
        self.logger = Arc::new(logger);
        self
    }

    /// Application context passed to every handler
    pub fn shared<T>(mut self, value: T) -> Self
    where
        T: std::any::Any + Send + Sync,
    {
        self.shared = SharedContext::new(value);
        self
    }

    pub fn build(self) -> RpcEndpoint {
        RpcEndpoint {
            validator: SchemaValidator::new(self.config.validation.clone()),
            config: self.config,
            registry: MethodRegistry::new(),
            middleware: MiddlewareManager::new(),
            logger: self.logger,
            shared: self.shared,
            stats: EndpointStats::default(),
        }
    }
}

impl Default for RpcEndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON-RPC 2.0 dispatcher with hooks, validation, batching and safe
/// serialization
///
/// Methods and hooks are registered during setup through `&mut self`;
/// dispatch only needs `&self`, so the built endpoint is usually wrapped in
/// an `Arc` and shared with the transport.
pub struct RpcEndpoint {
    config: EndpointConfig,
    registry: MethodRegistry,
    middleware: MiddlewareManager,
    validator: SchemaValidator,
    logger: Arc<dyn RpcLogger>,
    shared: SharedContext,
    stats: EndpointStats,
}

impl RpcEndpoint {
    pub fn builder() -> RpcEndpointBuilder {
        RpcEndpointBuilder::new()
    }

    pub fn new() -> Self {
        RpcEndpointBuilder::new().build()
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Register a method, replacing any previous method of the same name.
    ///
    /// Fails for empty names, names inside the introspection namespace and
    /// schemas that do not compile.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        definition: impl Into<MethodDefinition>,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(EndpointError::EmptyMethodName);
        }
        if self.config.is_reserved(&name) {
            return Err(EndpointError::ReservedMethodName {
                name,
                prefix: self.config.introspection_prefix.clone(),
            });
        }

        let entry = MethodEntry::new(name, definition.into());
        if let Some(schema) = &entry.schema {
            self.validator
                .compile(schema)
                .map_err(|source| EndpointError::InvalidSchema {
                    method: entry.name.clone(),
                    source,
                })?;
        }

        let name = entry.name.clone();
        if self.registry.insert(entry).is_some() {
            warn!("Method {} was already registered; replacing it", name);
        } else {
            debug!("Registered method: {}", name);
        }
        Ok(())
    }

    pub fn remove_method(&mut self, name: &str) -> bool {
        self.registry.remove(name).is_some()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn method_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Append a hook to `stage`
    pub fn use_hook<H>(&mut self, stage: HookStage, hook: H) -> HookId
    where
        H: Hook + 'static,
    {
        self.middleware.use_hook(stage, hook)
    }

    /// Append a hook to the stage named `stage` (`"beforeCall"`, ...)
    pub fn use_named_hook<H>(&mut self, stage: &str, hook: H) -> Result<HookId>
    where
        H: Hook + 'static,
    {
        Ok(self.middleware.use_named(stage, hook)?)
    }

    pub fn middleware(&self) -> &MiddlewareManager {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut MiddlewareManager {
        &mut self.middleware
    }

    /// Dispatch a raw body that has not been parsed yet
    pub async fn handle_text(&self, body: &str, request: TransportRequest) -> EndpointResponse {
        self.handle_bytes(body.as_bytes(), request).await
    }

    /// Dispatch raw body bytes; unparseable input yields `-32700` with HTTP 400
    pub async fn handle_bytes(&self, body: &[u8], request: TransportRequest) -> EndpointResponse {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => self.handle(value, request).await,
            Err(err) => {
                debug!("Rejecting unparseable body: {}", err);
                self.stats.total.fetch_add(1, Ordering::Relaxed);
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                let message: JsonRpcMessage = JsonRpcError::parse_error().into();
                self.respond(StatusCode::BAD_REQUEST, &ResponseHandle::new(), Some(message_value(&message)))
            }
        }
    }

    /// Dispatch a single request or a batch
    pub async fn handle(&self, body: Value, request: TransportRequest) -> EndpointResponse {
        let request = Arc::new(request);
        let response = ResponseHandle::new();
        self.stats.total.fetch_add(1, Ordering::Relaxed);

        let body = if is_batch_request(&body) {
            self.stats.batches.fetch_add(1, Ordering::Relaxed);
            let messages = self.process_batch(&body, request, response.clone()).await;
            self.count_errors(&messages);
            if messages.is_empty() {
                None
            } else {
                Some(serde_json::to_value(&messages))
            }
        } else {
            let message = self.handle_single(&body, request, response.clone()).await;
            message.map(|message| {
                self.count_errors(std::slice::from_ref(&message));
                serde_json::to_value(&message)
            })
        };

        match body {
            None => self.respond(StatusCode::NO_CONTENT, &response, None),
            Some(Ok(body)) => self.respond(StatusCode::OK, &response, Some(body)),
            Some(Err(err)) => {
                error!("Failed to encode response envelope: {}", err);
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                let message: JsonRpcMessage = JsonRpcError::internal_error(None, None).into();
                self.respond(StatusCode::INTERNAL_SERVER_ERROR, &response, Some(message_value(&message)))
            }
        }
    }

    /// Run one non-batch envelope through the full pipeline
    async fn handle_single(
        &self,
        body: &Value,
        request: Arc<TransportRequest>,
        response: ResponseHandle,
    ) -> Option<JsonRpcMessage> {
        let call = match JsonRpcRequest::from_value(body) {
            Ok(call) => call,
            Err(error) => return Some(error.into()),
        };
        let notification = call.is_notification();
        let reply = |message: JsonRpcMessage| (!notification).then_some(message);

        let Some(target) = self.resolve(&call.method) else {
            debug!("Method not found: {}", call.method);
            return reply(JsonRpcMessage::error(
                call.id,
                JsonRpcErrorObject::method_not_found(&call.method),
            ));
        };

        let client_options = match self.negotiate(&request) {
            Ok(options) => options,
            Err(error) => return reply(JsonRpcMessage::error(call.id, error)),
        };

        let params = deserialize(call.params.unwrap_or(Value::Null), &client_options);
        let id = call.id.clone();
        let ctx = ExecutionContext::new(
            request,
            response,
            self.shared.clone(),
            call.method,
            params,
            call.id,
        );

        let outcome = self.run_call(ctx, &target, true).await;
        reply(self.to_message(id, outcome))
    }

    /// Look up a method, including the built-in introspection methods
    pub(crate) fn resolve(&self, method: &str) -> Option<Target> {
        if self.config.enable_introspection
            && let Some(name) = method
                .strip_prefix(self.config.introspection_prefix.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
        {
            return match name {
                "listMethods" => Some(Target::ListMethods),
                "describe" => Some(Target::Describe),
                _ => None,
            };
        }
        self.registry.get(method).map(Target::Method)
    }

    /// The client's advertised flags, or the strict-mode rejection
    pub(crate) fn negotiate(
        &self,
        request: &TransportRequest,
    ) -> std::result::Result<SafeOptions, JsonRpcErrorObject> {
        match safe_options_from_headers(&request.headers) {
            Some(options) => Ok(options),
            None if self.config.requires_safe_headers() => Err(self.strict_mode_error()),
            None => Ok(SafeOptions::disabled()),
        }
    }

    fn strict_mode_error(&self) -> JsonRpcErrorObject {
        JsonRpcErrorObject::invalid_request(
            Some("Safe serialization header required".to_string()),
            Some(json!({
                "serverSafeString": self.config.serialization.safe_string,
                "serverSafeDate": self.config.serialization.safe_date,
                "requiredHeader": "X-RPC-Safe-Enabled",
                "hint": "Declare the client's serialization mode with X-RPC-Safe-Enabled \
                         (or X-RPC-SafeString-Enabled and X-RPC-SafeDate-Enabled)",
            })),
        )
    }

    pub(crate) fn shared(&self) -> &SharedContext {
        &self.shared
    }

    /// Execute the hook chain and handler for one call, then normalize the
    /// outcome. `validate` enables the schema stages.
    pub(crate) async fn run_call(
        &self,
        mut ctx: ExecutionContext,
        target: &Target,
        validate: bool,
    ) -> std::result::Result<RichValue, JsonRpcErrorObject> {
        self.logger.rpc_call(&ctx);

        match self.pipeline(&mut ctx, target, validate).await {
            Ok(result) => {
                self.logger.rpc_success(&ctx, ctx.elapsed());
                Ok(result)
            }
            Err(CallFailure::Validation(error)) => {
                let elapsed = ctx.elapsed();
                self.logger
                    .rpc_error(&ctx, &RpcError::from(error.clone()), elapsed);
                Err(error)
            }
            Err(CallFailure::Handler(err)) => {
                ctx.error = Some(err.clone());
                // onError never propagates hook failures
                let _ = self.middleware.execute(HookStage::OnError, &mut ctx).await;
                let err = ctx.error.take().unwrap_or(err);

                self.logger.rpc_error(&ctx, &err, ctx.elapsed());
                Err(err.to_error_object(
                    self.config.expose_error_details,
                    self.config.sanitize_errors,
                ))
            }
        }
    }

    async fn pipeline(
        &self,
        ctx: &mut ExecutionContext,
        target: &Target,
        validate: bool,
    ) -> std::result::Result<RichValue, CallFailure> {
        let flow = self
            .middleware
            .execute(HookStage::BeforeCall, ctx)
            .await
            .map_err(CallFailure::Handler)?;

        if flow == HookFlow::Continue {
            if validate && let Some(schema) = target.schema() {
                self.validate_params(ctx, schema).await?;
            }

            let result = self.invoke(target, ctx).await.map_err(CallFailure::Handler)?;
            ctx.result = Some(result);
        }

        self.middleware
            .execute(HookStage::AfterCall, ctx)
            .await
            .map_err(CallFailure::Handler)?;

        Ok(ctx.result.take().unwrap_or(RichValue::Null))
    }

    async fn validate_params(
        &self,
        ctx: &mut ExecutionContext,
        schema: &Value,
    ) -> std::result::Result<(), CallFailure> {
        self.middleware
            .execute(HookStage::BeforeValidation, ctx)
            .await
            .map_err(CallFailure::Handler)?;

        let outcome = self
            .validator
            .validate(&ctx.params, schema)
            .map_err(|e| CallFailure::Handler(RpcError::from_error(e)))?;
        if !outcome.valid {
            return Err(CallFailure::Validation(JsonRpcErrorObject::invalid_params(
                "Invalid params",
                Some(json!({ "validationErrors": outcome.errors })),
            )));
        }
        ctx.params = outcome.data;

        self.middleware
            .execute(HookStage::AfterValidation, ctx)
            .await
            .map_err(CallFailure::Handler)?;
        Ok(())
    }

    async fn invoke(
        &self,
        target: &Target,
        ctx: &ExecutionContext,
    ) -> std::result::Result<RichValue, RpcError> {
        match target {
            Target::Method(entry) => {
                entry
                    .handler
                    .call(MethodCall {
                        params: ctx.params.clone(),
                        request: ctx.request.clone(),
                        shared: ctx.shared.clone(),
                        id: ctx.id.clone(),
                    })
                    .await
            }
            Target::ListMethods => {
                let methods: Vec<Value> = self
                    .registry
                    .entries()
                    .iter()
                    .map(|entry| {
                        json!({
                            "name": entry.name,
                            "description": entry.description,
                            "hasSchema": entry.schema.is_some(),
                        })
                    })
                    .collect();
                Ok(RichValue::from(Value::Array(methods)))
            }
            Target::Describe => {
                let name = ctx
                    .params
                    .get("method")
                    .and_then(RichValue::as_str)
                    .ok_or_else(|| RpcError::invalid_params("Parameter \"method\" must be a string"))?;
                let entry = self.registry.get(name).ok_or_else(|| {
                    RpcError::from(JsonRpcErrorObject::method_not_found(name))
                })?;

                let mut description = json!({
                    "name": entry.name,
                    "description": entry.description,
                });
                if entry.expose_schema
                    && let Some(schema) = &entry.schema
                {
                    description["schema"] = schema.clone();
                }
                Ok(RichValue::from(description))
            }
        }
    }

    /// Encode a call outcome as a response envelope
    pub(crate) fn to_message(
        &self,
        id: Option<RequestId>,
        outcome: std::result::Result<RichValue, JsonRpcErrorObject>,
    ) -> JsonRpcMessage {
        match outcome {
            Ok(result) => JsonRpcMessage::success(id, serialize(&result, &self.config.serialization)),
            Err(error) => JsonRpcMessage::error(id, error),
        }
    }

    fn count_errors(&self, messages: &[JsonRpcMessage]) {
        let errors = messages.iter().filter(|m| m.is_error()).count() as u64;
        if errors > 0 {
            self.stats.errors.fetch_add(errors, Ordering::Relaxed);
        }
    }

    fn respond(&self, status: StatusCode, response: &ResponseHandle, body: Option<Value>) -> EndpointResponse {
        let mut headers = response.headers();
        apply_safe_headers(&mut headers, &self.config.serialization);
        EndpointResponse {
            status: response.status().unwrap_or(status),
            headers,
            body,
        }
    }

    /// Snapshot for the metrics side endpoint
    pub fn metrics(&self) -> Value {
        json!({
            "methods": self.registry.len(),
            "hooks": self.middleware.hook_counts(),
            "requests": {
                "total": self.stats.total.load(Ordering::Relaxed),
                "errors": self.stats.errors.load(Ordering::Relaxed),
                "batches": self.stats.batches.load(Ordering::Relaxed),
            },
            "uptimeSeconds": self.stats.started.elapsed().as_secs(),
        })
    }
}

impl Default for RpcEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

fn message_value(message: &JsonRpcMessage) -> Value {
    serde_json::to_value(message).unwrap_or_else(|_| {
        json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32603, "message": "Internal error"}})
    })
}
