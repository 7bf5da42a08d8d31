//! Method handlers and the registration table

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use saferpc_codec::RichValue;
use saferpc_json_rpc::RequestId;
use serde_json::Value;

use crate::context::{SharedContext, TransportRequest};
use crate::error::RpcError;

/// Everything a handler receives for one invocation
#[derive(Debug, Clone)]
pub struct MethodCall {
    /// Decoded (and, where a schema applies, validated) parameters
    pub params: RichValue,
    pub request: Arc<TransportRequest>,
    pub shared: SharedContext,
    /// `None` for notifications
    pub id: Option<RequestId>,
}

impl MethodCall {
    /// Named parameter lookup
    pub fn param(&self, name: &str) -> Option<&RichValue> {
        self.params.get(name)
    }

    /// Named numeric parameter, failing with `-32602` if absent or not a number
    pub fn f64_param(&self, name: &str) -> Result<f64, RpcError> {
        self.param(name)
            .and_then(RichValue::as_f64)
            .ok_or_else(|| RpcError::invalid_params(format!("Parameter \"{}\" must be a number", name)))
    }

    /// Named integer parameter, failing with `-32602` if absent or not an integer
    pub fn i64_param(&self, name: &str) -> Result<i64, RpcError> {
        self.param(name)
            .and_then(RichValue::as_i64)
            .ok_or_else(|| RpcError::invalid_params(format!("Parameter \"{}\" must be an integer", name)))
    }
}

/// A callable RPC method
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn call(&self, call: MethodCall) -> Result<RichValue, RpcError>;
}

/// Adapter turning an async closure into a [`MethodHandler`]
pub struct FnMethod<F> {
    f: F,
}

/// Wrap an async closure as a method handler
///
/// ```rust
/// use saferpc_server::{method_fn, MethodCall, RpcError};
///
/// let add = method_fn(|call: MethodCall| async move {
///     Ok::<_, RpcError>(call.f64_param("a")? + call.f64_param("b")?)
/// });
/// # let _ = add;
/// ```
pub fn method_fn<F, Fut, R>(f: F) -> FnMethod<F>
where
    F: Fn(MethodCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, RpcError>> + Send,
    R: Into<RichValue>,
{
    FnMethod { f }
}

#[async_trait]
impl<F, Fut, R> MethodHandler for FnMethod<F>
where
    F: Fn(MethodCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, RpcError>> + Send,
    R: Into<RichValue>,
{
    async fn call(&self, call: MethodCall) -> Result<RichValue, RpcError> {
        (self.f)(call).await.map(Into::into)
    }
}

/// A handler together with its schema and metadata
#[derive(Clone)]
pub struct MethodSpec {
    handler: Arc<dyn MethodHandler>,
    schema: Option<Value>,
    description: Option<String>,
    expose_schema: bool,
}

impl MethodSpec {
    pub fn new<H>(handler: H) -> Self
    where
        H: MethodHandler + 'static,
    {
        Self {
            handler: Arc::new(handler),
            schema: None,
            description: None,
            expose_schema: false,
        }
    }

    /// JSON Schema for the method's `params`
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Publish the schema through `describe` introspection
    pub fn expose_schema(mut self, expose: bool) -> Self {
        self.expose_schema = expose;
        self
    }
}

/// What can be registered under a method name
pub enum MethodDefinition {
    /// Just a handler
    Bare(Arc<dyn MethodHandler>),
    /// Handler with schema and metadata
    Described(MethodSpec),
}

impl<H> From<H> for MethodDefinition
where
    H: MethodHandler + 'static,
{
    fn from(handler: H) -> Self {
        MethodDefinition::Bare(Arc::new(handler))
    }
}

impl From<MethodSpec> for MethodDefinition {
    fn from(spec: MethodSpec) -> Self {
        MethodDefinition::Described(spec)
    }
}

/// A registered method
pub struct MethodEntry {
    pub name: String,
    pub handler: Arc<dyn MethodHandler>,
    pub schema: Option<Value>,
    pub description: Option<String>,
    pub expose_schema: bool,
}

impl MethodEntry {
    pub fn new(name: impl Into<String>, definition: MethodDefinition) -> Self {
        let name = name.into();
        match definition {
            MethodDefinition::Bare(handler) => Self {
                name,
                handler,
                schema: None,
                description: None,
                expose_schema: false,
            },
            MethodDefinition::Described(spec) => Self {
                name,
                handler: spec.handler,
                schema: spec.schema,
                description: spec.description,
                expose_schema: spec.expose_schema,
            },
        }
    }
}

/// Name → method table
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<MethodEntry>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the one it replaced
    pub fn insert(&mut self, entry: MethodEntry) -> Option<Arc<MethodEntry>> {
        self.methods.insert(entry.name.clone(), Arc::new(entry))
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<MethodEntry>> {
        self.methods.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<MethodEntry>> {
        self.methods.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered entries, sorted by name
    pub fn entries(&self) -> Vec<Arc<MethodEntry>> {
        let mut entries: Vec<Arc<MethodEntry>> = self.methods.values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
