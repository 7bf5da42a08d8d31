//! Hook trait and lifecycle stages

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use super::MiddlewareError;
use crate::context::ExecutionContext;
use crate::error::RpcError;

/// Lifecycle stage a hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookStage {
    BeforeCall,
    AfterCall,
    OnError,
    BeforeValidation,
    AfterValidation,
}

impl HookStage {
    pub const ALL: [HookStage; 5] = [
        HookStage::BeforeCall,
        HookStage::AfterCall,
        HookStage::OnError,
        HookStage::BeforeValidation,
        HookStage::AfterValidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookStage::BeforeCall => "beforeCall",
            HookStage::AfterCall => "afterCall",
            HookStage::OnError => "onError",
            HookStage::BeforeValidation => "beforeValidation",
            HookStage::AfterValidation => "afterValidation",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookStage {
    type Err = MiddlewareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| MiddlewareError::UnknownStage(s.to_string()))
    }
}

/// What the chain should do after a hook returns successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    /// Run the next hook in the stage
    Continue,
    /// Skip the remaining hooks in the stage
    Stop,
}

/// A lifecycle hook
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use saferpc_server::{ExecutionContext, RpcError};
/// use saferpc_server::middleware::{Hook, HookFlow};
///
/// struct RequireApiKey;
///
/// #[async_trait]
/// impl Hook for RequireApiKey {
///     async fn run(&self, ctx: &mut ExecutionContext) -> Result<HookFlow, RpcError> {
///         match ctx.request.header("x-api-key") {
///             Some("secret") => Ok(HookFlow::Continue),
///             _ => Err(RpcError::new("Unauthorized").with_code(-32001)),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Hook: Send + Sync {
    async fn run(&self, ctx: &mut ExecutionContext) -> Result<HookFlow, RpcError>;
}

/// Adapter turning a synchronous closure into a [`Hook`]
pub struct FnHook<F> {
    f: F,
}

/// Wrap a closure as a hook
pub fn hook_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&mut ExecutionContext) -> Result<HookFlow, RpcError> + Send + Sync,
{
    FnHook { f }
}

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&mut ExecutionContext) -> Result<HookFlow, RpcError> + Send + Sync,
{
    async fn run(&self, ctx: &mut ExecutionContext) -> Result<HookFlow, RpcError> {
        (self.f)(ctx)
    }
}
