//! Hook pipeline for the dispatch lifecycle
//!
//! Hooks are registered per [`HookStage`] and run strictly in registration
//! order, each awaited before the next starts. A hook mutates the shared
//! [`ExecutionContext`](crate::ExecutionContext) and tells the chain whether to
//! go on:
//!
//! - `Ok(HookFlow::Continue)`: run the next hook
//! - `Ok(HookFlow::Stop)`: skip the remaining hooks of this stage; the context
//!   built so far is kept
//! - `Err(RpcError)`: abort the request with that error, except in the
//!   `onError` stage where the failure is logged and the chain goes on
//!
//! # Examples
//!
//! ```rust
//! use saferpc_server::middleware::{HookFlow, HookStage, MiddlewareManager, hook_fn};
//!
//! let mut manager = MiddlewareManager::new();
//! manager.use_hook(HookStage::BeforeCall, hook_fn(|ctx| {
//!     ctx.extensions.insert("seen".into(), serde_json::json!(true));
//!     Ok(HookFlow::Continue)
//! }));
//! assert_eq!(manager.count(HookStage::BeforeCall), 1);
//! ```

pub mod error;
pub mod hook;
pub mod manager;

pub use error::MiddlewareError;
pub use hook::{FnHook, Hook, HookFlow, HookStage, hook_fn};
pub use manager::{HookId, MiddlewareManager};
