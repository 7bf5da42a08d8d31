//! Call logging collaborator

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::error::RpcError;

/// Observability hooks invoked by the dispatcher for every executed call
pub trait RpcLogger: Send + Sync {
    fn rpc_call(&self, ctx: &ExecutionContext);
    fn rpc_success(&self, ctx: &ExecutionContext, elapsed: Duration);
    fn rpc_error(&self, ctx: &ExecutionContext, error: &RpcError, elapsed: Duration);
}

/// Default logger emitting `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRpcLogger;

impl RpcLogger for TracingRpcLogger {
    fn rpc_call(&self, ctx: &ExecutionContext) {
        debug!(
            method = %ctx.method,
            id = ?ctx.id,
            batch_index = ?ctx.batch_index,
            "rpc call"
        );
    }

    fn rpc_success(&self, ctx: &ExecutionContext, elapsed: Duration) {
        info!(
            method = %ctx.method,
            id = ?ctx.id,
            batch_index = ?ctx.batch_index,
            elapsed_ms = elapsed.as_millis() as u64,
            "rpc success"
        );
    }

    fn rpc_error(&self, ctx: &ExecutionContext, error: &RpcError, elapsed: Duration) {
        warn!(
            method = %ctx.method,
            id = ?ctx.id,
            batch_index = ?ctx.batch_index,
            elapsed_ms = elapsed.as_millis() as u64,
            code = ?error.code,
            "rpc error: {}",
            error.message
        );
    }
}
