//! Middleware error types

use thiserror::Error;

/// Errors raised while configuring the hook registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiddlewareError {
    #[error("Unknown hook stage \"{0}\" (expected beforeCall, afterCall, onError, beforeValidation or afterValidation)")]
    UnknownStage(String),
}
