//! Top-level error type.

use thiserror::Error;

use crate::cache::CacheError;
use crate::compiler::CompileError;
use crate::config::ConfigError;
use crate::routing::RouteError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RouteError> for GatewayError {
    fn from(err: RouteError) -> Self {
        GatewayError::Compile(err.into())
    }
}

impl From<CacheError> for GatewayError {
    fn from(err: CacheError) -> Self {
        GatewayError::Compile(err.into())
    }
}
