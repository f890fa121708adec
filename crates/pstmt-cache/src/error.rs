//! Crate-level error type.
//!
//! Execution paths never use this type: cache operations return the wrapped
//! backend's own error unchanged. It only covers setup concerns that belong to
//! this crate (configuration loading, logging initialization).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Observability error: {0}")]
    Observability(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_observability(&self) -> bool {
        matches!(self, Self::Observability(_))
    }
}

/// Result type for configuration and setup operations
pub type Result<T> = std::result::Result<T, Error>;
