//! Error types for geofence

use thiserror::Error;

/// Result type alias using geofence's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for registry, store and configuration operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fence store error
    #[error("Store error: {0}")]
    Store(String),

    /// Region-monitoring engine error
    #[error("Monitoring engine error: {0}")]
    Monitor(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a monitoring engine error
    pub fn monitor(msg: impl Into<String>) -> Self {
        Self::Monitor(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
