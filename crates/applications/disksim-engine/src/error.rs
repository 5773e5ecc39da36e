//! Error types for the disk simulator

use thiserror::Error;

/// Simulator result type
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while configuring or running a simulation
#[derive(Error, Debug)]
pub enum SimError {
    /// Parameter outside its domain, rejected before the run starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Core-logic bug detected at runtime (never a recoverable condition)
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Whether this error came from configuration validation
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
