//! Error types for Galvani
//!
//! ## Table of Contents
//! - **GalvaniError**: Main error enum covering all failure modes
//! - **Result**: Type alias for `Result<T, GalvaniError>`

use thiserror::Error;

/// Result type alias for Galvani operations
pub type Result<T> = std::result::Result<T, GalvaniError>;

/// Main error type for Galvani operations
#[derive(Error, Debug)]
pub enum GalvaniError {
    /// Configuration error during builder setup
    #[error("configuration error: {0}")]
    Config(String),

    /// Request field out of range or malformed
    #[error("validation error: {0}")]
    Validation(String),

    /// Model asked to predict a system type it does not support
    #[error("unsupported system type: {0}")]
    UnsupportedSystem(String),

    /// Routing table has no registered model for the system type
    #[error("no model registered for system type: {0}")]
    NoModelForSystem(String),

    /// Every ensemble candidate failed
    #[error("ensemble exhausted: {0}")]
    EnsembleExhausted(String),

    /// Polarization solver raised or returned malformed output
    #[error("simulation error: {0}")]
    Simulation(String),

    /// Numeric precondition violated while computing a prediction
    #[error("computation error on parameter '{parameter}': {message}")]
    Computation {
        /// Parameter that violated its numeric precondition
        parameter: String,
        /// What went wrong
        message: String,
    },

    /// Material property source unreachable or returned garbage
    #[error("material lookup error: {0}")]
    Lookup(String),

    /// Metrics collection or export failure
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Generic IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (should not occur in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

impl GalvaniError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a simulation error
    pub fn simulation(msg: impl Into<String>) -> Self {
        Self::Simulation(msg.into())
    }

    /// Create a computation error for a named parameter
    pub fn computation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Computation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a material lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a metrics error
    pub fn metrics(msg: impl Into<String>) -> Self {
        Self::Metrics(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<reqwest::Error> for GalvaniError {
    fn from(err: reqwest::Error) -> Self {
        Self::Lookup(err.to_string())
    }
}

impl From<prometheus::Error> for GalvaniError {
    fn from(err: prometheus::Error) -> Self {
        Self::Metrics(err.to_string())
    }
}
