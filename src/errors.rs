//! Error handling for the stroke risk engine
//!
//! Every failure the core can produce is one of the variants below. Callers
//! receive them unmodified; the engine never logs-and-swallows an error or
//! substitutes a default probability.

use thiserror::Error;

/// Main error type for the risk scoring pipeline
#[derive(Error, Debug)]
pub enum RiskError {
    /// Malformed, missing or out-of-range input. Client-caused, never retried.
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Classifier artifact missing, corrupt or incompatible with the encoder.
    #[error("Model load failed: {path} - {message}")]
    ModelLoad { path: String, message: String },

    /// Degenerate explanation state for a single request.
    #[error("Attribution error: {message}")]
    Attribution { message: String },

    /// The loaded classifier produced an unusable output.
    #[error("Inference error: {message}")]
    Inference { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for Result with RiskError
pub type RiskResult<T> = Result<T, RiskError>;

impl RiskError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a model load error
    pub fn model_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an attribution error
    pub fn attribution(message: impl Into<String>) -> Self {
        Self::Attribution {
            message: message.into(),
        }
    }

    /// Create an inference error
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// True when the caller supplied bad input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RiskError::Validation { .. })
    }

    /// No failure in the core can succeed on a blind retry: validation needs new
    /// input, load failures need an operator, attribution failures are
    /// deterministic for a given input.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<serde_json::Error> for RiskError {
    fn from(err: serde_json::Error) -> Self {
        RiskError::serialization("json_operation", err)
    }
}

impl From<std::io::Error> for RiskError {
    fn from(err: std::io::Error) -> Self {
        RiskError::io("io_operation", err)
    }
}

impl From<figment::Error> for RiskError {
    fn from(err: figment::Error) -> Self {
        RiskError::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RiskError::validation("avg_glucose_level", "must be greater than 0");
        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("avg_glucose_level"));
        assert!(err.is_client_error());

        let err = RiskError::model_load("models/missing.json", "file not found");
        assert!(err.to_string().contains("Model load failed"));
        assert!(!err.is_client_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_chaining() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err = RiskError::io("reading artifact", io_err);

        assert!(err.source().is_some());
        assert!(err.to_string().contains("I/O operation failed"));
    }
}
