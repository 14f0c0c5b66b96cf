//! Layered error definitions
//!
//! Categorized by source: interval / cue / subscription / config

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Interval Errors =====
    /// Interval construction error (low > high, NaN bound)
    #[error("invalid interval [{low}, {high}]: {message}")]
    InvalidInterval { low: f64, high: f64, message: String },

    // ===== Cue Errors =====
    /// Malformed cue batch entry
    #[error("invalid cue at batch index {index}: {message}")]
    InvalidCue { index: usize, message: String },

    // ===== Subscription Errors =====
    /// The same handler was registered twice
    #[error("handler already subscribed to '{event}'")]
    DuplicateSubscription { event: String },

    /// Event name not supported by the emitter
    #[error("unsupported event '{event}', expected one of {supported:?}")]
    UnsupportedEvent {
        event: String,
        supported: Vec<&'static str>,
    },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create interval construction error
    pub fn invalid_interval(low: f64, high: f64, message: impl Into<String>) -> Self {
        Self::InvalidInterval {
            low,
            high,
            message: message.into(),
        }
    }

    /// Create cue batch entry error
    pub fn invalid_cue(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidCue {
            index,
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ContractError::invalid_interval(20.0, 10.0, "low is greater than high");
        assert_eq!(
            err.to_string(),
            "invalid interval [20, 10]: low is greater than high"
        );

        let err = ContractError::config_validation("sequencer.lookahead_s", "must be positive");
        assert!(err.to_string().contains("sequencer.lookahead_s"));
    }
}
