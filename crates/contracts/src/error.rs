//! Layered error definitions
//!
//! Categorized by source: codec / radio / config

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Codec Errors =====
    /// Packet or identifier has the wrong length.
    ///
    /// For identifiers, `actual` counts the leading hex digits that could be
    /// decoded, so non-hex input is reported as a short identifier.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    // ===== Radio Errors =====
    /// Stop/start/connect/write/disconnect failure reported by the radio stack
    #[error("radio {operation} failed: {message}")]
    RadioTransient { operation: String, message: String },

    /// A radio step did not finish in time
    #[error("radio {operation} timed out after {waited_ms}ms")]
    Timeout { operation: String, waited_ms: u64 },

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
    /// Create invalid length error
    pub fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }

    /// Create transient radio error
    pub fn radio(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RadioTransient {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create radio timeout error
    pub fn timeout(operation: impl Into<String>, waited_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            waited_ms,
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

    /// Radio errors and timeouts are recovered by retry; everything else is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RadioTransient { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ContractError::radio("connect", "gone").is_transient());
        assert!(ContractError::timeout("write", 1000).is_transient());
        assert!(!ContractError::invalid_length(32, 31).is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = ContractError::timeout("connect", 1000);
        assert_eq!(err.to_string(), "radio connect timed out after 1000ms");

        let err = ContractError::invalid_length(32, 31);
        assert_eq!(err.to_string(), "invalid length: expected 32, got 31");
    }
}
