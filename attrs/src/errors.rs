//! Attribute engine error types
//!
//! Everything below the reference store boundary is reported through
//! `AttrsError`; the store turns it into a `false` load result plus a
//! recorded last error. Classification itself never fails.

use thiserror::Error;

use crate::decoder::DecodeError;

/// Error category for structured logging and behavior mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// `attrs.toml` or env misconfigured
    ConfigError,
    /// Transport, timeout or HTTP status failures
    FetchError,
    /// Obfuscated payload could not be decoded
    DecodeError,
    /// Decoded text is not a reference table document
    ParseError,
    /// Unexpected logic bugs/panics
    InternalError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::FetchError => "FETCH_ERROR",
            Self::DecodeError => "DECODE_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same load may succeed
    pub fn retryable(self) -> bool {
        matches!(self, Self::FetchError)
    }
}

/// Attribute engine error with category and context
#[derive(Debug, Error)]
pub enum AttrsError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("fetch error: {message}")]
    Fetch {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AttrsError {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::Fetch { .. } => ErrorCategory::FetchError,
            Self::Decode(_) => ErrorCategory::DecodeError,
            Self::Parse { .. } => ErrorCategory::ParseError,
            Self::Internal { .. } => ErrorCategory::InternalError,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a fetch error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            source: None,
        }
    }

    /// Create a fetch error with source
    pub fn fetch_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Fetch {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a parse error with source
    pub fn parse_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }
}

impl Clone for AttrsError {
    fn clone(&self) -> Self {
        match self {
            Self::Config { message, .. } => Self::Config {
                message: message.clone(),
                source: None,
            },
            Self::Fetch { message, .. } => Self::Fetch {
                message: message.clone(),
                source: None,
            },
            Self::Decode(err) => Self::Decode(err.clone()),
            Self::Parse { message, .. } => Self::Parse {
                message: message.clone(),
                source: None,
            },
            Self::Internal { message, .. } => Self::Internal {
                message: message.clone(),
                source: None,
            },
        }
    }
}

/// Result type for attribute engine operations
pub type Result<T> = std::result::Result<T, AttrsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_codes() {
        assert_eq!(AttrsError::fetch("timeout").category().as_str(), "FETCH_ERROR");
        assert_eq!(
            AttrsError::from(DecodeError::TimestampTooShort { digits: 3 })
                .category()
                .as_str(),
            "DECODE_ERROR"
        );
        assert!(ErrorCategory::FetchError.retryable());
        assert!(!ErrorCategory::ParseError.retryable());
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::other("connection reset");
        let err = AttrsError::fetch_with_source("GET failed", io);
        assert!(std::error::Error::source(&err).is_some());

        let cloned = err.clone();
        assert!(std::error::Error::source(&cloned).is_none());
        assert_eq!(cloned.to_string(), "fetch error: GET failed");
    }
}
