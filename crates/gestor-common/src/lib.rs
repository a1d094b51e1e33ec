//! # Gestor Common
//!
//! Shared error type and logging configuration for the Gestor de Streaming
//! offline cache.
//!
//! ## Features
//!
//! - Unified error type with source chaining
//! - Logging configuration and setup

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for the offline cache workspace.
#[derive(Error, Debug)]
pub enum GestorError {
    /// Network-related errors.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cache storage errors.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Worker lifecycle and event dispatch errors.
    #[error("Worker error: {message}")]
    Worker {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse errors.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal error (unexpected).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GestorError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// Create a worker error.
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
            source: None,
        }
    }

    /// Create a worker error with source.
    pub fn worker_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Worker {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error category for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            GestorError::Network { .. } => "network",
            GestorError::Cache { .. } => "cache",
            GestorError::Worker { .. } => "worker",
            GestorError::Config { .. } => "config",
            GestorError::Io(_) => "io",
            GestorError::Json(_) => "json",
            GestorError::Url(_) => "url",
            GestorError::NotFound(_) => "not_found",
            GestorError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for offline cache operations.
pub type Result<T> = std::result::Result<T, GestorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(GestorError::network("offline").category(), "network");
        assert_eq!(GestorError::cache("put failed").category(), "cache");
        assert_eq!(GestorError::config("empty").category(), "config");
        assert_eq!(GestorError::NotFound("x".into()).category(), "not_found");
    }

    #[test]
    fn test_error_source_is_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = GestorError::config_with_source("cannot read config", io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "Config error: cannot read config");
    }

    #[test]
    fn test_url_error_converts() {
        let err: GestorError = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(err.category(), "url");
    }
}
