// src/error.rs

//! Unified error handling for the automation pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Target discovery error
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Form detection error
    #[error("Detection error for {context}: {message}")]
    Detection { context: String, message: String },

    /// Content provider error
    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// Comment submission error
    #[error("Posting error for {context}: {message}")]
    Posting { context: String, message: String },

    /// Record store error
    #[error("Store error: {0}")]
    Store(String),

    /// Request quota exhausted for an identifier
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a detection error with context.
    pub fn detection(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Detection {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Create a posting error with context.
    pub fn posting(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Posting {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}
