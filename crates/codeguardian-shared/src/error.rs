//! Error types for CodeGuardian

use crate::types::{ProviderId, SchemaTag};
use thiserror::Error;

/// Main error type for CodeGuardian operations
#[derive(Debug, Error)]
pub enum GuardianError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("AI service unavailable: {0}")]
    Transport(#[from] LlmError),

    #[error("AI returned unusable output: {0}")]
    Decode(#[from] DecodeError),

    #[error("History store error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Prompt rendering failed: {message}")]
    Prompt { message: String },
}

impl GuardianError {
    /// True when the AI collaborator could not be reached or refused the request
    pub fn is_transport(&self) -> bool {
        matches!(self, GuardianError::Transport(_))
    }

    /// True when the AI collaborator answered with text that did not decode
    pub fn is_decode(&self) -> bool {
        matches!(self, GuardianError::Decode(_))
    }
}

/// Result type alias for CodeGuardian operations
pub type Result<T> = std::result::Result<T, GuardianError>;

/// Input validation errors, raised before any AI call is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Code must be at least {min} characters long (got {actual}).")]
    TooShort { min: usize, actual: usize },
}

/// Transport-level failures talking to an AI provider
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key missing for provider: {provider}")]
    ApiKeyMissing { provider: ProviderId },

    #[error("Authentication failed for provider: {provider}")]
    Authentication { provider: ProviderId },

    #[error("Rate limit or quota exceeded for provider: {provider}")]
    RateLimit { provider: ProviderId },

    #[error("Request to {provider} timed out")]
    Timeout { provider: ProviderId },

    #[error("Network error talking to {provider}: {message}")]
    Network { provider: ProviderId, message: String },

    #[error("Server error from {provider}: {status_code} - {message}")]
    ServerError {
        provider: ProviderId,
        status_code: u16,
        message: String,
    },

    #[error("Unexpected response envelope from {provider}: {message}")]
    InvalidResponse { provider: ProviderId, message: String },
}

impl LlmError {
    /// Provider the failure originated from
    pub fn provider(&self) -> ProviderId {
        match self {
            LlmError::ApiKeyMissing { provider }
            | LlmError::Authentication { provider }
            | LlmError::RateLimit { provider }
            | LlmError::Timeout { provider }
            | LlmError::Network { provider, .. }
            | LlmError::ServerError { provider, .. }
            | LlmError::InvalidResponse { provider, .. } => *provider,
        }
    }
}

/// Why an AI response could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeFailureKind {
    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("response is not valid JSON: {0}")]
    Malformed(String),

    #[error("response does not match the expected shape: {0}")]
    SchemaMismatch(String),
}

/// Recoverable failure turning raw AI text into a typed shape.
///
/// The raw text is kept for diagnostics but is never part of the `Display`
/// output, so it does not leak into user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not decode {shape} response: {kind}")]
pub struct DecodeError {
    pub shape: SchemaTag,
    pub kind: DecodeFailureKind,
    pub raw: String,
}

impl DecodeError {
    pub fn new(shape: SchemaTag, kind: DecodeFailureKind, raw: impl Into<String>) -> Self {
        Self {
            shape,
            kind,
            raw: raw.into(),
        }
    }

    /// Human readable reason, without the raw text
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }
}

/// History store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {message}")]
    Backend { message: String },

    #[error("Stored record is corrupt: {message}")]
    Corrupt { message: String },

    #[error("Storage backend not compiled in: {backend}")]
    Unsupported { backend: String },
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {message}")]
    InvalidFormat { message: String },

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        ConfigError::InvalidFormat {
            message: error.to_string(),
        }
    }
}
