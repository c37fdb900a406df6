//! AI Collaborator and Response Handling
//!
//! This module provides everything between CodeGuardian and a generative model:
//! - Abstract LLM provider interface
//! - Provider implementations (Gemini, OpenAI, Ollama)
//! - The declarative task table and its prompts
//! - The schema-parametric response decoder
//! - A typed client that runs a task end to end

pub mod client;
pub mod decoder;
pub mod providers;
pub mod tasks;

// Re-export main types
pub use client::AiClient;
pub use decoder::{
    DecodedResponse, Documentation, Explanation, PerfectCode, QualityAssessment, Refactoring,
    ResponseShape, SecurityAudit, decode, decode_as,
};
pub use providers::{GeminiProvider, OllamaProvider, OpenAIProvider, ProviderFactory};
pub use tasks::AiTask;

use async_trait::async_trait;
use codeguardian_shared::{AiConfig, HealthStatus, LlmError, ProviderId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Abstract trait for all LLM providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider identifier
    fn id(&self) -> ProviderId;

    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Check if the provider has what it needs to make requests
    fn is_available(&self) -> bool;

    /// Perform a health check
    async fn health_check(&self) -> Result<HealthStatus, LlmError>;

    /// Generate a complete response and return the model's raw text
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, LlmError>;
}

/// Options for text generation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<usize>,

    /// Temperature for randomness (0.0 - 2.0)
    pub temperature: Option<f32>,

    /// Top-p sampling parameter
    pub top_p: Option<f32>,

    /// Stop sequences
    pub stop: Option<Vec<String>>,

    /// Ask the provider for JSON-only output. A hint, the decoder still runs.
    pub json_mode: bool,

    /// Per-request deadline handed to the HTTP client
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.2),
            top_p: None,
            stop: None,
            json_mode: true,
            timeout: None,
        }
    }
}

impl GenerationOptions {
    /// Options for the configured provider
    pub fn from_config(config: &AiConfig) -> Self {
        let provider = config.providers.get(config.provider);

        Self {
            max_tokens: provider.max_tokens,
            temperature: provider.temperature,
            json_mode: config.json_mode,
            timeout: (config.request_timeout_seconds > 0)
                .then(|| Duration::from_secs(config.request_timeout_seconds)),
            ..Self::default()
        }
    }
}
