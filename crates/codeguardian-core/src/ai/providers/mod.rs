//! LLM Provider Implementations
//!
//! This module contains the providers CodeGuardian can talk to. Each provider
//! implements the LlmProvider trait and returns the model's raw text; decoding
//! happens one layer up.

pub mod gemini;
pub mod ollama;
pub mod openai;

// Re-export provider implementations
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

use crate::ai::{GenerationOptions, LlmProvider};
use codeguardian_shared::{AiConfig, ApiKeys, LlmError, ProviderConfig, ProviderId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::info;

/// Type alias for boxed provider
pub type BoxedProvider = Box<dyn LlmProvider + Send + Sync>;

/// Longest provider error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Provider factory for creating providers from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the provider selected in the configuration
    pub fn create_provider(config: &AiConfig, api_keys: &ApiKeys) -> Result<BoxedProvider, LlmError> {
        Self::create_provider_by_id(config.provider, config.providers.get(config.provider), api_keys)
    }

    /// Create a specific provider
    pub fn create_provider_by_id(
        id: ProviderId,
        config: &ProviderConfig,
        api_keys: &ApiKeys,
    ) -> Result<BoxedProvider, LlmError> {
        info!("Creating {} provider with model {}", id, config.model);

        match id {
            ProviderId::Ollama => {
                let provider = OllamaProvider::new(config.endpoint.clone(), config.model.clone())?;
                Ok(Box::new(provider))
            }
            ProviderId::OpenAI => {
                let api_key = api_keys
                    .secret(ProviderId::OpenAI)
                    .ok_or(LlmError::ApiKeyMissing { provider: id })?;

                let provider =
                    OpenAIProvider::new(api_key, config.model.clone(), config.endpoint.clone())?;
                Ok(Box::new(provider))
            }
            ProviderId::Gemini => {
                let api_key = api_keys
                    .secret(ProviderId::Gemini)
                    .ok_or(LlmError::ApiKeyMissing { provider: id })?;

                let provider =
                    GeminiProvider::new(api_key, config.model.clone(), config.endpoint.clone())?;
                Ok(Box::new(provider))
            }
        }
    }
}

/// HTTP client shared by a provider instance
pub(crate) fn build_client(provider: ProviderId) -> Result<Client, LlmError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("codeguardian/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LlmError::Network {
            provider,
            message: format!("failed to create HTTP client: {}", e),
        })
}

/// Attach the per-request deadline, if any
pub(crate) fn with_deadline(request: RequestBuilder, options: &GenerationOptions) -> RequestBuilder {
    match options.timeout {
        Some(timeout) => request.timeout(timeout),
        None => request,
    }
}

/// Map a reqwest failure to a transport error
pub(crate) fn request_error(provider: ProviderId, error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout { provider }
    } else {
        LlmError::Network {
            provider,
            message: error.to_string(),
        }
    }
}

/// Map a non-success HTTP status to a transport error
pub(crate) fn status_error(provider: ProviderId, status: StatusCode, body: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Authentication { provider },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimit { provider },
        _ => LlmError::ServerError {
            provider,
            status_code: status.as_u16(),
            message: truncate(body.trim(), MAX_ERROR_BODY),
        },
    }
}

/// Pass successful responses through, turn the rest into errors
pub(crate) async fn check_status(provider: ProviderId, response: Response) -> Result<Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(provider, status, &body))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
