//! OpenAI Provider Implementation
//!
//! Uses the Chat Completions API. Any OpenAI-compatible endpoint works by
//! setting `ai.providers.openai.endpoint`.

use super::{build_client, check_status, request_error, with_deadline};
use crate::ai::{GenerationOptions, LlmProvider};
use async_trait::async_trait;
use codeguardian_shared::{HealthStatus, LlmError, ProviderId};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com";

/// OpenAI provider
pub struct OpenAIProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl OpenAIProvider {
    pub fn new(api_key: SecretString, model: String, endpoint: Option<String>) -> Result<Self, LlmError> {
        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            client: build_client(ProviderId::OpenAI)?,
            api_key,
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str, options: &'a GenerationOptions) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            stop: options.stop.as_deref(),
            response_format: options.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        }
    }

    fn extract_text(response: ChatResponse) -> Result<String, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: ProviderId::OpenAI,
                message: "no choices returned".to_string(),
            })?;

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(LlmError::InvalidResponse {
                provider: ProviderId::OpenAI,
                message: choice.message.refusal.unwrap_or_else(|| {
                    format!(
                        "empty message (finish reason: {})",
                        choice.finish_reason.as_deref().unwrap_or("unknown")
                    )
                }),
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAI
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn is_available(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<HealthStatus, LlmError> {
        let url = format!("{}/v1/models/{}", self.endpoint, self.model);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await;

        Ok(match response {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => HealthStatus::Degraded {
                reason: format!("model {} not found", self.model),
            },
            Ok(response) => HealthStatus::Unhealthy {
                reason: format!("model lookup returned {}", response.status()),
            },
            Err(e) => HealthStatus::Unhealthy {
                reason: e.to_string(),
            },
        })
    }

    #[instrument(skip(self, prompt, options), fields(model = %self.model))]
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);

        let request = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.build_request(prompt, options));

        let response = with_deadline(request, options)
            .send()
            .await
            .map_err(|e| request_error(self.id(), e))?;
        let response = check_status(self.id(), response).await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: self.id(),
            message: e.to_string(),
        })?;

        let text = Self::extract_text(parsed)?;
        debug!(response_len = text.len(), "OpenAI response received");
        Ok(text)
    }
}
