//! Gemini Provider Implementation
//!
//! Talks to the Google Generative Language API (`generateContent`).

use super::{build_client, check_status, request_error, with_deadline};
use crate::ai::{GenerationOptions, LlmProvider};
use async_trait::async_trait;
use codeguardian_shared::{HealthStatus, LlmError, ProviderId};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
}

/// Request payload for `generateContent`
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

/// Response from `generateContent`
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(api_key: SecretString, model: String, endpoint: Option<String>) -> Result<Self, LlmError> {
        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            client: build_client(ProviderId::Gemini)?,
            api_key,
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn build_request(prompt: &str, options: &GenerationOptions) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                top_p: options.top_p,
                max_output_tokens: options.max_tokens,
                stop_sequences: options.stop.clone(),
                response_mime_type: options.json_mode.then_some("application/json"),
            },
        }
    }

    fn extract_text(response: GeminiResponse) -> Result<String, LlmError> {
        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(LlmError::InvalidResponse {
                provider: ProviderId::Gemini,
                message: reason,
            });
        };

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: ProviderId::Gemini,
                message: format!(
                    "empty candidate (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn is_available(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<HealthStatus, LlmError> {
        let url = format!("{}/v1beta/models/{}", self.endpoint, self.model);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await;

        Ok(match response {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
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
        let url = format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model);
        let body = Self::build_request(prompt, options);

        let request = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&body);

        let response = with_deadline(request, options)
            .send()
            .await
            .map_err(|e| request_error(self.id(), e))?;
        let response = check_status(self.id(), response).await?;

        let parsed: GeminiResponse = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: self.id(),
            message: e.to_string(),
        })?;

        let text = Self::extract_text(parsed)?;
        debug!(response_len = text.len(), "Gemini response received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body() {
        let options = GenerationOptions {
            max_tokens: Some(1024),
            temperature: Some(0.3),
            ..GenerationOptions::default()
        };
        let body = serde_json::to_value(GeminiProvider::build_request("hi", &options)).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body["generationConfig"].get("topP").is_none());
    }

    #[test]
    fn test_json_mode_off() {
        let options = GenerationOptions {
            json_mode: false,
            ..GenerationOptions::default()
        };
        let body = serde_json::to_value(GeminiProvider::build_request("hi", &options)).unwrap();
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "{\"expl" }, { "text": "anation\": \"ok\"}" }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        assert_eq!(
            GeminiProvider::extract_text(response).unwrap(),
            "{\"explanation\": \"ok\"}"
        );
    }

    #[test]
    fn test_blocked_prompt() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();

        match GeminiProvider::extract_text(response) {
            Err(LlmError::InvalidResponse { message, .. }) => assert_eq!(message, "SAFETY"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_availability() {
        let provider =
            GeminiProvider::new(SecretString::from("key".to_string()), "gemini-1.5-flash".to_string(), None)
                .unwrap();
        assert!(provider.is_available());
        assert_eq!(provider.endpoint, DEFAULT_ENDPOINT);
    }
}
