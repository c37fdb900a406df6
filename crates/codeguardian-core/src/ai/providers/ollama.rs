//! Ollama Provider Implementation
//!
//! Provides integration with Ollama for local LLM inference. No API key is
//! needed, so snippets never leave the machine.

use super::{build_client, check_status, request_error, with_deadline};
use crate::ai::{GenerationOptions, LlmProvider};
use async_trait::async_trait;
use codeguardian_shared::{HealthStatus, LlmError, ProviderId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Ollama provider for local LLM inference
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

/// Request payload for Ollama API
#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

/// Options specific to Ollama
#[derive(Serialize, Debug)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>, // max_tokens equivalent
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

/// Response from Ollama API
#[derive(Deserialize, Debug)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Information about available models
#[derive(Deserialize, Debug)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Information about a single model
#[derive(Deserialize, Debug)]
struct ModelInfo {
    name: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    pub fn new(endpoint: Option<String>, model: String) -> Result<Self, LlmError> {
        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            client: build_client(ProviderId::Ollama)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// Convert generation options to Ollama format
    fn convert_options(options: &GenerationOptions) -> Option<OllamaOptions> {
        let converted = OllamaOptions {
            temperature: options.temperature,
            top_p: options.top_p,
            num_predict: options.max_tokens,
            stop: options.stop.clone(),
        };

        let empty = converted.temperature.is_none()
            && converted.top_p.is_none()
            && converted.num_predict.is_none()
            && converted.stop.is_none();

        (!empty).then_some(converted)
    }

    fn build_request<'a>(&'a self, prompt: &'a str, options: &GenerationOptions) -> OllamaRequest<'a> {
        OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: options.json_mode.then_some("json"),
            options: Self::convert_options(options),
        }
    }

    /// Whether `model` is among the pulled models. Tags default to `latest`.
    fn has_model(models: &[ModelInfo], model: &str) -> bool {
        models.iter().any(|info| {
            info.name == model
                || (!model.contains(':') && info.name == format!("{}:latest", model))
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn is_available(&self) -> bool {
        !self.model.trim().is_empty()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<HealthStatus, LlmError> {
        let response = match self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Ollama is not reachable at {}: {}", self.endpoint, e);
                return Ok(HealthStatus::Unhealthy {
                    reason: format!("service not reachable: {}", e),
                });
            }
        };

        if !response.status().is_success() {
            return Ok(HealthStatus::Unhealthy {
                reason: format!("model listing returned {}", response.status()),
            });
        }

        let models: ModelsResponse = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: self.id(),
            message: format!("failed to parse models response: {}", e),
        })?;

        if Self::has_model(&models.models, &self.model) {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded {
                reason: format!("model {} is not pulled", self.model),
            })
        }
    }

    #[instrument(skip(self, prompt, options), fields(model = %self.model))]
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, LlmError> {
        let request = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&self.build_request(prompt, options));

        let response = with_deadline(request, options)
            .send()
            .await
            .map_err(|e| request_error(self.id(), e))?;
        let response = check_status(self.id(), response).await?;

        let parsed: OllamaResponse = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: self.id(),
            message: e.to_string(),
        })?;

        if !parsed.done {
            warn!("Ollama reported an unfinished generation");
        }
        debug!(
            response_len = parsed.response.len(),
            eval_count = ?parsed.eval_count,
            "Ollama response received"
        );

        if parsed.response.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.id(),
                message: "empty response".to_string(),
            });
        }

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OllamaProvider {
        OllamaProvider::new(None, "codellama:7b".to_string()).unwrap()
    }

    #[test]
    fn test_request_body() {
        let provider = provider();
        let options = GenerationOptions {
            max_tokens: Some(512),
            ..GenerationOptions::default()
        };
        let body = serde_json::to_value(provider.build_request("explain", &options)).unwrap();

        assert_eq!(body["model"], "codellama:7b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"], "json");
        assert_eq!(body["options"]["num_predict"], 512);
    }

    #[test]
    fn test_empty_options_are_omitted() {
        let options = GenerationOptions {
            max_tokens: None,
            temperature: None,
            json_mode: false,
            ..GenerationOptions::default()
        };
        let provider = provider();
        let body = serde_json::to_value(provider.build_request("explain", &options)).unwrap();

        assert!(body.get("options").is_none());
        assert!(body.get("format").is_none());
    }

    #[test]
    fn test_has_model() {
        let models = vec![
            ModelInfo {
                name: "codellama:7b".to_string(),
            },
            ModelInfo {
                name: "llama3:latest".to_string(),
            },
        ];

        assert!(OllamaProvider::has_model(&models, "codellama:7b"));
        assert!(OllamaProvider::has_model(&models, "llama3"));
        assert!(!OllamaProvider::has_model(&models, "codellama:13b"));
    }

    #[test]
    fn test_provider_metadata() {
        let provider = provider();
        assert_eq!(provider.id(), ProviderId::Ollama);
        assert_eq!(provider.endpoint, DEFAULT_ENDPOINT);
        assert!(provider.is_available());
    }
}
