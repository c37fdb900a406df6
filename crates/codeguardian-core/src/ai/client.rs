//! Typed AI client
//!
//! Runs one [`AiTask`] end to end: render the prompt, ask the provider for
//! raw text, decode it into the task's shape. Every task takes this same
//! path regardless of provider JSON modes.

use super::decoder::{
    DecodedResponse, Documentation, Explanation, PerfectCode, QualityAssessment, Refactoring,
    ResponseShape, SecurityAudit, decode, decode_as,
};
use super::{AiTask, GenerationOptions, LlmProvider};
use crate::template::PromptEngine;
use codeguardian_shared::{DecodeError, GuardianError, Result};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Handle to the AI collaborator, injected into the engine
pub struct AiClient {
    provider: Arc<dyn LlmProvider>,
    prompts: PromptEngine,
    options: GenerationOptions,
}

impl AiClient {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Result<Self> {
        Ok(Self {
            provider,
            prompts: PromptEngine::new()?,
            options,
        })
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Render the prompt for `task` and return the model's raw text
    #[instrument(skip(self, task, code, analysis), fields(task = %task))]
    pub async fn request_raw(&self, task: AiTask, code: &str, analysis: Option<&str>) -> Result<String> {
        let prompt = self.prompts.render(task, code, analysis)?;
        let raw = self.provider.generate(&prompt, &self.options).await?;
        debug!(raw_len = raw.len(), "AI task answered");
        Ok(raw)
    }

    /// Run `task` and decode its answer into `T`
    pub async fn run<T: ResponseShape>(&self, task: AiTask, code: &str, analysis: Option<&str>) -> Result<T> {
        if task.schema() != T::TAG {
            return Err(GuardianError::Prompt {
                message: format!("task {} answers {}, not {}", task, task.schema(), T::TAG),
            });
        }

        let raw = self.request_raw(task, code, analysis).await?;
        decode::<T>(&raw).map_err(|e| log_decode_failure(task, e))
    }

    /// Run `task` and decode against its runtime schema tag
    pub async fn run_tagged(&self, task: AiTask, code: &str, analysis: Option<&str>) -> Result<DecodedResponse> {
        let raw = self.request_raw(task, code, analysis).await?;
        decode_as(&raw, task.schema()).map_err(|e| log_decode_failure(task, e))
    }

    pub async fn explain(&self, code: &str, analysis: &str) -> Result<Explanation> {
        self.run(AiTask::Explanation, code, Some(analysis)).await
    }

    pub async fn security_audit(&self, code: &str) -> Result<SecurityAudit> {
        self.run(AiTask::SecurityAudit, code, None).await
    }

    pub async fn assess_quality(&self, code: &str) -> Result<QualityAssessment> {
        self.run(AiTask::QualityReview, code, None).await
    }

    pub async fn refactor(&self, code: &str, analysis: &str) -> Result<Refactoring> {
        self.run(AiTask::Refactor, code, Some(analysis)).await
    }

    pub async fn perfect_code(&self, code: &str) -> Result<PerfectCode> {
        self.run(AiTask::PerfectCode, code, None).await
    }

    pub async fn document(&self, code: &str) -> Result<Documentation> {
        self.run(AiTask::Documentation, code, None).await
    }
}

/// Raw model text goes to the log, never into the error message
fn log_decode_failure(task: AiTask, error: DecodeError) -> GuardianError {
    warn!(
        task = %task,
        reason = %error.reason(),
        raw = %error.raw,
        "AI response could not be decoded"
    );
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockLlmProvider;
    use codeguardian_shared::{DecodeFailureKind, LlmError, ProviderId, SchemaTag};

    fn client(mock: MockLlmProvider) -> AiClient {
        AiClient::new(Arc::new(mock), GenerationOptions::default()).unwrap()
    }

    fn mock_answering(answer: &'static str) -> MockLlmProvider {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate()
            .returning(move |_, _| Ok(answer.to_string()));
        mock
    }

    #[tokio::test]
    async fn test_explain_decodes_fenced_answer() {
        let client = client(mock_answering(
            "Here you go:\n```json\n{\"explanation\":\"Use a Set.\"}\n```\nHope that helps!",
        ));

        let explanation = client.explain("let x = [1, 2, 3];", "{}").await.unwrap();
        assert_eq!(explanation.explanation, "Use a Set.");
    }

    #[tokio::test]
    async fn test_prompt_carries_code_and_analysis() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate()
            .withf(|prompt, options| {
                prompt.contains("fn unique_marker()")
                    && prompt.contains("ANALYSIS_MARKER")
                    && options.json_mode
            })
            .times(1)
            .returning(|_, _| Ok(r#"{"refactoredCode": "fn a() {}", "explanation": "ok"}"#.to_string()));

        let refactoring = client(mock)
            .refactor("fn unique_marker() {}", "ANALYSIS_MARKER")
            .await
            .unwrap();
        assert_eq!(refactoring.refactored_code, "fn a() {}");
    }

    #[tokio::test]
    async fn test_decode_failure_is_distinct_from_transport() {
        let client = client(mock_answering("Sorry, I can't do that."));
        let error = client.security_audit("eval(userInput);").await.unwrap_err();

        assert!(error.is_decode());
        match error {
            GuardianError::Decode(decode) => {
                assert_eq!(decode.shape, SchemaTag::SecurityAudit);
                assert_eq!(decode.kind, DecodeFailureKind::NoJsonObject);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate().returning(|_, _| {
            Err(LlmError::RateLimit {
                provider: ProviderId::Gemini,
            })
        });

        let error = client(mock).perfect_code("let a = 1;").await.unwrap_err();
        assert!(error.is_transport());
    }

    #[tokio::test]
    async fn test_run_tagged() {
        let client = client(mock_answering(r#"{"score": 91.4, "issues": []}"#));
        let decoded = client
            .run_tagged(AiTask::QualityReview, "let a = 1;", None)
            .await
            .unwrap();

        assert_eq!(
            decoded,
            DecodedResponse::QualityAssessment(QualityAssessment {
                score: 91,
                issues: vec![]
            })
        );
    }

    #[tokio::test]
    async fn test_mismatched_task_and_shape() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate().never();

        let result: Result<Explanation> = client(mock).run(AiTask::Documentation, "code here", None).await;
        assert!(matches!(result, Err(GuardianError::Prompt { .. })));
    }
}
