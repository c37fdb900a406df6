//! Analysis engine that orchestrates scoring, AI review and history

use crate::ai::{
    AiClient, AiTask, Documentation, GenerationOptions, LlmProvider, PerfectCode, ProviderFactory,
    QualityAssessment, Refactoring,
};
use crate::analysis::summary::with_syntax_notice;
use crate::analysis::{LocalAnalyzer, analysis_summary, findings_summary};
use crate::storage::{HistoryStore, open_store};
use codeguardian_shared::{
    AnalysisRecord, AnalysisResult, ApiKeys, CodeSnippet, GateVerdict, GuardianConfig,
    GuardianError, HealthStatus, Result, ScoreReport, SecurityVulnerability,
};
use futures::future::OptionFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Explanation used when the scorer flagged nothing
pub const CLEAN_CODE_EXPLANATION: &str = "Excellent work! The code appears to be clean and secure.";

/// Explanation used when the AI explanation could not be produced
pub const EXPLANATION_PLACEHOLDER: &str =
    "Could not generate an AI explanation. Please review the issues manually.";

/// Sub-step of a full analysis that can fail without aborting it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Explanation,
    SecurityAudit,
    QualityReview,
    Refactoring,
    PerfectCode,
    Persistence,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisStage::Explanation => "explanation",
            AnalysisStage::SecurityAudit => "security audit",
            AnalysisStage::QualityReview => "quality review",
            AnalysisStage::Refactoring => "refactoring",
            AnalysisStage::PerfectCode => "perfect code",
            AnalysisStage::Persistence => "persistence",
        };
        write!(f, "{}", name)
    }
}

/// A reported, non-fatal failure of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: AnalysisStage,
    pub message: String,
}

/// Everything a full analysis produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,

    /// Id of the stored record, `None` when persistence failed
    pub analysis_id: Option<Uuid>,

    pub failures: Vec<StageFailure>,
}

impl AnalysisOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Main engine that coordinates scoring, the AI collaborator and the history store
///
/// The engine owns no global state: the provider and the store are injected,
/// so one process can run several engines against different backends.
pub struct GuardianEngine {
    config: GuardianConfig,
    local: LocalAnalyzer,
    ai: AiClient,
    store: Arc<dyn HistoryStore>,
}

impl GuardianEngine {
    /// Create an engine around the given collaborators
    pub fn new(
        config: GuardianConfig,
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn HistoryStore>,
    ) -> Result<Self> {
        config.validate()?;

        let ai = AiClient::new(provider, GenerationOptions::from_config(&config.ai))?;
        let local = LocalAnalyzer::from_config(&config.analysis);

        Ok(Self {
            config,
            local,
            ai,
            store,
        })
    }

    /// Create an engine with the configured provider and store
    #[instrument(skip(config, api_keys))]
    pub async fn from_config(config: GuardianConfig, api_keys: &ApiKeys) -> Result<Self> {
        info!("Initializing CodeGuardian engine with {} provider", config.ai.provider);

        let provider: Arc<dyn LlmProvider + Send + Sync> =
            Arc::from(ProviderFactory::create_provider(&config.ai, api_keys)?);
        let store = open_store(&config.storage).await?;

        Self::new(config, provider, store)
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    pub fn local(&self) -> &LocalAnalyzer {
        &self.local
    }

    pub fn ai(&self) -> &AiClient {
        &self.ai
    }

    fn validate(&self, code: &str) -> Result<CodeSnippet> {
        self.local.validate(code)
    }

    /// Validate and score locally, no AI involved
    pub fn score_code(&self, code: &str) -> Result<ScoreReport> {
        self.local.score_code(code)
    }

    /// Raw explanation text for `code` given its analysis summary
    pub async fn request_explanation(&self, code: &str, summary: &str) -> Result<String> {
        let snippet = self.validate(code)?;
        self.ai
            .request_raw(AiTask::Explanation, snippet.as_str(), Some(summary))
            .await
    }

    /// Full pipeline: score, ask the AI, assemble and persist.
    ///
    /// The audit and the optional stages run concurrently. The explanation
    /// runs after them so it covers the AI's findings as well as the local ones.
    #[instrument(skip(self, code), fields(code_len = code.len()))]
    pub async fn analyze(&self, user_id: &str, code: &str) -> Result<AnalysisOutcome> {
        let snippet = self.validate(code)?;
        let code = snippet.as_str();
        let settings = &self.config.analysis;

        let report = self.local.scorer().score(code);
        let summary = analysis_summary(&report);
        debug!(score = report.score, issues = report.issues.len(), "Local score computed");

        let quality_call =
            OptionFuture::from(settings.request_ai_score.then(|| self.ai.assess_quality(code)));
        let refactor_call =
            OptionFuture::from(settings.include_refactoring.then(|| self.ai.refactor(code, &summary)));
        let perfect_call =
            OptionFuture::from(settings.include_perfect_code.then(|| self.ai.perfect_code(code)));

        let (audit, quality, refactoring, perfect) = tokio::join!(
            self.ai.security_audit(code),
            quality_call,
            refactor_call,
            perfect_call,
        );

        let mut failures = Vec::new();

        let ai_findings = match audit {
            Ok(audit) => audit.vulnerabilities,
            Err(e) => {
                note_failure(&mut failures, AnalysisStage::SecurityAudit, &e);
                Vec::new()
            }
        };
        let findings = merge_findings(&report.security_findings, ai_findings);

        let ai_score = quality.and_then(|outcome| {
            outcome
                .map(|assessment| assessment.score)
                .map_err(|e| note_failure(&mut failures, AnalysisStage::QualityReview, &e))
                .ok()
        });

        let (refactored_code, refactoring_explanation) = refactoring
            .and_then(|outcome| {
                outcome
                    .map(|r| (r.refactored_code, r.explanation))
                    .map_err(|e| note_failure(&mut failures, AnalysisStage::Refactoring, &e))
                    .ok()
            })
            .unzip();

        let (perfect_code, perfect_code_explanation) = perfect
            .and_then(|outcome| {
                outcome
                    .map(|p| (p.perfect_code, p.explanation))
                    .map_err(|e| note_failure(&mut failures, AnalysisStage::PerfectCode, &e))
                    .ok()
            })
            .unzip();

        let explanation = if report.issues.is_empty() && findings.is_empty() {
            CLEAN_CODE_EXPLANATION.to_string()
        } else {
            let summary = findings_summary(&report, &findings);
            match self.ai.explain(code, &summary).await {
                Ok(explanation) => explanation.explanation,
                Err(e) => {
                    note_failure(&mut failures, AnalysisStage::Explanation, &e);
                    EXPLANATION_PLACEHOLDER.to_string()
                }
            }
        };

        let result = AnalysisResult {
            score: report.score,
            explanation: with_syntax_notice(explanation, report.syntax_error),
            security_vulnerabilities: findings,
            issues: report.issues,
            syntax_error: report.syntax_error,
            ai_score,
            refactored_code,
            refactoring_explanation,
            perfect_code,
            perfect_code_explanation,
        };

        let record = AnalysisRecord::new(user_id, code, result.clone());
        let analysis_id = record.analysis_id;
        let analysis_id = match self.store.append(record).await {
            Ok(()) => Some(analysis_id),
            Err(e) => {
                note_failure(&mut failures, AnalysisStage::Persistence, &GuardianError::from(e));
                None
            }
        };

        info!(
            score = result.score,
            failed_stages = failures.len(),
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            result,
            analysis_id,
            failures,
        })
    }

    /// Refactor `code`, using its local analysis when none is given
    pub async fn refactor(&self, code: &str, analysis: Option<&str>) -> Result<Refactoring> {
        let snippet = self.validate(code)?;
        let summary = match analysis {
            Some(analysis) => analysis.to_string(),
            None => analysis_summary(&self.local.scorer().score(snippet.as_str())),
        };
        self.ai.refactor(snippet.as_str(), &summary).await
    }

    pub async fn generate_perfect_code(&self, code: &str) -> Result<PerfectCode> {
        let snippet = self.validate(code)?;
        self.ai.perfect_code(snippet.as_str()).await
    }

    pub async fn generate_documentation(&self, code: &str) -> Result<Documentation> {
        let snippet = self.validate(code)?;
        self.ai.document(snippet.as_str()).await
    }

    /// Local findings followed by the AI audit's
    pub async fn security_audit(&self, code: &str) -> Result<Vec<SecurityVulnerability>> {
        let snippet = self.validate(code)?;
        let report = self.local.scorer().score(snippet.as_str());
        let audit = self.ai.security_audit(snippet.as_str()).await?;
        Ok(merge_findings(&report.security_findings, audit.vulnerabilities))
    }

    /// The AI's own quality verdict, independent of the heuristic score
    pub async fn assess_quality(&self, code: &str) -> Result<QualityAssessment> {
        let snippet = self.validate(code)?;
        self.ai.assess_quality(snippet.as_str()).await
    }

    /// Past analyses of a user, newest first
    pub async fn history(&self, user_id: &str) -> Result<Vec<AnalysisRecord>> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    /// One past analysis, only if it belongs to `user_id`
    pub async fn report(&self, user_id: &str, analysis_id: Uuid) -> Result<Option<AnalysisRecord>> {
        Ok(self.store.get(user_id, analysis_id).await?)
    }

    /// Pass/fail verdict of the local score against `threshold` (configured default otherwise)
    pub fn commit_gate(&self, code: &str, threshold: Option<u8>) -> Result<GateVerdict> {
        self.local.commit_gate(code, threshold)
    }

    /// Health of the AI provider. Unreachable is reported, not raised.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthStatus {
        let provider = self.ai.provider();
        if !provider.is_available() {
            return HealthStatus::Unhealthy {
                reason: format!("{} is not configured", provider.name()),
            };
        }

        match provider.health_check().await {
            Ok(status) => status,
            Err(e) => HealthStatus::Unhealthy {
                reason: e.to_string(),
            },
        }
    }
}

fn note_failure(failures: &mut Vec<StageFailure>, stage: AnalysisStage, error: &GuardianError) {
    warn!(stage = %stage, "Analysis stage failed: {}", error);
    failures.push(StageFailure {
        stage,
        message: error.to_string(),
    });
}

/// Scorer findings first, then AI findings whose CWE the scorer did not already report
fn merge_findings(
    local: &[SecurityVulnerability],
    ai: Vec<SecurityVulnerability>,
) -> Vec<SecurityVulnerability> {
    let mut merged = local.to_vec();

    for finding in ai {
        let duplicate = !finding.cwe.trim().is_empty()
            && local
                .iter()
                .any(|known| known.cwe.trim().eq_ignore_ascii_case(finding.cwe.trim()));
        if !duplicate {
            merged.push(finding);
        }
    }

    merged
}
