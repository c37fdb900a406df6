//! Provider-free analysis: input validation, scoring and the commit gate

use super::HeuristicScorer;
use codeguardian_shared::{AnalysisConfig, CodeSnippet, GateVerdict, Result, ScoreReport};
use tracing::{info, warn};

/// Everything CodeGuardian can answer without an AI provider
#[derive(Debug, Clone)]
pub struct LocalAnalyzer {
    scorer: HeuristicScorer,
    min_code_length: usize,
    commit_threshold: u8,
}

impl LocalAnalyzer {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            scorer: HeuristicScorer::new(config.scoring.clone()),
            min_code_length: config.min_code_length,
            commit_threshold: config.commit_threshold,
        }
    }

    pub fn scorer(&self) -> &HeuristicScorer {
        &self.scorer
    }

    /// Reject snippets below the minimum length
    pub fn validate(&self, code: &str) -> Result<CodeSnippet> {
        Ok(CodeSnippet::new(code, self.min_code_length)?)
    }

    /// Validate and score locally
    pub fn score_code(&self, code: &str) -> Result<ScoreReport> {
        let snippet = self.validate(code)?;
        Ok(self.scorer.score(snippet.as_str()))
    }

    /// Pass/fail verdict of the local score against `threshold` (configured default otherwise)
    pub fn commit_gate(&self, code: &str, threshold: Option<u8>) -> Result<GateVerdict> {
        let report = self.score_code(code)?;
        let threshold = threshold.unwrap_or(self.commit_threshold);
        let verdict = GateVerdict::evaluate(report.score, threshold);

        if verdict.passed {
            info!(score = verdict.score, threshold, "Commit gate passed");
        } else {
            warn!(score = verdict.score, threshold, "Commit gate failed");
        }
        Ok(verdict)
    }
}

impl Default for LocalAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeguardian_shared::{GuardianError, ValidationError};

    const NESTED: &str = "for (const a of xs) {\n  for (const b of ys) {\n    total += a * b;\n  }\n}";

    #[test]
    fn test_short_input_rejected() {
        let error = LocalAnalyzer::default().score_code("x = 1").unwrap_err();
        assert!(matches!(
            error,
            GuardianError::Validation(ValidationError::TooShort { .. })
        ));
    }

    #[test]
    fn test_score_matches_scorer() {
        let analyzer = LocalAnalyzer::default();
        let report = analyzer.score_code(NESTED).unwrap();
        assert_eq!(report, analyzer.scorer().score(NESTED));
        assert_eq!(report.score, 75);
    }

    #[test]
    fn test_commit_gate_uses_configured_threshold() {
        let config = AnalysisConfig {
            commit_threshold: 80,
            ..AnalysisConfig::default()
        };
        let analyzer = LocalAnalyzer::from_config(&config);

        let verdict = analyzer.commit_gate(NESTED, None).unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.threshold, 80);

        assert!(analyzer.commit_gate(NESTED, Some(75)).unwrap().passed);
    }

    #[test]
    fn test_min_length_from_config() {
        let config = AnalysisConfig {
            min_code_length: 3,
            ..AnalysisConfig::default()
        };
        assert!(LocalAnalyzer::from_config(&config).score_code("x=1").is_ok());
    }
}
