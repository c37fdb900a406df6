//! Core types used throughout CodeGuardian

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Minimum snippet length accepted for analysis
pub const MIN_CODE_LENGTH: usize = 10;

/// Highest (and initial) technical debt score
pub const MAX_SCORE: u8 = 100;

/// LLM provider identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    OpenAI,
    Ollama,
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::Gemini => write!(f, "gemini"),
            ProviderId::OpenAI => write!(f, "openai"),
            ProviderId::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" | "googleai" => Ok(ProviderId::Gemini),
            "openai" => Ok(ProviderId::OpenAI),
            "ollama" => Ok(ProviderId::Ollama),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Health status of a provider
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
    Unhealthy { reason: String },
}

impl HealthStatus {
    pub fn is_available(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy { .. })
    }
}

/// Severity of a quality issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::Low => write!(f, "Low"),
        }
    }
}

/// Severity of a security finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SecuritySeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for SecuritySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecuritySeverity::Critical => write!(f, "Critical"),
            SecuritySeverity::High => write!(f, "High"),
            SecuritySeverity::Medium => write!(f, "Medium"),
            SecuritySeverity::Low => write!(f, "Low"),
        }
    }
}

/// Code quality finding
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Issue {
    pub title: String,
    pub detail: String,
    pub severity: Severity,
}

impl Issue {
    pub fn new(title: impl Into<String>, detail: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
            severity,
        }
    }
}

/// Security finding tagged with a CWE identifier
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecurityVulnerability {
    pub title: String,
    pub detail: String,
    pub severity: SecuritySeverity,
    pub cwe: String,
}

/// Output of the heuristic scorer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScoreReport {
    /// Technical debt score, 100 means nothing was flagged
    pub score: u8,

    /// Quality issues in detection order, syntax errors first
    pub issues: Vec<Issue>,

    /// Security findings detected locally
    pub security_findings: Vec<SecurityVulnerability>,

    /// Set when the code cannot execute as written
    pub syntax_error: bool,
}

impl ScoreReport {
    /// Report for code with no findings
    pub fn clean() -> Self {
        Self {
            score: MAX_SCORE,
            issues: Vec::new(),
            security_findings: Vec::new(),
            syntax_error: false,
        }
    }

    /// Whether anything at all was flagged
    pub fn has_findings(&self) -> bool {
        !self.issues.is_empty() || !self.security_findings.is_empty()
    }

    pub fn grade(&self) -> ScoreGrade {
        ScoreGrade::from_score(self.score)
    }
}

/// Coarse band of a technical debt score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ScoreGrade {
    Healthy,
    Warning,
    Critical,
}

impl ScoreGrade {
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 80 => ScoreGrade::Healthy,
            s if s >= 50 => ScoreGrade::Warning,
            _ => ScoreGrade::Critical,
        }
    }
}

/// Verdict of the pre-commit quality gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct GateVerdict {
    pub score: u8,
    pub threshold: u8,
    pub passed: bool,
}

impl GateVerdict {
    pub fn evaluate(score: u8, threshold: u8) -> Self {
        Self {
            score,
            threshold,
            passed: score >= threshold,
        }
    }
}

/// A validated source snippet submitted for analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeSnippet(String);

impl CodeSnippet {
    /// Validate `code` against the minimum length (in characters)
    pub fn new(code: impl Into<String>, min_length: usize) -> Result<Self, ValidationError> {
        let code = code.into();
        let actual = code.chars().count();
        if actual < min_length {
            return Err(ValidationError::TooShort {
                min: min_length,
                actual,
            });
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CodeSnippet {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Expected shape of an AI response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaTag {
    QualityAssessment,
    Explanation,
    Refactoring,
    SecurityAudit,
    Documentation,
    PerfectCode,
}

impl SchemaTag {
    pub const ALL: [SchemaTag; 6] = [
        SchemaTag::QualityAssessment,
        SchemaTag::Explanation,
        SchemaTag::Refactoring,
        SchemaTag::SecurityAudit,
        SchemaTag::Documentation,
        SchemaTag::PerfectCode,
    ];

    /// Top-level keys the model must return
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            SchemaTag::QualityAssessment => &["score", "issues"],
            SchemaTag::Explanation => &["explanation"],
            SchemaTag::Refactoring => &["refactoredCode", "explanation"],
            SchemaTag::SecurityAudit => &["vulnerabilities"],
            SchemaTag::Documentation => &["documentedCode", "explanation"],
            SchemaTag::PerfectCode => &["perfectCode", "explanation"],
        }
    }

    /// JSON skeleton embedded in prompts so the model knows what to return
    pub fn json_template(&self) -> &'static str {
        match self {
            SchemaTag::QualityAssessment => {
                r#"{
  "score": 0-100,
  "issues": [
    { "title": "string", "detail": "string", "severity": "High" | "Medium" | "Low" }
  ]
}"#
            }
            SchemaTag::Explanation => {
                r#"{
  "explanation": "string"
}"#
            }
            SchemaTag::Refactoring => {
                r#"{
  "refactoredCode": "string",
  "explanation": "string"
}"#
            }
            SchemaTag::SecurityAudit => {
                r#"{
  "vulnerabilities": [
    { "title": "string", "detail": "string", "severity": "Critical" | "High" | "Medium" | "Low", "cwe": "string" }
  ]
}"#
            }
            SchemaTag::Documentation => {
                r#"{
  "documentedCode": "string",
  "explanation": "string"
}"#
            }
            SchemaTag::PerfectCode => {
                r#"{
  "perfectCode": "string",
  "explanation": "string"
}"#
            }
        }
    }
}

impl fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaTag::QualityAssessment => "quality_assessment",
            SchemaTag::Explanation => "explanation",
            SchemaTag::Refactoring => "refactoring",
            SchemaTag::SecurityAudit => "security_audit",
            SchemaTag::Documentation => "documentation",
            SchemaTag::PerfectCode => "perfect_code",
        };
        write!(f, "{}", name)
    }
}

/// Composite result of one analysis submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalysisResult {
    /// Heuristic technical debt score
    pub score: u8,
    pub issues: Vec<Issue>,
    pub syntax_error: bool,
    pub explanation: String,
    pub security_vulnerabilities: Vec<SecurityVulnerability>,

    /// Score proposed by the AI reviewer, never merged into `score`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refactored_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refactoring_explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perfect_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perfect_code_explanation: Option<String>,
}

impl AnalysisResult {
    pub fn grade(&self) -> ScoreGrade {
        ScoreGrade::from_score(self.score)
    }
}

/// Persisted history entry, append-only
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalysisRecord {
    pub analysis_id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub code: String,
    pub result: AnalysisResult,
}

impl AnalysisRecord {
    /// New record stamped with a fresh id and the current time
    pub fn new(user_id: impl Into<String>, code: impl Into<String>, result: AnalysisResult) -> Self {
        Self {
            analysis_id: Uuid::new_v4(),
            user_id: user_id.into(),
            timestamp: Utc::now(),
            code: code.into(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_validation() {
        assert!(CodeSnippet::new("let x = 1;", MIN_CODE_LENGTH).is_ok());

        let err = CodeSnippet::new("x = 1", MIN_CODE_LENGTH).unwrap_err();
        assert_eq!(err, ValidationError::TooShort { min: 10, actual: 5 });
    }

    #[test]
    fn test_snippet_counts_characters_not_bytes() {
        // 9 characters, 18 bytes
        let err = CodeSnippet::new("éééééééé;", MIN_CODE_LENGTH).unwrap_err();
        assert_eq!(err, ValidationError::TooShort { min: 10, actual: 9 });
    }

    #[test]
    fn test_score_grades() {
        assert_eq!(ScoreGrade::from_score(100), ScoreGrade::Healthy);
        assert_eq!(ScoreGrade::from_score(80), ScoreGrade::Healthy);
        assert_eq!(ScoreGrade::from_score(79), ScoreGrade::Warning);
        assert_eq!(ScoreGrade::from_score(50), ScoreGrade::Warning);
        assert_eq!(ScoreGrade::from_score(10), ScoreGrade::Critical);
    }

    #[test]
    fn test_gate_verdict() {
        assert!(GateVerdict::evaluate(70, 70).passed);
        assert!(!GateVerdict::evaluate(69, 70).passed);
    }

    #[test]
    fn test_provider_id_parsing() {
        assert_eq!("Gemini".parse::<ProviderId>(), Ok(ProviderId::Gemini));
        assert_eq!("openai".parse::<ProviderId>(), Ok(ProviderId::OpenAI));
        assert!("claude".parse::<ProviderId>().is_err());
        assert_eq!(ProviderId::OpenAI.to_string(), "openai");
    }

    #[test]
    fn test_severity_wire_format() {
        let issue = Issue::new("Long Function", "too long", Severity::Low);
        let json = serde_json::to_string(&issue).unwrap();
        assert_eq!(
            json,
            r#"{"title":"Long Function","detail":"too long","severity":"Low"}"#
        );
    }

    #[test]
    fn test_schema_templates_mention_required_fields() {
        for tag in SchemaTag::ALL {
            for field in tag.required_fields() {
                assert!(tag.json_template().contains(field), "{} misses {}", tag, field);
            }
        }
    }
}
