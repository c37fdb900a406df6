//! Declarative AI task table
//!
//! Every AI request CodeGuardian makes is one [`AiTask`]. A task names its
//! prompt template and the [`SchemaTag`] its answer must decode to, so adding
//! a task never means writing a new parser.

use codeguardian_shared::SchemaTag;
use serde::{Deserialize, Serialize};
use std::fmt;

const QUALITY_REVIEW_PROMPT: &str = r#"You are an expert software architect. Analyze the provided code for quality, complexity, and maintainability.
Calculate a Technical Debt Score (0-100), where 100 is perfect.
Identify specific issues with clear titles, descriptions, and severity.

IMPORTANT: Your response must be a single, valid JSON object matching this structure:
{{{schema}}}

Code to analyze:
{{{code}}}"#;

const EXPLANATION_PROMPT: &str = r#"You are a senior engineer mentoring a colleague. Explain the problems found in this code and how to fix them, based on the provided analysis.
If the analysis says the code cannot execute, say so first.

IMPORTANT: Your response must be a single, valid JSON object matching this structure:
{{{schema}}}

Code:
{{{code}}}

Analysis:
{{{analysis}}}"#;

const REFACTOR_PROMPT: &str = r#"You are an expert software engineer specializing in code refactoring.
Given a code block and an analysis of its issues, refactor the code to address the problems. Keep the original behavior.

IMPORTANT: Your response must be a single, valid JSON object matching this structure:
{{{schema}}}

Original Code:
{{{code}}}

Analysis:
{{{analysis}}}"#;

const SECURITY_AUDIT_PROMPT: &str = r#"Perform a deep security audit on the following code. Identify vulnerabilities (SQLi, XSS, etc.) and provide CWE IDs.
Return an empty list when nothing is found.

IMPORTANT: Your response must be a single, valid JSON object matching this structure:
{{{schema}}}

Code:
{{{code}}}"#;

const DOCUMENTATION_PROMPT: &str = r#"You are an AI specialized in technical writing. Add professional documentation comments in the idiom of the code's language (JSDoc, TSDoc, rustdoc, docstrings).
Do not change the code itself.

IMPORTANT: Your response must be a single, valid JSON object matching this structure:
{{{schema}}}

Code Block:
{{{code}}}"#;

const PERFECT_CODE_PROMPT: &str = r#"Rewrite the following code to be optimized, secure, and clean while keeping its behavior.
Explain what you changed and why.

IMPORTANT: Your response must be a single, valid JSON object matching this structure:
{{{schema}}}

Original Code:
{{{code}}}"#;

/// One kind of request to the AI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiTask {
    QualityReview,
    Explanation,
    Refactor,
    SecurityAudit,
    Documentation,
    PerfectCode,
}

impl AiTask {
    pub const ALL: [AiTask; 6] = [
        AiTask::QualityReview,
        AiTask::Explanation,
        AiTask::Refactor,
        AiTask::SecurityAudit,
        AiTask::Documentation,
        AiTask::PerfectCode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AiTask::QualityReview => "quality_review",
            AiTask::Explanation => "explanation",
            AiTask::Refactor => "refactor",
            AiTask::SecurityAudit => "security_audit",
            AiTask::Documentation => "documentation",
            AiTask::PerfectCode => "perfect_code",
        }
    }

    /// Shape the answer must decode to
    pub fn schema(&self) -> SchemaTag {
        match self {
            AiTask::QualityReview => SchemaTag::QualityAssessment,
            AiTask::Explanation => SchemaTag::Explanation,
            AiTask::Refactor => SchemaTag::Refactoring,
            AiTask::SecurityAudit => SchemaTag::SecurityAudit,
            AiTask::Documentation => SchemaTag::Documentation,
            AiTask::PerfectCode => SchemaTag::PerfectCode,
        }
    }

    /// Handlebars template with `code`, `analysis` and `schema` slots
    pub fn template(&self) -> &'static str {
        match self {
            AiTask::QualityReview => QUALITY_REVIEW_PROMPT,
            AiTask::Explanation => EXPLANATION_PROMPT,
            AiTask::Refactor => REFACTOR_PROMPT,
            AiTask::SecurityAudit => SECURITY_AUDIT_PROMPT,
            AiTask::Documentation => DOCUMENTATION_PROMPT,
            AiTask::PerfectCode => PERFECT_CODE_PROMPT,
        }
    }

    /// Whether the prompt embeds the local analysis summary
    pub fn uses_analysis(&self) -> bool {
        matches!(self, AiTask::Explanation | AiTask::Refactor)
    }
}

impl fmt::Display for AiTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_embeds_schema_and_code() {
        for task in AiTask::ALL {
            let template = task.template();
            assert!(template.contains("{{{schema}}}"), "{task} has no schema slot");
            assert!(template.contains("{{{code}}}"), "{task} has no code slot");
            assert_eq!(template.contains("{{{analysis}}}"), task.uses_analysis(), "{task}");
        }
    }

    #[test]
    fn test_schema_mapping_is_one_to_one() {
        let mut schemas: Vec<SchemaTag> = AiTask::ALL.iter().map(|t| t.schema()).collect();
        schemas.dedup();
        assert_eq!(schemas.len(), SchemaTag::ALL.len());
        for tag in SchemaTag::ALL {
            assert!(schemas.contains(&tag));
        }
    }

    #[test]
    fn test_task_names() {
        assert_eq!(AiTask::SecurityAudit.to_string(), "security_audit");
        assert_eq!(
            serde_json::to_string(&AiTask::PerfectCode).unwrap(),
            "\"perfect_code\""
        );
    }
}
