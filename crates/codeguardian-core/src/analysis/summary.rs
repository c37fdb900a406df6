//! Textual analysis summary handed to the AI collaborator

use codeguardian_shared::{ScoreReport, SecurityVulnerability};
use serde_json::json;

/// Leads every explanation of code whose braces do not balance
pub const SYNTAX_ERROR_NOTICE: &str =
    "This code cannot execute: its braces are unmatched, so it will fail to parse before any logic runs.";

/// Render the issue and finding lists of a report as pretty JSON.
///
/// A report with a syntax error is prefixed with [`SYNTAX_ERROR_NOTICE`] so the
/// model addresses it first.
pub fn analysis_summary(report: &ScoreReport) -> String {
    findings_summary(report, &report.security_findings)
}

/// Same as [`analysis_summary`] with `findings` in place of the local security findings
pub fn findings_summary(report: &ScoreReport, findings: &[SecurityVulnerability]) -> String {
    let body = json!({
        "score": report.score,
        "issues": report.issues,
        "securityVulnerabilities": findings,
    });
    let rendered = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());

    if report.syntax_error {
        format!("{SYNTAX_ERROR_NOTICE}\n\n{rendered}")
    } else {
        rendered
    }
}

/// Make sure an explanation of broken code starts with the syntax notice
pub fn with_syntax_notice(explanation: String, syntax_error: bool) -> String {
    if !syntax_error || explanation.starts_with(SYNTAX_ERROR_NOTICE) {
        return explanation;
    }
    format!("{SYNTAX_ERROR_NOTICE}\n\n{explanation}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::HeuristicScorer;
    use codeguardian_shared::SecuritySeverity;

    #[test]
    fn test_summary_lists_issues() {
        let report = HeuristicScorer::default()
            .score("while (a) {\n  while (b) { step(); }\n}\nel.innerHTML = html;");
        let summary = analysis_summary(&report);

        assert!(summary.contains("Nested Loops Detected"));
        assert!(summary.contains("CWE-79"));
        assert!(!summary.starts_with(SYNTAX_ERROR_NOTICE));

        let parsed: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(parsed["issues"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_summary_flags_syntax_error() {
        let report = HeuristicScorer::default().score("function f() { return 1;");
        assert!(analysis_summary(&report).starts_with(SYNTAX_ERROR_NOTICE));
    }

    #[test]
    fn test_findings_summary_lists_merged_findings() {
        let report = HeuristicScorer::default().score("const total = price * quantity;");
        let injection = SecurityVulnerability {
            title: "SQL Injection".to_string(),
            detail: "Query built from user input".to_string(),
            severity: SecuritySeverity::Critical,
            cwe: "CWE-89".to_string(),
        };

        let summary = findings_summary(&report, std::slice::from_ref(&injection));
        let parsed: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(parsed["securityVulnerabilities"][0]["cwe"], "CWE-89");
        assert!(!analysis_summary(&report).contains("CWE-89"));
    }

    #[test]
    fn test_with_syntax_notice() {
        assert_eq!(with_syntax_notice("fine".to_string(), false), "fine");

        let noted = with_syntax_notice("Fix the loop.".to_string(), true);
        assert!(noted.starts_with(SYNTAX_ERROR_NOTICE));
        assert!(noted.ends_with("Fix the loop."));
        assert_eq!(with_syntax_notice(noted.clone(), true), noted);
    }
}
