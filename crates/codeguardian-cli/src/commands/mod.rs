//! Command handlers
//!
//! Local commands (score, gate, history) never build an AI provider, so they
//! work without API keys.

use anyhow::{Context, Result, bail};
use codeguardian_core::storage::open_store;
use codeguardian_core::{
    AnalysisOutcome, AnalysisRecord, AnalysisResult, GateVerdict, GuardianConfig, GuardianEngine,
    HealthStatus, Issue, LocalAnalyzer, ScoreGrade, ScoreReport,
    SecurityVulnerability,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing::debug;
use uuid::Uuid;

/// How results are printed
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text(value));
        }
        Ok(())
    }
}

/// Read the snippet from a file, or stdin when the path is absent or `-`
pub async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut code = String::new();
            tokio::io::stdin()
                .read_to_string(&mut code)
                .await
                .context("failed to read stdin")?;
            Ok(code)
        }
    }
}

async fn build_engine(config: GuardianConfig) -> Result<GuardianEngine> {
    let api_keys = config.load_api_keys();
    GuardianEngine::from_config(config, &api_keys)
        .await
        .context("failed to initialize the analysis engine")
}

pub async fn score(config: &GuardianConfig, input: Option<&Path>, output: Output) -> Result<ExitCode> {
    let code = read_input(input).await?;
    let report = LocalAnalyzer::from_config(&config.analysis).score_code(&code)?;
    output.emit(&report, format_report)?;
    Ok(ExitCode::SUCCESS)
}

pub async fn analyze(
    config: GuardianConfig,
    input: Option<&Path>,
    user: &str,
    output: Output,
) -> Result<ExitCode> {
    let code = read_input(input).await?;
    let engine = build_engine(config).await?;

    let outcome = engine.analyze(user, &code).await?;
    debug!(failures = outcome.failures.len(), "Analysis finished");

    output.emit(&outcome, format_outcome)?;
    Ok(ExitCode::SUCCESS)
}

pub async fn audit(config: GuardianConfig, input: Option<&Path>, output: Output) -> Result<ExitCode> {
    let code = read_input(input).await?;
    let findings = build_engine(config).await?.security_audit(&code).await?;

    output.emit(&findings, |findings| format_findings(findings))?;
    Ok(ExitCode::SUCCESS)
}

pub async fn refactor(config: GuardianConfig, input: Option<&Path>, output: Output) -> Result<ExitCode> {
    let code = read_input(input).await?;
    let refactoring = build_engine(config).await?.refactor(&code, None).await?;

    output.emit(&refactoring, |r| {
        format!("{}\n\n🤖 {}", r.refactored_code, r.explanation)
    })?;
    Ok(ExitCode::SUCCESS)
}

pub async fn perfect(config: GuardianConfig, input: Option<&Path>, output: Output) -> Result<ExitCode> {
    let code = read_input(input).await?;
    let perfect = build_engine(config).await?.generate_perfect_code(&code).await?;

    output.emit(&perfect, |p| format!("{}\n\n🤖 {}", p.perfect_code, p.explanation))?;
    Ok(ExitCode::SUCCESS)
}

pub async fn document(config: GuardianConfig, input: Option<&Path>, output: Output) -> Result<ExitCode> {
    let code = read_input(input).await?;
    let documentation = build_engine(config).await?.generate_documentation(&code).await?;

    output.emit(&documentation, |d| {
        format!("{}\n\n🤖 {}", d.documented_code, d.explanation)
    })?;
    Ok(ExitCode::SUCCESS)
}

pub async fn gate(
    config: &GuardianConfig,
    input: Option<&Path>,
    threshold: Option<u8>,
    output: Output,
) -> Result<ExitCode> {
    let code = read_input(input).await?;
    let verdict = LocalAnalyzer::from_config(&config.analysis).commit_gate(&code, threshold)?;

    output.emit(&verdict, format_verdict)?;
    Ok(if verdict.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub async fn status(config: GuardianConfig, output: Output) -> Result<ExitCode> {
    let provider = config.ai.provider;
    let engine = build_engine(config).await?;
    let health = engine.health_check().await;

    output.emit(&health, |health| match health {
        HealthStatus::Healthy => format!("✅ {} is healthy", provider),
        HealthStatus::Degraded { reason } => format!("⚠️  {} is degraded: {}", provider, reason),
        HealthStatus::Unhealthy { reason } => format!("❌ {} is unavailable: {}", provider, reason),
    })?;

    Ok(if health.is_available() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub async fn history_list(config: &GuardianConfig, user: &str, output: Output) -> Result<ExitCode> {
    let store = open_store(&config.storage).await?;
    let records = store.list_for_user(user).await?;

    output.emit(&records, |records| format_history(records))?;
    Ok(ExitCode::SUCCESS)
}

pub async fn history_show(
    config: &GuardianConfig,
    user: &str,
    id: Uuid,
    output: Output,
) -> Result<ExitCode> {
    let store = open_store(&config.storage).await?;
    let Some(record) = store.get(user, id).await? else {
        bail!("no analysis {} for user {}", id, user);
    };

    output.emit(&record, |record| {
        format!(
            "Analysis {} ({})\n\n{}",
            record.analysis_id,
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            format_result(&record.result)
        )
    })?;
    Ok(ExitCode::SUCCESS)
}

fn grade_icon(grade: ScoreGrade) -> &'static str {
    match grade {
        ScoreGrade::Healthy => "🟢",
        ScoreGrade::Warning => "🟡",
        ScoreGrade::Critical => "🔴",
    }
}

fn push_issues(text: &mut String, issues: &[Issue]) {
    for issue in issues {
        let _ = writeln!(text, "  [{}] {}: {}", issue.severity, issue.title, issue.detail);
    }
}

fn push_findings(text: &mut String, findings: &[SecurityVulnerability]) {
    for finding in findings {
        let _ = writeln!(
            text,
            "  [{}] {} ({}): {}",
            finding.severity, finding.title, finding.cwe, finding.detail
        );
    }
}

fn format_report(report: &ScoreReport) -> String {
    let mut text = format!(
        "{} Technical debt score: {}/100\n",
        grade_icon(report.grade()),
        report.score
    );

    if !report.has_findings() {
        text.push_str("No issues found.");
        return text;
    }
    if !report.issues.is_empty() {
        text.push_str("Issues:\n");
        push_issues(&mut text, &report.issues);
    }
    if !report.security_findings.is_empty() {
        text.push_str("Security:\n");
        push_findings(&mut text, &report.security_findings);
    }
    text.trim_end().to_string()
}

fn format_result(result: &AnalysisResult) -> String {
    let mut text = format!(
        "{} Technical debt score: {}/100\n",
        grade_icon(result.grade()),
        result.score
    );
    if let Some(ai_score) = result.ai_score {
        let _ = writeln!(text, "AI quality score: {}/100", ai_score);
    }
    if !result.issues.is_empty() {
        text.push_str("Issues:\n");
        push_issues(&mut text, &result.issues);
    }
    if !result.security_vulnerabilities.is_empty() {
        text.push_str("Security:\n");
        push_findings(&mut text, &result.security_vulnerabilities);
    }
    let _ = writeln!(text, "\n🤖 {}", result.explanation);

    if let Some(code) = &result.refactored_code {
        let _ = writeln!(text, "\nRefactored code:\n{}", code);
        if let Some(explanation) = &result.refactoring_explanation {
            let _ = writeln!(text, "{}", explanation);
        }
    }
    if let Some(code) = &result.perfect_code {
        let _ = writeln!(text, "\nPerfect code:\n{}", code);
        if let Some(explanation) = &result.perfect_code_explanation {
            let _ = writeln!(text, "{}", explanation);
        }
    }
    text.trim_end().to_string()
}

fn format_outcome(outcome: &AnalysisOutcome) -> String {
    let mut text = format_result(&outcome.result);

    for failure in &outcome.failures {
        let _ = write!(text, "\n⚠️  {} failed: {}", failure.stage, failure.message);
    }
    if let Some(id) = outcome.analysis_id {
        let _ = write!(text, "\n\nSaved as {}", id);
    }
    text
}

fn format_findings(findings: &[SecurityVulnerability]) -> String {
    if findings.is_empty() {
        return "✅ No vulnerabilities found.".to_string();
    }
    let mut text = String::from("Security:\n");
    push_findings(&mut text, findings);
    text.trim_end().to_string()
}

fn format_verdict(verdict: &GateVerdict) -> String {
    if verdict.passed {
        format!("✅ Commit allowed: score {} >= {}", verdict.score, verdict.threshold)
    } else {
        format!("❌ Commit blocked: score {} < {}", verdict.score, verdict.threshold)
    }
}

fn format_history(records: &[AnalysisRecord]) -> String {
    if records.is_empty() {
        return "No analyses yet.".to_string();
    }

    records
        .iter()
        .map(|record| {
            let first_line = record.code.lines().next().unwrap_or_default();
            format!(
                "{} {}  {} {:>3}  {}",
                record.analysis_id,
                record.timestamp.format("%Y-%m-%d %H:%M"),
                grade_icon(record.result.grade()),
                record.result.score,
                first_line.chars().take(48).collect::<String>()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeguardian_core::{Severity, StorageBackend};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn memory_config() -> GuardianConfig {
        let mut config = GuardianConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config
    }

    fn source_file(code: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(code.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_read_input_from_file() {
        let file = source_file("let total = a + b;");
        let code = read_input(Some(file.path())).await.unwrap();
        assert_eq!(code, "let total = a + b;");
    }

    #[tokio::test]
    async fn test_read_input_missing_file() {
        let error = read_input(Some(Path::new("/definitely/not/here.js"))).await.unwrap_err();
        assert!(error.to_string().contains("/definitely/not/here.js"));
    }

    #[tokio::test]
    async fn test_gate_exit_codes() {
        let config = memory_config();
        let output = Output { json: true };
        let nested = source_file("while (a) {\n  while (b) {\n    step();\n  }\n}");

        let passed = gate(&config, Some(nested.path()), Some(75), output).await.unwrap();
        assert_eq!(passed, ExitCode::SUCCESS);

        let default = gate(&config, Some(nested.path()), None, output).await.unwrap();
        assert_eq!(default, ExitCode::SUCCESS);

        let blocked = gate(&config, Some(nested.path()), Some(90), output).await.unwrap();
        assert_eq!(blocked, ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_score_rejects_short_input() {
        let file = source_file("x = 1");
        let error = score(&memory_config(), Some(file.path()), Output { json: false })
            .await
            .unwrap_err();
        assert!(error.to_string().contains("at least 10 characters"));
    }

    #[tokio::test]
    async fn test_history_show_unknown_id() {
        let error = history_show(&memory_config(), "ada", Uuid::new_v4(), Output { json: false })
            .await
            .unwrap_err();
        assert!(error.to_string().starts_with("no analysis"));
    }

    #[test]
    fn test_format_report() {
        let clean = format_report(&ScoreReport::clean());
        assert!(clean.contains("100/100"));
        assert!(clean.ends_with("No issues found."));

        let report = ScoreReport {
            score: 75,
            issues: vec![Issue::new("Nested Loops Detected", "1 nested loop", Severity::High)],
            security_findings: Vec::new(),
            syntax_error: false,
        };
        let text = format_report(&report);
        assert!(text.starts_with("🟡"));
        assert!(text.contains("[High] Nested Loops Detected: 1 nested loop"));
    }

    #[test]
    fn test_format_outcome_lists_failures() {
        let outcome = AnalysisOutcome {
            result: AnalysisResult {
                score: 40,
                explanation: "Flatten the loops.".to_string(),
                ..AnalysisResult::default()
            },
            analysis_id: None,
            failures: vec![codeguardian_core::StageFailure {
                stage: codeguardian_core::AnalysisStage::SecurityAudit,
                message: "AI service unavailable".to_string(),
            }],
        };

        let text = format_outcome(&outcome);
        assert!(text.starts_with("🔴"));
        assert!(text.contains("🤖 Flatten the loops."));
        assert!(text.contains("security audit failed: AI service unavailable"));
        assert!(!text.contains("Saved as"));
    }
}
