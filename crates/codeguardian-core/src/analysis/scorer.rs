//! Heuristic technical debt scorer
//!
//! Turns [`SnippetMetrics`] into a 0-100 score plus the issues that explain
//! the deductions. Scoring is pure and deterministic: the same text always
//! yields the same report.

use super::metrics::{MetricsCalculator, SnippetMetrics};
use codeguardian_shared::{
    Issue, MAX_SCORE, ScoreReport, ScoringPolicy, SecuritySeverity, SecurityVulnerability,
    Severity,
};

pub const SYNTAX_ERROR_TITLE: &str = "Syntax Error: Unmatched Braces";
pub const LONG_FUNCTION_TITLE: &str = "Long Function";
pub const COMPLEXITY_TITLE: &str = "High Cyclomatic Complexity";
pub const NESTED_LOOPS_TITLE: &str = "Nested Loops Detected";
pub const INEFFICIENT_LOOKUP_TITLE: &str = "Inefficient Lookup in Loop";
pub const XSS_TITLE: &str = "Potential Cross-Site Scripting (XSS)";
pub const XSS_CWE: &str = "CWE-79";

/// Local, free scorer that never calls out to the AI collaborator
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    policy: ScoringPolicy,
}

impl HeuristicScorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Score raw source text. Never fails; empty text scores 100.
    pub fn score(&self, code: &str) -> ScoreReport {
        let metrics = MetricsCalculator::calculate(code);
        self.score_metrics(&metrics)
    }

    /// Apply the scoring policy to already collected metrics
    pub fn score_metrics(&self, metrics: &SnippetMetrics) -> ScoreReport {
        let policy = &self.policy;
        let mut penalty = 0.0_f64;
        let mut issues = Vec::new();
        let mut security_findings = Vec::new();

        if metrics.lines > policy.long_function_lines {
            let extra = (metrics.lines - policy.long_function_lines) as f64;
            penalty += (extra * policy.penalty_per_extra_line).min(policy.max_line_penalty);
            issues.push(Issue::new(
                LONG_FUNCTION_TITLE,
                format!(
                    "The snippet spans {} lines. Blocks longer than {} lines are harder to read and test; consider splitting it into smaller functions.",
                    metrics.lines, policy.long_function_lines
                ),
                Severity::Low,
            ));
        }

        let complexity_elevated = metrics.complexity_keywords > policy.complexity_threshold;
        if complexity_elevated {
            let extra = (metrics.complexity_keywords - policy.complexity_threshold) as f64;
            penalty += (extra * policy.penalty_per_extra_keyword).min(policy.max_complexity_penalty);
            issues.push(Issue::new(
                COMPLEXITY_TITLE,
                format!(
                    "Found {} branching or looping statements. Each one adds a path to test; consider early returns or extracting helpers.",
                    metrics.complexity_keywords
                ),
                Severity::Medium,
            ));
        }

        if metrics.nested_loops > 0 {
            penalty += policy.nested_loop_penalty * metrics.nested_loops as f64;
            issues.push(Issue::new(
                NESTED_LOOPS_TITLE,
                format!(
                    "Found {} loop(s) nested inside another loop. Nested iteration grows quadratically with input size; consider an index or a single pass.",
                    metrics.nested_loops
                ),
                Severity::High,
            ));
        }

        if metrics.lookup_in_loop && (metrics.nested_loops > 0 || complexity_elevated) {
            penalty += policy.inefficient_lookup_penalty;
            issues.push(Issue::new(
                INEFFICIENT_LOOKUP_TITLE,
                "A linear membership test (includes, indexOf or contains) runs inside a loop. A Set or Map gives constant time lookups.",
                Severity::Medium,
            ));
        }

        if metrics.unsafe_html {
            penalty += policy.unsafe_html_penalty;
            security_findings.push(SecurityVulnerability {
                title: XSS_TITLE.to_string(),
                detail: "Raw HTML is injected into the page. Untrusted input reaching this sink allows script injection; sanitize it or use text APIs.".to_string(),
                severity: SecuritySeverity::High,
                cwe: XSS_CWE.to_string(),
            });
        }

        let mut score = (f64::from(MAX_SCORE) - penalty)
            .round()
            .clamp(0.0, f64::from(MAX_SCORE)) as u8;

        let syntax_error = !metrics.braces_balanced();
        if syntax_error {
            score = policy.syntax_error_score.min(MAX_SCORE);
            issues.insert(
                0,
                Issue::new(
                    SYNTAX_ERROR_TITLE,
                    format!(
                        "Found {} opening and {} closing braces. The code cannot execute as written.",
                        metrics.open_braces, metrics.close_braces
                    ),
                    Severity::High,
                ),
            );
        }

        ScoreReport {
            score,
            issues,
            security_findings,
            syntax_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> HeuristicScorer {
        HeuristicScorer::default()
    }

    #[test]
    fn test_clean_code_scores_100() {
        let report = scorer().score("const total = a + b;\nreturn total;");
        assert_eq!(report.score, 100);
        assert!(report.issues.is_empty());
        assert!(report.security_findings.is_empty());
        assert!(!report.syntax_error);
    }

    #[test]
    fn test_empty_input_scores_100() {
        assert_eq!(scorer().score("").score, 100);
    }

    #[test]
    fn test_two_sequential_loops_score_100() {
        let code = r#"for (let i = 0; i < n; i++) { total += i; }
for (let j = 0; j < n; j++) { total += j; }
const x = 1;
const y = 2;
console.log(total);"#;
        let report = scorer().score(code);
        assert_eq!(report.score, 100);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_deeply_nested_ifs_balanced() {
        let report = scorer().score("function f(){ if(a){ if(b){ if(c){ if(d){ if(e){} } } } } }");
        assert!(!report.syntax_error);
        assert_eq!(report.score, 97);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].title, COMPLEXITY_TITLE);
        assert_eq!(report.issues[0].severity, Severity::Medium);
    }

    #[test]
    fn test_unmatched_brace_forces_syntax_error() {
        let report = scorer().score("function f(){ if(a){ if(b){ if(c){ if(d){ if(e){} } } } } } }");
        assert!(report.syntax_error);
        assert_eq!(report.score, 10);
        assert_eq!(report.issues[0].title, SYNTAX_ERROR_TITLE);
        assert_eq!(report.issues[0].severity, Severity::High);
        assert_eq!(report.issues[1].title, COMPLEXITY_TITLE);
    }

    #[test]
    fn test_extra_opening_brace() {
        let report = scorer().score("function broken() {\n  return 1;\n");
        assert_eq!(report.score, 10);
        assert_eq!(report.issues[0].title, SYNTAX_ERROR_TITLE);
    }

    #[test]
    fn test_long_function_penalty() {
        let code = "let x = 1;\n".repeat(40);
        let report = scorer().score(&code);
        // 10 extra lines * 0.8
        assert_eq!(report.score, 92);
        assert_eq!(report.issues[0].title, LONG_FUNCTION_TITLE);
        assert_eq!(report.issues[0].severity, Severity::Low);

        let huge = "let x = 1;\n".repeat(500);
        assert_eq!(scorer().score(&huge).score, 80);
    }

    #[test]
    fn test_complexity_penalty_is_capped() {
        let code = "if (a) {}\n".repeat(25);
        let report = scorer().score(&code);
        assert_eq!(report.score, 70);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_nested_loops_single_issue() {
        let code = r#"
for (let i = 0; i < n; i++) {
  for (let j = 0; j < n; j++) {
    for (let k = 0; k < n; k++) { x++; }
  }
}"#;
        let report = scorer().score(code);
        assert_eq!(report.score, 50);
        let nested: Vec<_> = report
            .issues
            .iter()
            .filter(|issue| issue.title == NESTED_LOOPS_TITLE)
            .collect();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].severity, Severity::High);
        assert!(nested[0].detail.contains('2'));
    }

    #[test]
    fn test_more_nesting_never_raises_score() {
        let mut previous = u8::MAX;
        for depth in 1..8 {
            let mut code = String::new();
            for level in 0..depth {
                code.push_str(&format!("for (let i{level} = 0; i{level} < n; i{level}++) {{\n"));
            }
            code.push_str("x++;\n");
            code.push_str(&"}\n".repeat(depth));

            let score = scorer().score(&code).score;
            assert!(score <= previous, "depth {depth} scored {score} > {previous}");
            previous = score;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_lookup_requires_elevated_nesting_or_complexity() {
        let plain = "for (const x of xs) {\n  if (ys.includes(x)) { hits++; }\n}";
        let report = scorer().score(plain);
        assert!(report.issues.iter().all(|i| i.title != INEFFICIENT_LOOKUP_TITLE));
        assert_eq!(report.score, 100);

        let nested = "for (const x of xs) {\n  for (const y of ys) {\n    if (zs.includes(y)) { hits++; }\n  }\n}";
        let report = scorer().score(nested);
        assert!(report.issues.iter().any(|i| i.title == INEFFICIENT_LOOKUP_TITLE));
        assert_eq!(report.score, 65);
    }

    #[test]
    fn test_unsafe_html_is_security_finding() {
        let report = scorer().score("element.innerHTML = location.hash.slice(1);");
        assert_eq!(report.score, 80);
        assert!(report.issues.is_empty());
        assert_eq!(report.security_findings.len(), 1);
        assert_eq!(report.security_findings[0].cwe, XSS_CWE);
        assert_eq!(report.security_findings[0].severity, SecuritySeverity::High);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let code = "for (a of b) {\n for (c of d) { if (e.indexOf(c) > -1) {} }\n}\nel.innerHTML = x;";
        let scorer = scorer();
        assert_eq!(scorer.score(code), scorer.score(code));
    }

    #[test]
    fn test_custom_policy() {
        let policy = ScoringPolicy {
            nested_loop_penalty: 40.0,
            syntax_error_score: 0,
            ..ScoringPolicy::default()
        };
        let scorer = HeuristicScorer::new(policy);
        assert_eq!(scorer.score("while (a) { while (b) { x(); } }").score, 60);
        assert_eq!(scorer.score("{").score, 0);
    }
}
