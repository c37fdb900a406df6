//! Snippet Metrics Collection
//!
//! This module gathers the raw measurements the heuristic scorer works from:
//! - Line count
//! - Branching keyword count
//! - Nested loop instances and lookups inside loops
//! - Raw HTML injection API usage
//! - Brace balance

use super::scanner;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Raw HTML injection API names. The `regex` crate guarantees linear time.
static UNSAFE_HTML: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"dangerouslySetInnerHTML|\b(?:inner|outer)HTML\s*\+?=(?:[^=]|$)|insertAdjacentHTML|document\.write(?:ln)?\s*\(",
    )
    .ok()
});

/// Measurements taken from one snippet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetMetrics {
    /// Total lines in the snippet
    pub lines: usize,

    /// Occurrences of `if`, `for`, `while`, `switch` and `case`
    pub complexity_keywords: usize,

    /// Loop headers found inside another loop body
    pub nested_loops: usize,

    /// A linear membership test was called inside a loop body
    pub lookup_in_loop: bool,

    /// Raw HTML injection API was used
    pub unsafe_html: bool,

    pub open_braces: usize,
    pub close_braces: usize,
}

impl SnippetMetrics {
    pub fn braces_balanced(&self) -> bool {
        self.open_braces == self.close_braces
    }
}

/// Metrics calculator
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics for a snippet in one pass over the text
    pub fn calculate(content: &str) -> SnippetMetrics {
        let summary = scanner::scan(content);

        SnippetMetrics {
            lines: summary.lines,
            complexity_keywords: summary.complexity_keywords,
            nested_loops: summary.nested_loops,
            lookup_in_loop: summary.lookup_in_loop,
            unsafe_html: Self::detect_unsafe_html(content),
            open_braces: summary.open_braces,
            close_braces: summary.close_braces,
        }
    }

    fn detect_unsafe_html(content: &str) -> bool {
        UNSAFE_HTML
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_count() {
        let code = "let a = 1;\nlet b = 2;\n\nlet c = 3;";
        assert_eq!(MetricsCalculator::calculate(code).lines, 4);
    }

    #[test]
    fn test_unsafe_html_detection() {
        let cases = [
            ("el.innerHTML = userInput;", true),
            ("el.outerHTML=markup", true),
            ("el.innerHTML += userInput;", true),
            ("list.innerHTML+=`<li>${item}</li>`", true),
            ("<div dangerouslySetInnerHTML={{ __html: x }} />", true),
            ("node.insertAdjacentHTML('beforeend', html)", true),
            ("document.write(payload)", true),
            ("if (el.innerHTML === '') { clear(); }", false),
            ("if (el.innerHTML == old) { skip(); }", false),
            ("el.textContent = userInput;", false),
        ];

        for (code, expected) in cases {
            assert_eq!(
                MetricsCalculator::calculate(code).unsafe_html,
                expected,
                "unexpected result for {code:?}"
            );
        }
    }

    #[test]
    fn test_brace_balance() {
        assert!(MetricsCalculator::calculate("fn a() { b(); }").braces_balanced());
        assert!(!MetricsCalculator::calculate("fn a() { b(); ").braces_balanced());
    }

    #[test]
    fn test_nested_loop_metrics() {
        let code = r#"
for (const a of xs) {
    for (const b of ys) {
        if (seen.indexOf(b) >= 0) { continue; }
    }
}
"#;
        let metrics = MetricsCalculator::calculate(code);
        assert_eq!(metrics.nested_loops, 1);
        assert!(metrics.lookup_in_loop);
        assert_eq!(metrics.complexity_keywords, 3);
    }
}
