//! Local Code Analysis
//!
//! This module provides the deterministic, offline half of CodeGuardian:
//! - Single-pass lexical scanning of raw source text
//! - Metrics collection (lines, branching, nested loops, brace balance)
//! - Heuristic technical debt scoring and the commit gate
//! - Analysis summaries for the AI collaborator

pub mod local;
pub mod metrics;
pub mod scanner;
pub mod scorer;
pub mod summary;

// Re-export main types
pub use local::LocalAnalyzer;
pub use metrics::{MetricsCalculator, SnippetMetrics};
pub use scorer::HeuristicScorer;
pub use summary::{SYNTAX_ERROR_NOTICE, analysis_summary, findings_summary};
