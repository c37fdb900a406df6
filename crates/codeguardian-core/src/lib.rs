//! # CodeGuardian Core
//!
//! Core engine for CodeGuardian - technical debt scoring and AI code review
//!
//! This crate provides the building blocks of an analysis:
//! - Heuristic technical debt scoring, fully offline
//! - AI provider management and the schema-parametric response decoder
//! - Prompt templates for every AI task
//! - Per-user analysis history
//! - The engine that ties them together

pub mod ai;
pub mod analysis;
pub mod engine;
pub mod storage;
pub mod template;

// Re-export commonly used types
pub use codeguardian_shared::*;

pub use ai::{AiClient, AiTask, LlmProvider, ProviderFactory, decode, decode_as};
pub use analysis::{HeuristicScorer, LocalAnalyzer, MetricsCalculator, analysis_summary};
pub use engine::{AnalysisOutcome, AnalysisStage, GuardianEngine, StageFailure};
pub use storage::{HistoryStore, MemoryHistoryStore};
pub use template::PromptEngine;

use std::path::Path;
use uuid::Uuid;

/// Main facade for CodeGuardian
///
/// This is the primary interface for hosts. It loads configuration and API
/// keys, then hands every call to the [`GuardianEngine`].
pub struct CodeGuardian {
    engine: GuardianEngine,
}

impl CodeGuardian {
    /// Create an instance from the default search paths and environment
    pub async fn new() -> Result<Self> {
        let config = GuardianConfig::load_with_env()?;
        Self::with_config(config).await
    }

    /// Create an instance from a configuration file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let config = GuardianConfig::load_from_file(path)?;
        Self::with_config(config).await
    }

    /// Create an instance with a custom configuration
    pub async fn with_config(config: GuardianConfig) -> Result<Self> {
        let api_keys = config.load_api_keys();
        let engine = GuardianEngine::from_config(config, &api_keys).await?;
        Ok(Self { engine })
    }

    /// Wrap an engine built by hand
    pub fn from_engine(engine: GuardianEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &GuardianEngine {
        &self.engine
    }

    /// Score a snippet locally
    pub fn score(&self, code: &str) -> Result<ScoreReport> {
        self.engine.score_code(code)
    }

    /// Run a full analysis and store it under `user_id`
    pub async fn analyze(&self, user_id: &str, code: &str) -> Result<AnalysisOutcome> {
        self.engine.analyze(user_id, code).await
    }

    /// Past analyses of a user, newest first
    pub async fn history(&self, user_id: &str) -> Result<Vec<AnalysisRecord>> {
        self.engine.history(user_id).await
    }

    /// One past analysis of a user
    pub async fn report(&self, user_id: &str, analysis_id: Uuid) -> Result<Option<AnalysisRecord>> {
        self.engine.report(user_id, analysis_id).await
    }

    /// Get current configuration
    pub fn config(&self) -> &GuardianConfig {
        self.engine.config()
    }
}
