//! Configuration management for CodeGuardian
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `CODEGUARDIAN__SECTION__KEY` environment variables. API keys are never read
//! from files.

use crate::error::ConfigError;
use crate::types::{MIN_CODE_LENGTH, ProviderId};
use config::{Config, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "CODEGUARDIAN";

/// Main configuration structure for CodeGuardian
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// AI provider configuration
    pub ai: AiConfig,

    /// Analysis pipeline settings
    pub analysis: AnalysisConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// History storage settings
    pub storage: StorageConfig,
}

/// AI provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider used for every AI task
    pub provider: ProviderId,

    /// Deadline forwarded to each HTTP request
    pub request_timeout_seconds: u64,

    /// Ask providers for JSON-only output; responses are still decoded
    pub json_mode: bool,

    /// Provider-specific configurations
    pub providers: ProvidersConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderId::Gemini,
            request_timeout_seconds: 60,
            json_mode: true,
            providers: ProvidersConfig::default(),
        }
    }
}

/// Per-provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: ProviderConfig,
    pub openai: ProviderConfig,
    pub ollama: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, id: ProviderId) -> &ProviderConfig {
        match id {
            ProviderId::Gemini => &self.gemini,
            ProviderId::OpenAI => &self.openai,
            ProviderId::Ollama => &self.ollama,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            gemini: ProviderConfig::with_model("gemini-1.5-flash"),
            openai: ProviderConfig::with_model("gpt-4o"),
            ollama: ProviderConfig {
                endpoint: Some("http://localhost:11434".to_string()),
                ..ProviderConfig::with_model("codellama:7b")
            },
        }
    }
}

/// Configuration for a specific AI provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Model to use for this provider
    pub model: String,

    /// Custom endpoint (for proxies and self-hosted models)
    pub endpoint: Option<String>,

    /// Maximum tokens for responses
    pub max_tokens: Option<usize>,

    /// Temperature settings (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            endpoint: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::with_model("")
    }
}

/// Analysis pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Snippets shorter than this are rejected
    pub min_code_length: usize,

    /// Minimum score for the commit gate to pass
    pub commit_threshold: u8,

    /// Also ask the AI for its own 0-100 score
    pub request_ai_score: bool,

    /// Request refactored code as part of a full analysis
    pub include_refactoring: bool,

    /// Request "perfect" code as part of a full analysis
    pub include_perfect_code: bool,

    /// Heuristic scorer policy table
    pub scoring: ScoringPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_code_length: MIN_CODE_LENGTH,
            commit_threshold: 70,
            request_ai_score: false,
            include_refactoring: false,
            include_perfect_code: false,
            scoring: ScoringPolicy::default(),
        }
    }
}

/// Thresholds and penalties of the heuristic scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Lines allowed before the long function penalty applies
    pub long_function_lines: usize,
    pub penalty_per_extra_line: f64,
    pub max_line_penalty: f64,

    /// Branching/looping keywords allowed before the complexity penalty
    pub complexity_threshold: usize,
    pub penalty_per_extra_keyword: f64,
    pub max_complexity_penalty: f64,

    /// Penalty per nested loop instance
    pub nested_loop_penalty: f64,

    /// Penalty for a linear membership test inside a loop
    pub inefficient_lookup_penalty: f64,

    /// Penalty for raw HTML injection
    pub unsafe_html_penalty: f64,

    /// Score forced when braces do not balance
    pub syntax_error_score: u8,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            long_function_lines: 30,
            penalty_per_extra_line: 0.8,
            max_line_penalty: 20.0,
            complexity_threshold: 4,
            penalty_per_extra_keyword: 3.0,
            max_complexity_penalty: 30.0,
            nested_loop_penalty: 25.0,
            inefficient_lookup_penalty: 10.0,
            unsafe_html_penalty: 20.0,
            syntax_error_score: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    pub level: String,

    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// History storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

/// History storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Database file, defaults to the user data directory
    pub sqlite_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: None,
        }
    }
}

impl StorageConfig {
    pub fn resolved_sqlite_path(&self) -> PathBuf {
        self.sqlite_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("codeguardian")
                .join("history.db")
        })
    }
}

impl GuardianConfig {
    /// Load defaults, the given file (which must exist) and the environment
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        Self::build(Some(path))
    }

    /// Load defaults, the first discovered config file and the environment
    pub fn load_with_env() -> Result<Self, ConfigError> {
        let discovered = Self::search_paths().into_iter().find(|p| p.exists());
        Self::build(discovered.as_deref())
    }

    fn build(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: GuardianConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat {
            message: e.to_string(),
        })?;

        std::fs::write(path, content).map_err(|e| ConfigError::InvalidFormat {
            message: format!("cannot write {}: {}", path.display(), e),
        })
    }

    /// Reject inconsistent values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.commit_threshold > 100 {
            return Err(ConfigError::InvalidValue {
                key: "analysis.commit_threshold".to_string(),
                value: self.analysis.commit_threshold.to_string(),
            });
        }

        if self.analysis.scoring.syntax_error_score > 100 {
            return Err(ConfigError::InvalidValue {
                key: "analysis.scoring.syntax_error_score".to_string(),
                value: self.analysis.scoring.syntax_error_score.to_string(),
            });
        }

        if self.ai.providers.get(self.ai.provider).model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("ai.providers.{}.model", self.ai.provider),
                value: String::new(),
            });
        }

        if let Some(temperature) = self.ai.providers.get(self.ai.provider).temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidValue {
                    key: format!("ai.providers.{}.temperature", self.ai.provider),
                    value: temperature.to_string(),
                });
            }
        }

        let penalties = [
            self.analysis.scoring.penalty_per_extra_line,
            self.analysis.scoring.max_line_penalty,
            self.analysis.scoring.penalty_per_extra_keyword,
            self.analysis.scoring.max_complexity_penalty,
            self.analysis.scoring.nested_loop_penalty,
            self.analysis.scoring.inefficient_lookup_penalty,
            self.analysis.scoring.unsafe_html_penalty,
        ];
        if penalties.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "analysis.scoring".to_string(),
                value: "penalties must be finite and non-negative".to_string(),
            });
        }

        Ok(())
    }

    /// Load API keys from the process environment
    pub fn load_api_keys(&self) -> ApiKeys {
        ApiKeys::from_lookup(|name| std::env::var(name).ok())
    }

    /// Get configuration search paths, in order of preference
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("./codeguardian.toml"),
            PathBuf::from("./config/codeguardian.toml"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("codeguardian").join("codeguardian.toml"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".codeguardian.toml"));
        }

        paths
    }
}

/// API keys, read from environment variables only
#[derive(Debug, Default)]
pub struct ApiKeys {
    keys: HashMap<ProviderId, SecretString>,
}

impl ApiKeys {
    /// Environment variables checked for each provider, first match wins
    pub fn env_vars(provider: ProviderId) -> &'static [&'static str] {
        match provider {
            ProviderId::Gemini => &["GEMINI_API_KEY", "GOOGLE_GENAI_API_KEY", "GOOGLE_API_KEY"],
            ProviderId::OpenAI => &["OPENAI_API_KEY"],
            ProviderId::Ollama => &[],
        }
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = HashMap::new();

        for provider in [ProviderId::Gemini, ProviderId::OpenAI, ProviderId::Ollama] {
            let found = Self::env_vars(provider)
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty());

            if let Some(value) = found {
                keys.insert(provider, SecretString::from(value));
            }
        }

        Self { keys }
    }

    pub fn insert(&mut self, provider: ProviderId, key: impl Into<String>) {
        self.keys.insert(provider, SecretString::from(key.into()));
    }

    pub fn contains(&self, provider: ProviderId) -> bool {
        self.keys.contains_key(&provider)
    }

    /// Fresh secret handle for a provider
    pub fn secret(&self, provider: ProviderId) -> Option<SecretString> {
        self.keys
            .get(&provider)
            .map(|key| SecretString::from(key.expose_secret().to_owned()))
    }
}
