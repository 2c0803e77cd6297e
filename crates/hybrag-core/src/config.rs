//! Project configuration at `<root>/.hybrag/config.toml`.
//!
//! A missing file means defaults. Every section and key is optional, so a
//! config only has to mention what it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::retriever::{DEFAULT_POOL_MULTIPLIER, DegradePolicy};
use crate::strategy::Strategy;
use crate::weights::WeightConfig;

/// Directory (relative to the project root) holding config and database.
pub const HYBRAG_DIR: &str = ".hybrag";
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding `retrieval.default_top_k`.
pub const ENV_TOP_K: &str = "HYBRAG_TOP_K";
/// Environment variable overriding `retrieval.strategy`.
pub const ENV_STRATEGY: &str = "HYBRAG_STRATEGY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Hybrid calls ask each source for `top_k * pool_multiplier` candidates.
    #[serde(default = "default_pool_multiplier")]
    pub pool_multiplier: usize,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub degrade: DegradePolicy,
    #[serde(default)]
    pub weights: WeightConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            pool_multiplier: default_pool_multiplier(),
            strategy: Strategy::default(),
            degrade: DegradePolicy::default(),
            weights: WeightConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Name of the environment variable holding the API key. When unset or
    /// empty, embeddings fall back to the deterministic hash embedder.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl EmbeddingConfig {
    /// The API key, if the configured variable is set and non-empty.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Upper bound on assembled context, in characters.
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            max_context_length: default_max_context_length(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database path, relative to the project root unless absolute.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn resolve(&self, project_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            project_root.join(&self.path)
        }
    }
}

impl ProjectConfig {
    /// Reject values that cannot produce a working retriever.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, naming the offending key.
    pub fn validate(&self) -> Result<()> {
        self.retrieval
            .weights
            .validate()
            .context("invalid [retrieval.weights]")?;

        if self.retrieval.default_top_k == 0 {
            anyhow::bail!("retrieval.default_top_k must be at least 1");
        }
        if self.retrieval.pool_multiplier == 0 {
            anyhow::bail!("retrieval.pool_multiplier must be at least 1");
        }
        if self.embeddings.dimension == 0 {
            anyhow::bail!("embeddings.dimension must be at least 1");
        }
        if self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.batch_size must be at least 1");
        }
        if self.llm.max_context_length == 0 {
            anyhow::bail!("llm.max_context_length must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            );
        }
        Ok(())
    }

    /// Apply `HYBRAG_TOP_K` / `HYBRAG_STRATEGY` style overrides read through
    /// `lookup`.
    ///
    /// # Errors
    ///
    /// Fails if an override is set but does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TOP_K) {
            self.retrieval.default_top_k = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TOP_K}={raw} is not a positive integer"))?;
        }
        if let Some(raw) = lookup(ENV_STRATEGY) {
            self.retrieval.strategy = raw
                .parse()
                .with_context(|| format!("{ENV_STRATEGY}={raw} is not a strategy"))?;
        }
        Ok(())
    }
}

#[must_use]
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(HYBRAG_DIR).join(CONFIG_FILE)
}

/// Read the project config file, or defaults when it does not exist.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the project config, apply environment overrides, and validate.
///
/// # Errors
///
/// Fails on unreadable or invalid config, or a malformed override.
pub fn load_effective_config(project_root: &Path) -> Result<ProjectConfig> {
    let mut config = load_project_config(project_root)?;
    config.apply_overrides(|key| env::var(key).ok())?;
    config
        .validate()
        .with_context(|| format!("Invalid config in {}", config_path(project_root).display()))?;
    Ok(config)
}

/// Write `config` to `<root>/.hybrag/config.toml`, creating the directory.
///
/// # Errors
///
/// Fails on serialization or I/O errors.
pub fn save_project_config(project_root: &Path, config: &ProjectConfig) -> Result<PathBuf> {
    let path = config_path(project_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

const fn default_top_k() -> usize {
    5
}

const fn default_pool_multiplier() -> usize {
    DEFAULT_POOL_MULTIPLIER
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

const fn default_embedding_dimension() -> usize {
    1536
}

const fn default_batch_size() -> usize {
    100
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_max_context_length() -> usize {
    4000
}

const fn default_temperature() -> f64 {
    0.7
}

const fn default_max_tokens() -> u32 {
    500
}

fn default_store_path() -> PathBuf {
    PathBuf::from(HYBRAG_DIR).join("hybrag.db")
}
