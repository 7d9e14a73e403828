/// Configuration module for contract-rag.
///
/// Handles loading, validating, and providing default configuration values.
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunker::ChunkMode;
use crate::retriever::{RetrievalStrategy, StrategyKind};
use crate::taxonomy::{self, ClauseSpec};

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./contract_index.db".to_string()
}

fn default_namespace() -> String {
    "legal_contracts".to_string()
}

fn default_chunk_size() -> usize {
    1500
}

fn default_chunk_overlap() -> usize {
    300
}

fn default_top_k() -> usize {
    3
}

fn default_mmr_lambda() -> f32 {
    0.5
}

fn default_fetch_multiplier() -> usize {
    4
}

fn default_rerank_initial_k() -> usize {
    10
}

fn default_min_content_chars() -> usize {
    50
}

fn default_max_context_chars() -> usize {
    12_000
}

fn default_preview_chars() -> usize {
    200
}

fn default_summary_input_chars() -> usize {
    2000
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_dimensions() -> usize {
    768
}

fn default_timeout_secs() -> u64 {
    120
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Index namespace; one contract per namespace at a time.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default = "taxonomy::default_clauses")]
    pub clauses: Vec<ClauseSpec>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub mode: ChunkMode,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub strategy: StrategyKind,

    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,

    /// Diversity-aware retrieval considers `top_k * fetch_multiplier` candidates.
    #[serde(default = "default_fetch_multiplier")]
    pub fetch_multiplier: usize,

    #[serde(default = "default_rerank_initial_k")]
    pub rerank_initial_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractionConfig {
    /// Answers at or below this many characters count as "not found".
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    #[serde(default = "default_summary_input_chars")]
    pub summary_input_chars: usize,

    /// Try three query phrasings per clause instead of one.
    #[serde(default)]
    pub query_variants: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            namespace: default_namespace(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            extraction: ExtractionConfig::default(),
            oracle: OracleConfig::default(),
            clauses: taxonomy::default_clauses(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            mode: ChunkMode::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            strategy: StrategyKind::default(),
            mmr_lambda: default_mmr_lambda(),
            fetch_multiplier: default_fetch_multiplier(),
            rerank_initial_k: default_rerank_initial_k(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_content_chars: default_min_content_chars(),
            max_context_chars: default_max_context_chars(),
            preview_chars: default_preview_chars(),
            summary_input_chars: default_summary_input_chars(),
            query_variants: false,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            dimensions: default_dimensions(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"contract-rag.json"`.
    /// If the file does not exist, returns a default config and generates a
    /// template file for the default path.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "contract-rag.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == "contract-rag.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config =
            serde_json::from_str(&data).with_context(|| format!("invalid JSON in {path}"))?;

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Replace oracle settings from `OLLAMA_*` environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.oracle.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.oracle.model = model;
        }
        if let Some(model) = lookup("OLLAMA_EMBEDDING_MODEL") {
            self.oracle.embedding_model = model;
        }
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunking.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunking.chunk_overlap < self.chunking.chunk_size,
            "chunk_overlap must be smaller than chunk_size"
        );
        anyhow::ensure!(self.retrieval.top_k > 0, "retrieval.top_k must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.retrieval.mmr_lambda),
            "retrieval.mmr_lambda must be within [0, 1]"
        );
        anyhow::ensure!(
            self.extraction.preview_chars > 0,
            "extraction.preview_chars must be positive"
        );
        anyhow::ensure!(!self.namespace.trim().is_empty(), "namespace must be set");
        anyhow::ensure!(
            !self.oracle.base_url.trim().is_empty(),
            "oracle.base_url must be set (or OLLAMA_BASE_URL)"
        );
        anyhow::ensure!(!self.oracle.model.trim().is_empty(), "oracle.model must be set");
        anyhow::ensure!(
            !self.oracle.embedding_model.trim().is_empty(),
            "oracle.embedding_model must be set"
        );
        anyhow::ensure!(
            self.oracle.dimensions > 0,
            "oracle.dimensions must be positive"
        );
        anyhow::ensure!(
            !self.clauses.is_empty(),
            "at least one clause type must be configured"
        );

        let mut seen = HashSet::new();
        for clause in &self.clauses {
            anyhow::ensure!(!clause.name.trim().is_empty(), "clause name must not be empty");
            anyhow::ensure!(
                seen.insert(clause.name.as_str()),
                "duplicate clause type: {}",
                clause.name
            );
        }
        Ok(())
    }

    /// Retrieval strategy for open questions, built from the retrieval section.
    #[must_use]
    pub fn strategy(&self) -> RetrievalStrategy {
        self.retrieval.strategy_for(self.retrieval.strategy)
    }

    #[must_use]
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle.timeout_secs)
    }
}

impl RetrievalConfig {
    /// Materialize a strategy kind with this section's tuning values.
    #[must_use]
    pub fn strategy_for(&self, kind: StrategyKind) -> RetrievalStrategy {
        match kind {
            StrategyKind::Similarity => RetrievalStrategy::Similarity,
            StrategyKind::Diverse => RetrievalStrategy::Diverse {
                fetch_k: self.top_k * self.fetch_multiplier.max(1),
                lambda: self.mmr_lambda,
            },
            StrategyKind::Reranked => RetrievalStrategy::Reranked {
                initial_k: self.rerank_initial_k.max(self.top_k),
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
