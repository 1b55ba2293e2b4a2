//! Configuration management for LexForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Rerank engine configuration
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Evidence grouping caps
    #[serde(default)]
    pub evidence: EvidenceCaps,

    /// Keyword recall evaluator configuration
    #[serde(default)]
    pub recall: RecallConfig,
}

/// Rerank engine and oracle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankConfig {
    /// Rerank strategy: none, llm, cross_encoder
    #[serde(default = "default_rerank_strategy")]
    pub strategy: String,

    /// Model identifier passed to the oracle (strategy default when unset)
    pub model: Option<String>,

    /// Oracle endpoint URL (required for llm / cross_encoder)
    pub endpoint: Option<String>,

    /// API key for the oracle endpoint
    pub api_key: Option<String>,

    /// Oracle round-trip timeout in milliseconds
    #[serde(default = "default_rerank_timeout_ms")]
    pub timeout_ms: u64,

    /// Number of candidates kept after reranking
    #[serde(default = "default_rerank_top_k")]
    pub top_k: usize,
}

impl RerankConfig {
    /// Oracle round-trip timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            strategy: default_rerank_strategy(),
            model: None,
            endpoint: None,
            api_key: None,
            timeout_ms: default_rerank_timeout_ms(),
            top_k: default_rerank_top_k(),
        }
    }
}

/// Caps applied when grouping evidence hits for presentation
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct EvidenceCaps {
    /// Distinct documents admitted, in first-seen order
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,

    /// Nodes admitted per (source, document) pair across all pages
    #[serde(default = "default_max_nodes_per_document")]
    pub max_nodes_per_document: usize,

    /// Distinct page buckets opened per (source, document) pair
    #[serde(default = "default_max_pages_per_document")]
    pub max_pages_per_document: usize,
}

impl Default for EvidenceCaps {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
            max_nodes_per_document: default_max_nodes_per_document(),
            max_pages_per_document: default_max_pages_per_document(),
        }
    }
}

/// Keyword recall evaluator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecallConfig {
    /// Top-k the keyword retrieval stage was run with (capped-recall detection)
    #[serde(default = "default_keyword_top_k")]
    pub keyword_top_k: usize,

    /// Maximum entries in missing/extra sample previews
    #[serde(default = "default_sample_n")]
    pub sample_n: usize,

    /// Whether the ground-truth substring scan is case sensitive
    #[serde(default)]
    pub case_sensitive: bool,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            keyword_top_k: default_keyword_top_k(),
            sample_n: default_sample_n(),
            case_sensitive: false,
        }
    }
}

fn default_rerank_strategy() -> String {
    "none".to_string()
}

fn default_rerank_timeout_ms() -> u64 {
    10_000
}

fn default_rerank_top_k() -> usize {
    10
}

fn default_max_documents() -> usize {
    4
}

fn default_max_nodes_per_document() -> usize {
    8
}

fn default_max_pages_per_document() -> usize {
    4
}

fn default_keyword_top_k() -> usize {
    200
}

fn default_sample_n() -> usize {
    20
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with config file if it exists
            .add_source(File::with_name("config").required(false))
            // Override with environment variables (APP__RERANK__STRATEGY etc.)
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
