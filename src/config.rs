//! TOML configuration.
//!
//! Every setting is explicit and loaded once at startup by [`load_config`];
//! nothing is read from globals afterwards.
//!
//! ```toml
//! [catalog]
//! kind = "sqlite"
//! path = "./data/erp.sqlite"
//!
//! [retrieval]
//! top_k = 8
//! similarity_threshold = 0.25
//!
//! [cache]
//! snapshot_path = "./data/snapshot.json"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tablefinder_core::graph::ExpansionLimits;
use tablefinder_core::scorer::ScorerWeights;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// A JSON dump of table metadata (see `catalog::JsonCatalog`).
    Json,
    /// A SQLite database introspected through `PRAGMA`s.
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub kind: CatalogKind,
    pub path: PathBuf,
    /// Rows sampled per table for descriptions; `0` disables sampling.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

fn default_sample_rows() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_weight_semantic")]
    pub weight_semantic: f64,
    #[serde(default = "default_weight_importance")]
    pub weight_importance: f64,
    #[serde(default = "default_weight_keyword")]
    pub weight_keyword: f64,
    #[serde(default = "default_max_related_per_seed")]
    pub max_related_per_seed: usize,
    #[serde(default = "default_max_total_candidates")]
    pub max_total_candidates: usize,
    #[serde(default = "default_expansion_seeds")]
    pub expansion_seeds: usize,
    /// Optional `{"graph": {...}}` file of hand-maintained relationships.
    #[serde(default)]
    pub curated_graph: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            weight_semantic: default_weight_semantic(),
            weight_importance: default_weight_importance(),
            weight_keyword: default_weight_keyword(),
            max_related_per_seed: default_max_related_per_seed(),
            max_total_candidates: default_max_total_candidates(),
            expansion_seeds: default_expansion_seeds(),
            curated_graph: None,
        }
    }
}

fn default_top_k() -> usize {
    8
}
fn default_similarity_threshold() -> f32 {
    0.25
}
fn default_weight_semantic() -> f64 {
    ScorerWeights::default().semantic
}
fn default_weight_importance() -> f64 {
    ScorerWeights::default().importance
}
fn default_weight_keyword() -> f64 {
    ScorerWeights::default().keyword
}
fn default_max_related_per_seed() -> usize {
    3
}
fn default_max_total_candidates() -> usize {
    12
}
fn default_expansion_seeds() -> usize {
    3
}

impl RetrievalConfig {
    pub fn weights(&self) -> ScorerWeights {
        ScorerWeights {
            semantic: self.weight_semantic,
            importance: self.weight_importance,
            keyword: self.weight_keyword,
        }
    }

    pub fn expansion_limits(&self) -> ExpansionLimits {
        ExpansionLimits {
            max_related_per_seed: self.max_related_per_seed,
            max_total: self.max_total_candidates,
            seed_count: self.expansion_seeds,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Age after which a snapshot reports itself stale.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Interval of the background stats-only refresh; `0` disables it.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Where snapshots are persisted; unset keeps them in memory only.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            snapshot_path: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    12 * 60 * 60
}
fn default_refresh_interval_secs() -> u64 {
    12 * 60 * 60
}
fn default_shutdown_timeout_secs() -> u64 {
    5
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Embedding calls in flight at once during a full rebuild.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            concurrency: 4,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_concurrency() -> usize {
    4
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// Business notes appended to table context, keyed by table name.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ContextConfig {
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content).with_context(|| "Failed to parse config file")?;

    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    let r = &config.retrieval;
    if r.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(-1.0..=1.0).contains(&r.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
    }
    r.weights()
        .validate()
        .map_err(|e| anyhow::anyhow!("retrieval weights: {}", e))?;
    if r.max_total_candidates < 1 {
        anyhow::bail!("retrieval.max_total_candidates must be >= 1");
    }

    // Validate cache
    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }

    // Validate embedding
    let e = &config.embedding;
    if e.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if e.concurrency == 0 {
        anyhow::bail!("embedding.concurrency must be > 0");
    }
    match e.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if e.dims.is_none() || e.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 when provider is '{}'", e.provider);
            }
            if e.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    e.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}
