//! The retriever: one object owning the published snapshot.
//!
//! Constructed explicitly from a [`CatalogSource`], an
//! [`EmbeddingProvider`] and [`RetrieverSettings`]; nothing is global.
//!
//! # Query path
//!
//! ```text
//! query ─embed─▶ VectorIndex::search ─▶ seeds ─expand─▶ candidates ─rank─▶ top N
//!   │
//!   └─ embedding failed, or no hits while active tables lack vectors
//!        ─▶ every active table as a zero-similarity candidate ─rank─▶ top N
//! ```
//!
//! # Publishing
//!
//! The current snapshot sits behind an `RwLock<Option<Arc<_>>>`. Readers
//! hold the read lock only long enough to clone the `Arc`; a rebuild
//! assembles its snapshot without any lock and takes the write lock only
//! to swap the pointer. A reader therefore sees either the old snapshot or
//! the new one, never a mix.
//!
//! At most one refresh (full or stats-only) runs at a time. A refresh
//! requested while another is running returns immediately with
//! `skipped = true`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};

use tablefinder_core::embedding::{EmbeddingError, EmbeddingProvider};
use tablefinder_core::graph::{CuratedGraph, ExpansionLimits};
use tablefinder_core::models::{Candidate, ScoredCandidate};
use tablefinder_core::scorer::{rank, ScorerWeights};
use tablefinder_core::snapshot::{SchemaSnapshot, SnapshotInfo, SnapshotKind, SnapshotStats};

use crate::builder::{self, BuildSettings};
use crate::catalog::{CatalogError, CatalogSource};
use crate::config::Config;
use crate::context;
use crate::persist;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("query must not be empty")]
    InvalidQuery,

    #[error("no schema snapshot has been built yet")]
    NoSnapshot,

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

impl From<CatalogError> for RetrievalError {
    fn from(e: CatalogError) -> Self {
        RetrievalError::CatalogUnavailable(e.to_string())
    }
}

/// Everything the retriever needs from configuration.
#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    /// Vector hits kept as expansion seeds.
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub weights: ScorerWeights,
    pub expansion: ExpansionLimits,
    pub ttl: Duration,
    pub sample_rows: usize,
    pub concurrency: usize,
    pub embed_timeout: Duration,
    pub snapshot_path: Option<PathBuf>,
    pub curated: Option<Arc<CuratedGraph>>,
    pub notes: BTreeMap<String, String>,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            top_k: 8,
            similarity_threshold: 0.25,
            weights: ScorerWeights::default(),
            expansion: ExpansionLimits::default(),
            ttl: Duration::from_secs(12 * 60 * 60),
            sample_rows: 5,
            concurrency: 4,
            embed_timeout: Duration::from_secs(30),
            snapshot_path: None,
            curated: None,
            notes: BTreeMap::new(),
        }
    }
}

impl RetrieverSettings {
    /// Build settings from a validated config, reading the curated graph
    /// file if one is configured.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let curated = match &config.retrieval.curated_graph {
            Some(path) => {
                let text = std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read curated graph: {}", path.display())
                })?;
                let graph = CuratedGraph::from_json(&text).with_context(|| {
                    format!("Failed to parse curated graph: {}", path.display())
                })?;
                Some(Arc::new(graph))
            }
            None => None,
        };

        Ok(Self {
            top_k: config.retrieval.top_k,
            similarity_threshold: config.retrieval.similarity_threshold,
            weights: config.retrieval.weights(),
            expansion: config.retrieval.expansion_limits(),
            ttl: config.cache.ttl(),
            sample_rows: config.catalog.sample_rows,
            concurrency: config.embedding.concurrency,
            embed_timeout: config.embedding.timeout(),
            snapshot_path: config.cache.snapshot_path.clone(),
            curated,
            notes: config.context.notes.clone(),
        })
    }

    fn build_settings(&self) -> BuildSettings {
        BuildSettings {
            sample_rows: self.sample_rows,
            concurrency: self.concurrency,
            embed_timeout: self.embed_timeout,
            ttl: self.ttl,
            curated: self.curated.clone(),
        }
    }
}

/// Every active table as a zero-similarity seed.
fn fallback_candidates(snapshot: &SchemaSnapshot) -> Vec<Candidate> {
    snapshot
        .active_profiles()
        .map(|p| Candidate::seed(p.name.clone(), 0.0))
        .collect()
}

/// Whether some active table could not be searched by vector.
fn has_unembedded_active(snapshot: &SchemaSnapshot) -> bool {
    snapshot
        .active_profiles()
        .any(|p| p.embedding.vector().is_none())
}

/// Clears the in-flight flag when dropped, including on error or panic.
struct RebuildGuard<'a>(&'a AtomicBool);

impl<'a> RebuildGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RebuildGuard(flag))
    }
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Retriever {
    catalog: Arc<dyn CatalogSource>,
    provider: Arc<dyn EmbeddingProvider>,
    settings: RetrieverSettings,
    current: RwLock<Option<Arc<SchemaSnapshot>>>,
    rebuilding: AtomicBool,
    next_version: AtomicU64,
    next_refresh_at: Mutex<Option<DateTime<Utc>>>,
}

impl Retriever {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        provider: Arc<dyn EmbeddingProvider>,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            catalog,
            provider,
            settings,
            current: RwLock::new(None),
            rebuilding: AtomicBool::new(false),
            next_version: AtomicU64::new(1),
            next_refresh_at: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    /// The published snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<SchemaSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, snapshot: Arc<SchemaSnapshot>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(snapshot);
    }

    /// Rank the tables most relevant to `query`.
    ///
    /// Returns at most `max_results` candidates sorted by `final_score`
    /// descending. When `expand_relations` is set, the strongest vector
    /// hits pull in their related tables.
    pub async fn find_relevant(
        &self,
        query: &str,
        max_results: usize,
        expand_relations: bool,
    ) -> Result<Vec<ScoredCandidate>, RetrievalError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RetrievalError::InvalidQuery);
        }
        let snapshot = self.snapshot().ok_or(RetrievalError::NoSnapshot)?;

        let candidates = match self.embed_query(query, &snapshot).await {
            Ok(vector) => {
                let seeds: Vec<Candidate> = snapshot
                    .index()
                    .search(
                        &vector,
                        self.settings.top_k,
                        true,
                        self.settings.similarity_threshold,
                    )
                    .into_iter()
                    .map(|hit| Candidate::seed(hit.table_name, f64::from(hit.similarity)))
                    .collect();
                if seeds.is_empty() && has_unembedded_active(&snapshot) {
                    tracing::warn!(
                        indexed = snapshot.index().len(),
                        "no vector hits and active tables lack embeddings, ranking by keyword and importance"
                    );
                    fallback_candidates(&snapshot)
                } else if expand_relations {
                    snapshot
                        .graph()
                        .expand(&seeds, &self.settings.expansion, |name| {
                            snapshot.profile(name).is_some_and(|p| p.is_active)
                        })
                } else {
                    seeds
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed, ranking by keyword and importance");
                fallback_candidates(&snapshot)
            }
        };

        let mut ranked = rank(
            &candidates,
            snapshot.profiles(),
            query,
            &self.settings.weights,
        );
        ranked.truncate(max_results);
        tracing::debug!(
            query,
            version = snapshot.version(),
            results = ranked.len(),
            "query answered"
        );
        Ok(ranked)
    }

    async fn embed_query(
        &self,
        query: &str,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let timeout = self.settings.embed_timeout;
        let vector = tokio::time::timeout(timeout, self.provider.embed(query))
            .await
            .map_err(|_| EmbeddingError::Timeout(timeout))??;
        if let Some(dims) = snapshot.index().dims() {
            if vector.len() != dims {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                });
            }
        }
        Ok(vector)
    }

    /// Rebuild and publish a snapshot.
    ///
    /// `full = true` re-describes and re-embeds every active table;
    /// otherwise only row counts and active flags are refreshed on top of
    /// the published snapshot. Either kind is persisted when a snapshot path
    /// is configured. On catalog failure the previous snapshot stays
    /// published.
    pub async fn refresh(&self, full: bool) -> Result<SnapshotStats, RetrievalError> {
        let kind = if full {
            SnapshotKind::Full
        } else {
            SnapshotKind::StatsOnly
        };
        let Some(_guard) = RebuildGuard::acquire(&self.rebuilding) else {
            tracing::info!(?kind, "refresh already running, skipped");
            return Ok(SnapshotStats::skipped(kind));
        };
        let started = Instant::now();

        let stats = if full {
            self.rebuild_full().await?
        } else {
            self.rebuild_stats_only().await?
        };

        let stats = SnapshotStats {
            duration_ms: started.elapsed().as_millis() as u64,
            ..stats
        };
        tracing::info!(
            ?kind,
            version = ?stats.version,
            tables = stats.tables_processed,
            embedded = stats.tables_embedded,
            failures = stats.embedding_failures,
            persisted = stats.persisted,
            duration_ms = stats.duration_ms,
            "snapshot published"
        );
        Ok(stats)
    }

    async fn rebuild_full(&self) -> Result<SnapshotStats, RetrievalError> {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let build = builder::build_full(
            self.catalog.as_ref(),
            Arc::clone(&self.provider),
            &self.settings.build_settings(),
            version,
        )
        .await?;

        let snapshot = Arc::new(build.snapshot);
        self.publish(Arc::clone(&snapshot));
        let persisted = self.persist(&snapshot).await;

        Ok(SnapshotStats {
            kind: SnapshotKind::Full,
            tables_processed: build.tables_processed,
            tables_embedded: build.tables_embedded,
            embedding_failures: build.embedding_failures,
            skipped: false,
            version: Some(version),
            persisted,
            duration_ms: 0,
        })
    }

    async fn rebuild_stats_only(&self) -> Result<SnapshotStats, RetrievalError> {
        let current = self.snapshot().ok_or(RetrievalError::NoSnapshot)?;
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let (snapshot, processed) =
            builder::build_stats_only(self.catalog.as_ref(), &current, version).await?;
        let snapshot = Arc::new(snapshot);
        self.publish(Arc::clone(&snapshot));
        let persisted = self.persist(&snapshot).await;

        Ok(SnapshotStats {
            kind: SnapshotKind::StatsOnly,
            tables_processed: processed,
            tables_embedded: 0,
            embedding_failures: 0,
            skipped: false,
            version: Some(version),
            persisted,
            duration_ms: 0,
        })
    }

    /// Write the published snapshot to the configured path. Failures are
    /// logged; the in-memory snapshot stays published either way.
    async fn persist(&self, snapshot: &SchemaSnapshot) -> bool {
        let Some(path) = &self.settings.snapshot_path else {
            return false;
        };
        match persist::save(path, snapshot, self.provider.dims()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to persist snapshot");
                false
            }
        }
    }

    /// Summary of the published snapshot, or `None` before the first build.
    pub fn snapshot_info(&self) -> Option<SnapshotInfo> {
        let snapshot = self.snapshot()?;
        let mut info = snapshot.info(Utc::now());
        info.next_refresh_at = *self
            .next_refresh_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Some(info)
    }

    /// Record when the background refresher runs next.
    pub fn set_next_refresh_at(&self, at: Option<DateTime<Utc>>) {
        *self
            .next_refresh_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = at;
    }

    /// Schema context text for `names`, for a downstream SQL generator.
    pub fn table_context(&self, names: &[String]) -> Result<String, RetrievalError> {
        let snapshot = self.snapshot().ok_or(RetrievalError::NoSnapshot)?;
        Ok(context::render(&snapshot, names, &self.settings.notes))
    }

    /// Publish the persisted snapshot, if one exists and matches the
    /// configured model. Returns whether a snapshot was loaded; an
    /// unusable file is logged and ignored.
    pub async fn load_persisted(&self) -> bool {
        let Some(path) = &self.settings.snapshot_path else {
            return false;
        };
        let loaded = persist::load(
            path,
            self.provider.model_name(),
            self.provider.dims(),
            self.settings.ttl,
            self.settings.curated.as_deref(),
        )
        .await;

        match loaded {
            Ok(Some(snapshot)) => {
                let version = snapshot.version();
                self.next_version.fetch_max(version + 1, Ordering::SeqCst);
                self.publish(Arc::new(snapshot));
                tracing::info!(path = %path.display(), version, "loaded persisted snapshot");
                true
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "no persisted snapshot");
                false
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring persisted snapshot");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let guard = RebuildGuard::acquire(&flag);
            assert!(guard.is_some());
            assert!(RebuildGuard::acquire(&flag).is_none());
        }
        assert!(!flag.load(Ordering::SeqCst));
        assert!(RebuildGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_settings_from_config() {
        let config = crate::config::parse_config(
            "[catalog]\nkind = \"json\"\npath = \"c.json\"\n[cache]\nttl_secs = 60\n[context.notes]\nSALES = \"n\"\n",
        )
        .unwrap();
        let settings = RetrieverSettings::from_config(&config).unwrap();
        assert_eq!(settings.ttl, Duration::from_secs(60));
        assert_eq!(settings.top_k, 8);
        assert!(settings.curated.is_none());
        assert_eq!(settings.notes.len(), 1);
    }
}
