//! Snapshot construction: full rebuilds and stats-only refreshes.
//!
//! A full rebuild runs the whole pipeline off to the side and returns a
//! finished [`SchemaSnapshot`]; nothing is published from here.
//!
//! ```text
//! get_tables ─▶ activity check ─▶ sample + describe ─▶ embed (bounded, prioritised)
//!                                                            │
//!                        RelationshipGraph::build ◀──────────┘
//!                                  │
//!                                  ▼
//!                        SchemaSnapshot::assemble
//! ```
//!
//! # Embedding
//!
//! Active tables are embedded in priority order (most connected and
//! largest first), in batches of the provider's `max_batch_size()`. At most
//! `concurrency` batches are in flight, each under `embed_timeout`. A batch
//! that fails is retried one table at a time, so one bad description
//! costs one table, not the batch. Tables that still fail are recorded as
//! [`EmbeddingState::Failed`]; inactive tables are [`EmbeddingState::Skipped`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use tablefinder_core::description::{describe, MAX_SAMPLE_ROWS};
use tablefinder_core::embedding::{check_response, l2_normalize, EmbeddingError, EmbeddingProvider};
use tablefinder_core::graph::{CuratedGraph, RelationshipGraph};
use tablefinder_core::models::{EmbeddingState, TableMetadata, TableProfile, TableStats};
use tablefinder_core::snapshot::SchemaSnapshot;

use crate::catalog::{CatalogError, CatalogSource};

/// Inputs to a rebuild that come from configuration.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Rows sampled per active table; `0` disables sampling.
    pub sample_rows: usize,
    pub concurrency: usize,
    pub embed_timeout: Duration,
    pub ttl: Duration,
    pub curated: Option<Arc<CuratedGraph>>,
}

/// A finished full rebuild, not yet published.
#[derive(Debug)]
pub struct FullBuild {
    pub snapshot: SchemaSnapshot,
    pub tables_processed: usize,
    pub tables_embedded: usize,
    pub embedding_failures: usize,
}

/// Activity score of a table. Row volume is capped so a huge log table
/// cannot outweigh connectivity.
pub fn activity_score(meta: &TableMetadata) -> u64 {
    let volume = meta.row_count.map(|r| (r / 1000).min(100)).unwrap_or(0);
    volume
        + 10 * meta.foreign_keys.len() as u64
        + if meta.is_active { 20 } else { 0 }
        + 2 * meta.columns.len() as u64
        + if meta.primary_keys.is_empty() { 0 } else { 15 }
}

/// A table is active when the catalog hint allows it and its activity
/// score exceeds 10.
pub fn is_active(meta: &TableMetadata) -> bool {
    meta.is_active && activity_score(meta) > 10
}

/// Embedding order key; higher embeds first. Tables with an unknown row
/// count get a bonus so they are not starved behind counted ones.
pub fn embedding_priority(meta: &TableMetadata) -> u64 {
    let volume = match meta.row_count {
        Some(rows) => (rows / 1000).min(50),
        None => 10,
    };
    15 * meta.foreign_keys.len() as u64 + 2 * meta.columns.len() as u64 + volume
}

/// Run a full rebuild against the catalog.
///
/// Fails only when the catalog cannot list its tables. Sampling errors
/// drop the sample segment of one description; embedding errors mark one
/// table as failed.
pub async fn build_full(
    catalog: &dyn CatalogSource,
    provider: Arc<dyn EmbeddingProvider>,
    settings: &BuildSettings,
    version: u64,
) -> Result<FullBuild, CatalogError> {
    let mut seen = BTreeSet::new();
    let tables: Vec<TableMetadata> = catalog
        .get_tables()
        .await?
        .into_iter()
        .filter(|t| seen.insert(t.name.clone()))
        .collect();
    tracing::info!(tables = tables.len(), version, "full rebuild started");

    let mut descriptions = Vec::with_capacity(tables.len());
    for meta in &tables {
        let active = is_active(meta);
        let sample = if active && settings.sample_rows > 0 {
            let n = settings.sample_rows.min(MAX_SAMPLE_ROWS);
            match catalog.sample_rows(&meta.name, n).await {
                Ok(sample) => Some(sample),
                Err(e) => {
                    tracing::debug!(table = %meta.name, error = %e, "sampling failed");
                    None
                }
            }
        } else {
            None
        };
        descriptions.push((active, describe(meta, sample.as_ref())));
    }

    let mut queue: Vec<(u64, &str, &str)> = tables
        .iter()
        .zip(&descriptions)
        .filter(|(_, (active, _))| *active)
        .map(|(meta, (_, text))| (embedding_priority(meta), meta.name.as_str(), text.as_str()))
        .collect();
    queue.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    let ordered: Vec<(String, String)> = queue
        .into_iter()
        .map(|(_, name, text)| (name.to_string(), text.to_string()))
        .collect();

    let mut states = embed_all(provider.clone(), ordered, settings).await;

    let now = Utc::now();
    let mut embedded = 0;
    let mut failures = 0;
    let mut profiles = Vec::with_capacity(tables.len());
    for (meta, (active, description)) in tables.iter().zip(descriptions) {
        let state = if active {
            states
                .remove(&meta.name)
                .unwrap_or_else(|| EmbeddingState::Failed {
                    reason: "embedding task did not complete".to_string(),
                })
        } else {
            EmbeddingState::Skipped
        };
        match &state {
            EmbeddingState::Embedded(_) => embedded += 1,
            EmbeddingState::Failed { reason } => {
                failures += 1;
                tracing::warn!(table = %meta.name, %reason, "table not embedded");
            }
            EmbeddingState::Skipped => {}
        }
        profiles.push(TableProfile::new(meta.clone(), description, state, active, now));
    }

    let graph = RelationshipGraph::build(&tables, settings.curated.as_deref());
    let snapshot = SchemaSnapshot::assemble(
        version,
        provider.model_name(),
        profiles,
        graph,
        settings.ttl,
        now,
    );

    tracing::info!(
        version,
        tables = tables.len(),
        embedded,
        failures,
        "full rebuild assembled"
    );

    Ok(FullBuild {
        snapshot,
        tables_processed: tables.len(),
        tables_embedded: embedded,
        embedding_failures: failures,
    })
}

/// Derive a stats-only snapshot from `current` using fresh catalog stats.
///
/// The activity check is re-run against each profile's stored metadata
/// with the new row count and hint.
pub async fn build_stats_only(
    catalog: &dyn CatalogSource,
    current: &SchemaSnapshot,
    version: u64,
) -> Result<(SchemaSnapshot, usize), CatalogError> {
    let stats = catalog.table_stats().await?;
    let adjusted: Vec<TableStats> = stats
        .into_iter()
        .map(|s| match current.profile(&s.name) {
            Some(profile) => {
                let mut meta = profile.metadata.clone();
                meta.row_count = s.row_count;
                meta.is_active = s.is_active;
                TableStats {
                    is_active: is_active(&meta),
                    ..s
                }
            }
            None => s,
        })
        .collect();

    let processed = adjusted
        .iter()
        .filter(|s| current.profile(&s.name).is_some())
        .count();
    let snapshot = current.with_stats(&adjusted, version, Utc::now());
    tracing::info!(version, tables = processed, "stats-only snapshot assembled");
    Ok((snapshot, processed))
}

async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    timeout: Duration,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let vectors = tokio::time::timeout(timeout, provider.embed_batch(texts))
        .await
        .map_err(|_| EmbeddingError::Timeout(timeout))??;
    check_response(&vectors, texts.len(), provider.dims())?;
    Ok(vectors)
}

fn to_state(vector: Vec<f32>) -> EmbeddingState {
    // A zero vector has no direction and could never be searched.
    if l2_normalize(&vector).is_none() {
        return EmbeddingState::Failed {
            reason: "provider returned a zero vector".to_string(),
        };
    }
    EmbeddingState::Embedded(Arc::from(vector))
}

/// Embed one batch, falling back to one call per table if the batch fails.
async fn embed_chunk(
    provider: Arc<dyn EmbeddingProvider>,
    chunk: Vec<(String, String)>,
    timeout: Duration,
) -> Vec<(String, EmbeddingState)> {
    let texts: Vec<String> = chunk.iter().map(|(_, text)| text.clone()).collect();
    match embed_with_timeout(provider.as_ref(), &texts, timeout).await {
        Ok(vectors) => {
            return chunk
                .into_iter()
                .zip(vectors)
                .map(|((name, _), v)| (name, to_state(v)))
                .collect();
        }
        Err(e) if chunk.len() > 1 => {
            tracing::debug!(batch = chunk.len(), error = %e, "batch failed, embedding per table");
        }
        Err(e) => {
            return chunk
                .into_iter()
                .map(|(name, _)| {
                    (
                        name,
                        EmbeddingState::Failed {
                            reason: e.to_string(),
                        },
                    )
                })
                .collect();
        }
    }

    let mut out = Vec::with_capacity(chunk.len());
    for (name, text) in chunk {
        let state = match embed_with_timeout(provider.as_ref(), &[text], timeout).await {
            Ok(mut vectors) => match vectors.pop() {
                Some(v) => to_state(v),
                None => EmbeddingState::Failed {
                    reason: "empty embedding response".to_string(),
                },
            },
            Err(e) => EmbeddingState::Failed {
                reason: e.to_string(),
            },
        };
        out.push((name, state));
    }
    out
}

async fn embed_all(
    provider: Arc<dyn EmbeddingProvider>,
    ordered: Vec<(String, String)>,
    settings: &BuildSettings,
) -> BTreeMap<String, EmbeddingState> {
    let batch_size = provider.max_batch_size().max(1);
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    let mut items = ordered.into_iter().peekable();
    while items.peek().is_some() {
        let chunk: Vec<(String, String)> = items.by_ref().take(batch_size).collect();
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        let timeout = settings.embed_timeout;
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            embed_chunk(provider, chunk, timeout).await
        });
    }

    let mut states = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(results) => states.extend(results),
            // Tables of a panicked task stay absent and are marked failed
            // by the caller.
            Err(e) => tracing::error!(error = %e, "embedding task panicked"),
        }
    }
    states
}
