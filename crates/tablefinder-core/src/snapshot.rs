//! Immutable, versioned schema snapshots.
//!
//! A [`SchemaSnapshot`] bundles every table profile with the vector index
//! and relationship graph built from them. It is assembled completely
//! before anyone can see it and never changes afterwards; the retriever
//! publishes new snapshots by swapping an `Arc`.
//!
//! ```text
//! Building ──assemble──▶ Published ──age > ttl──▶ Stale (still served)
//!                            │
//!                            └──with_stats──▶ Published (derived, same vectors)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::RelationshipGraph;
use crate::index::{IndexMetadata, VectorIndex};
use crate::models::{TableProfile, TableStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Descriptions and embeddings rebuilt from the catalog.
    Full,
    /// Row counts and active flags refreshed on top of a full snapshot.
    StatsOnly,
}

#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    version: u64,
    kind: SnapshotKind,
    created_at: DateTime<Utc>,
    ttl: Duration,
    model: String,
    profiles: BTreeMap<String, TableProfile>,
    index: VectorIndex,
    graph: Arc<RelationshipGraph>,
}

impl SchemaSnapshot {
    /// Assemble a full snapshot. Every embedded profile is indexed, with
    /// its active flag as index metadata.
    pub fn assemble(
        version: u64,
        model: &str,
        profiles: Vec<TableProfile>,
        graph: RelationshipGraph,
        ttl: Duration,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut index = VectorIndex::new();
        let mut by_name = BTreeMap::new();
        for profile in profiles {
            if let Some(vector) = profile.embedding.vector() {
                index.upsert(
                    &profile.name,
                    vector,
                    IndexMetadata {
                        is_active: profile.is_active,
                    },
                );
            }
            by_name.insert(profile.name.clone(), profile);
        }
        Self {
            version,
            kind: SnapshotKind::Full,
            created_at,
            ttl,
            model: model.to_string(),
            profiles: by_name,
            index,
            graph: Arc::new(graph),
        }
    }

    /// Derive a stats-only snapshot.
    ///
    /// Profiles named in `stats` take the fresh row count and active flag;
    /// profiles missing from `stats` are marked inactive. Tables in `stats`
    /// without a profile are ignored until the next full rebuild. Vectors
    /// and the graph are shared with `self`; profiles are cloned.
    pub fn with_stats(&self, stats: &[TableStats], version: u64, created_at: DateTime<Utc>) -> Self {
        let fresh: BTreeMap<&str, &TableStats> =
            stats.iter().map(|s| (s.name.as_str(), s)).collect();
        let mut index = self.index.clone();
        let mut profiles = BTreeMap::new();

        for (name, profile) in &self.profiles {
            let next = match fresh.get(name.as_str()) {
                Some(s) => profile.with_stats(s),
                None => profile.with_stats(&TableStats {
                    name: name.clone(),
                    row_count: profile.row_count,
                    is_active: false,
                }),
            };
            index.set_metadata(
                name,
                IndexMetadata {
                    is_active: next.is_active,
                },
            );
            profiles.insert(name.clone(), next);
        }

        Self {
            version,
            kind: SnapshotKind::StatsOnly,
            created_at,
            ttl: self.ttl,
            model: self.model.clone(),
            profiles,
            index,
            graph: Arc::clone(&self.graph),
        }
    }

    /// The same snapshot recorded as `kind`, for snapshots read back from
    /// storage.
    pub fn with_kind(mut self, kind: SnapshotKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Embedding model the vectors were produced with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn profiles(&self) -> &BTreeMap<String, TableProfile> {
        &self.profiles
    }

    pub fn profile(&self, name: &str) -> Option<&TableProfile> {
        self.profiles.get(name)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn active_profiles(&self) -> impl Iterator<Item = &TableProfile> {
        self.profiles.values().filter(|p| p.is_active)
    }

    /// Time since creation; zero if `now` precedes `created_at`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.age(now) > self.ttl
    }

    pub fn info(&self, now: DateTime<Utc>) -> SnapshotInfo {
        let profiles = self.profiles.values();
        SnapshotInfo {
            version: self.version,
            kind: self.kind,
            created_at: self.created_at,
            age_secs: self.age(now).as_secs(),
            is_stale: self.is_stale(now),
            table_count: self.profiles.len(),
            active_count: self.active_profiles().count(),
            embedded_count: self.index.len(),
            embedding_failures: profiles
                .clone()
                .filter(|p| p.embedding.is_failed())
                .count(),
            total_rows: profiles.clone().filter_map(|p| p.row_count).sum(),
            tables_with_data: profiles
                .clone()
                .filter(|p| p.row_count.is_some_and(|r| r > 0))
                .count(),
            tables_with_foreign_keys: profiles.filter(|p| p.foreign_key_count > 0).count(),
            next_refresh_at: None,
        }
    }
}

/// Summary of the published snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotInfo {
    pub version: u64,
    pub kind: SnapshotKind,
    pub created_at: DateTime<Utc>,
    pub age_secs: u64,
    pub is_stale: bool,
    pub table_count: usize,
    pub active_count: usize,
    pub embedded_count: usize,
    pub embedding_failures: usize,
    pub total_rows: u64,
    pub tables_with_data: usize,
    pub tables_with_foreign_keys: usize,
    /// When the background refresher next runs, if one is scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_refresh_at: Option<DateTime<Utc>>,
}

/// Outcome of a refresh request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotStats {
    pub kind: SnapshotKind,
    pub tables_processed: usize,
    pub tables_embedded: usize,
    pub embedding_failures: usize,
    /// `true` when another refresh was in flight and this one did nothing.
    pub skipped: bool,
    /// Version published by this refresh; `None` when skipped.
    pub version: Option<u64>,
    /// Whether the snapshot file was written.
    pub persisted: bool,
    pub duration_ms: u64,
}

impl SnapshotStats {
    pub fn skipped(kind: SnapshotKind) -> Self {
        Self {
            kind,
            tables_processed: 0,
            tables_embedded: 0,
            embedding_failures: 0,
            skipped: true,
            version: None,
            persisted: false,
            duration_ms: 0,
        }
    }
}
