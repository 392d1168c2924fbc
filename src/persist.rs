//! Snapshot persistence.
//!
//! The published snapshot is written to a single JSON file after every
//! refresh, full or stats-only, so the next process can start warm without
//! touching the catalog or the embedding provider:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "version": 7,
//!   "kind": "stats_only",
//!   "created_at": "2026-01-01T00:00:00Z",
//!   "model": "text-embedding-3-small",
//!   "dims": 1536,
//!   "tables": {
//!     "SALES": {
//!       "vector": "<base64 little-endian f32>",
//!       "description": "...",
//!       "content_hash": "<sha256 of description>",
//!       "is_active": true,
//!       "built_at": "2026-01-01T00:00:00Z",
//!       "metadata": { "name": "SALES", "columns": [] }
//!     }
//!   }
//! }
//! ```
//!
//! Writes go to a sibling temp file that is renamed over the target, so a
//! reader never sees a half-written file. On load, a file is rejected as a
//! whole if its format version, model, or dimensionality differs from the
//! running configuration, or if any table record is inconsistent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tablefinder_core::embedding::{blob_to_vec, vec_to_blob};
use tablefinder_core::graph::{CuratedGraph, RelationshipGraph};
use tablefinder_core::models::{content_hash, EmbeddingState, TableMetadata, TableProfile};
use tablefinder_core::snapshot::{SchemaSnapshot, SnapshotKind};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("snapshot file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot format version {0}")]
    UnsupportedFormat(u32),

    #[error("snapshot was built with model '{found}', expected '{expected}'")]
    ModelMismatch { expected: String, found: String },

    #[error("snapshot has {found} dimensions, expected {expected}")]
    DimsMismatch { expected: usize, found: usize },

    #[error("corrupt record for table {table}: {reason}")]
    Corrupt { table: String, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    version: u64,
    #[serde(default = "default_kind")]
    kind: SnapshotKind,
    created_at: DateTime<Utc>,
    model: String,
    dims: usize,
    tables: BTreeMap<String, TableRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding_error: Option<String>,
    description: String,
    content_hash: String,
    is_active: bool,
    built_at: DateTime<Utc>,
    metadata: TableMetadata,
}

impl TableRecord {
    fn from_profile(profile: &TableProfile) -> Self {
        let (vector, embedding_error) = match &profile.embedding {
            EmbeddingState::Embedded(v) => (Some(STANDARD.encode(vec_to_blob(v))), None),
            EmbeddingState::Failed { reason } => (None, Some(reason.clone())),
            EmbeddingState::Skipped => (None, None),
        };
        Self {
            vector,
            embedding_error,
            description: profile.description.clone(),
            content_hash: profile.content_hash.clone(),
            is_active: profile.is_active,
            built_at: profile.built_at,
            metadata: profile.metadata.clone(),
        }
    }

    fn into_profile(self, name: &str, dims: usize) -> Result<TableProfile, PersistenceError> {
        let corrupt = |reason: String| PersistenceError::Corrupt {
            table: name.to_string(),
            reason,
        };

        if self.metadata.name != name {
            return Err(corrupt(format!("metadata names {}", self.metadata.name)));
        }
        if content_hash(&self.description) != self.content_hash {
            return Err(corrupt("content hash mismatch".to_string()));
        }

        let embedding = match (self.vector, self.embedding_error) {
            (Some(encoded), _) => {
                let bytes = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| corrupt(format!("bad vector encoding: {}", e)))?;
                let vector = blob_to_vec(&bytes);
                if vector.len() != dims || bytes.len() != dims * 4 {
                    return Err(corrupt(format!(
                        "vector has {} dimensions, expected {}",
                        vector.len(),
                        dims
                    )));
                }
                EmbeddingState::Embedded(Arc::from(vector))
            }
            (None, Some(reason)) => EmbeddingState::Failed { reason },
            (None, None) => EmbeddingState::Skipped,
        };

        Ok(TableProfile::new(
            self.metadata,
            self.description,
            embedding,
            self.is_active,
            self.built_at,
        ))
    }
}

fn default_kind() -> SnapshotKind {
    SnapshotKind::Full
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `snapshot` to `path`, replacing any previous file.
pub async fn save(path: &Path, snapshot: &SchemaSnapshot, dims: usize) -> Result<(), PersistenceError> {
    let file = SnapshotFile {
        format_version: FORMAT_VERSION,
        version: snapshot.version(),
        kind: snapshot.kind(),
        created_at: snapshot.created_at(),
        model: snapshot.model().to_string(),
        dims,
        tables: snapshot
            .profiles()
            .iter()
            .map(|(name, profile)| (name.clone(), TableRecord::from_profile(profile)))
            .collect(),
    };
    let bytes = serde_json::to_vec(&file)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;

    tracing::debug!(path = %path.display(), version = snapshot.version(), bytes = bytes.len(), "snapshot saved");
    Ok(())
}

/// Load a snapshot written by [`save`].
///
/// Returns `Ok(None)` when no file exists. The relationship graph is
/// rebuilt from the stored metadata, merged with `curated`.
pub async fn load(
    path: &Path,
    model: &str,
    dims: usize,
    ttl: Duration,
    curated: Option<&CuratedGraph>,
) -> Result<Option<SchemaSnapshot>, PersistenceError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let file: SnapshotFile = serde_json::from_slice(&bytes)?;

    if file.format_version != FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedFormat(file.format_version));
    }
    if file.model != model {
        return Err(PersistenceError::ModelMismatch {
            expected: model.to_string(),
            found: file.model,
        });
    }
    if file.dims != dims {
        return Err(PersistenceError::DimsMismatch {
            expected: dims,
            found: file.dims,
        });
    }

    let mut profiles = Vec::with_capacity(file.tables.len());
    for (name, record) in file.tables {
        profiles.push(record.into_profile(&name, dims)?);
    }
    let metadata: Vec<TableMetadata> = profiles.iter().map(|p| p.metadata.clone()).collect();
    let graph = RelationshipGraph::build(&metadata, curated);

    Ok(Some(
        SchemaSnapshot::assemble(
            file.version,
            &file.model,
            profiles,
            graph,
            ttl,
            file.created_at,
        )
        .with_kind(file.kind),
    ))
}
