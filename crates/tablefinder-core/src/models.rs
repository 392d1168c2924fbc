//! Core data types shared across the retrieval pipeline.
//!
//! Catalog input flows in as [`TableMetadata`] (plus an optional
//! [`SampleRows`]), is turned into an immutable [`TableProfile`] by the
//! snapshot builder, and leaves the engine as a ranked list of
//! [`ScoredCandidate`]s.
//!
//! ```text
//! TableMetadata ──describe+embed──▶ TableProfile ──search/expand/rank──▶ ScoredCandidate
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

fn default_true() -> bool {
    true
}

/// A single column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Database type name, e.g. `"INTEGER"`, `"VARCHAR"`, `"TIMESTAMP"`.
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }
}

/// A foreign key declared on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyMeta {
    /// Local columns, in key order.
    pub columns: Vec<String>,
    pub referenced_table: String,
    /// Referenced columns, in key order. May be empty when the catalog
    /// only reports the target table.
    #[serde(default)]
    pub referenced_columns: Vec<String>,
}

/// An index declared on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// Raw table metadata as supplied by a catalog source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name. Unique within a catalog.
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnMeta>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyMeta>,
    #[serde(default)]
    pub indexes: Vec<IndexMeta>,
    /// `None` when the row count is unknown (not yet counted).
    #[serde(default)]
    pub row_count: Option<u64>,
    /// Catalog hint: `false` for obsolete/system tables.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl TableMetadata {
    /// Create an empty, active table with unknown row count.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            row_count: None,
            is_active: true,
        }
    }

    pub fn with_column(mut self, name: &str, data_type: &str, nullable: bool) -> Self {
        self.columns.push(ColumnMeta::new(name, data_type, nullable));
        self
    }

    pub fn with_primary_key(mut self, column: &str) -> Self {
        self.primary_keys.push(column.to_string());
        self
    }

    pub fn with_foreign_key(mut self, column: &str, table: &str, referenced_column: &str) -> Self {
        self.foreign_keys.push(ForeignKeyMeta {
            columns: vec![column.to_string()],
            referenced_table: table.to_string(),
            referenced_columns: vec![referenced_column.to_string()],
        });
        self
    }

    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = Some(rows);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// A small data sample for one table, used only by the description builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRows {
    /// Column names in row order.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl SampleRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column within each row, if sampled.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Lightweight per-table statistics for the stats-only refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub name: String,
    pub row_count: Option<u64>,
    pub is_active: bool,
}

impl From<&TableMetadata> for TableStats {
    fn from(meta: &TableMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            row_count: meta.row_count,
            is_active: meta.is_active,
        }
    }
}

/// Embedding outcome recorded on a [`TableProfile`].
///
/// There is no zero-vector fallback: a table whose embedding call failed
/// carries [`EmbeddingState::Failed`] and never appears as a vector hit.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingState {
    Embedded(Arc<[f32]>),
    Failed { reason: String },
    /// Not embedded because the table was inactive at build time.
    Skipped,
}

impl EmbeddingState {
    pub fn vector(&self) -> Option<&[f32]> {
        match self {
            EmbeddingState::Embedded(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, EmbeddingState::Failed { .. })
    }
}

/// The per-table record held by a snapshot. Never mutated in place;
/// stats refreshes produce a new profile via [`TableProfile::with_stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableProfile {
    pub name: String,
    /// Text produced by the description builder; the thing that was embedded.
    pub description: String,
    /// SHA-256 of `description`, hex encoded.
    pub content_hash: String,
    pub embedding: EmbeddingState,
    pub row_count: Option<u64>,
    pub column_count: usize,
    pub foreign_key_count: usize,
    pub is_active: bool,
    pub built_at: DateTime<Utc>,
    /// Metadata the profile was built from.
    pub metadata: TableMetadata,
}

impl TableProfile {
    pub fn new(
        metadata: TableMetadata,
        description: String,
        embedding: EmbeddingState,
        is_active: bool,
        built_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: metadata.name.clone(),
            content_hash: content_hash(&description),
            description,
            embedding,
            row_count: metadata.row_count,
            column_count: metadata.columns.len(),
            foreign_key_count: metadata.foreign_keys.len(),
            is_active,
            built_at,
            metadata,
        }
    }

    /// Derived copy carrying fresh row count and active flag. Only the
    /// vector is shared with `self`; everything else is cloned.
    pub fn with_stats(&self, stats: &TableStats) -> Self {
        let mut next = self.clone();
        next.row_count = stats.row_count;
        next.is_active = stats.is_active;
        next.metadata.row_count = stats.row_count;
        next.metadata.is_active = stats.is_active;
        next
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.metadata.column_names()
    }
}

/// Hex-encoded SHA-256 of a description.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A table proposed for ranking, either a direct vector hit (seed) or a
/// table reached through relationship expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub table_name: String,
    /// Similarity for seeds; decayed seed similarity for expanded tables.
    pub semantic_score: f64,
    pub is_expanded: bool,
    /// Seed through which an expanded table was reached.
    pub origin_table: Option<String>,
}

impl Candidate {
    pub fn seed(table_name: impl Into<String>, semantic_score: f64) -> Self {
        Self {
            table_name: table_name.into(),
            semantic_score,
            is_expanded: false,
            origin_table: None,
        }
    }
}

/// A ranked table returned by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub table_name: String,
    pub semantic_score: f64,
    pub importance_score: f64,
    pub keyword_score: f64,
    /// Weighted sum of the three scores, clamped to `[0, 1]`.
    pub final_score: f64,
    pub is_expanded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_table: Option<String>,
}
