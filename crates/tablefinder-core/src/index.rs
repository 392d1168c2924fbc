//! In-memory cosine-similarity index over table vectors.
//!
//! Vectors are L2-normalised once on insert, so a search is a dot product
//! per entry. Entries are kept in a `BTreeMap` keyed by table name, which
//! gives the ascending-name tie-break for free when scores are equal.
//!
//! The index is cheap to clone: vectors are shared behind `Arc`, so a
//! stats-only refresh can derive a new index that only flips metadata.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::embedding::{dot, l2_normalize};

/// Per-entry metadata consulted by filtered searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMetadata {
    pub is_active: bool,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    vector: Arc<[f32]>,
    meta: IndexMetadata,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub table_name: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: BTreeMap<String, IndexEntry>,
    dims: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality of stored vectors, once the first one is inserted.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert or replace the vector for `name`.
    ///
    /// Returns `false` (and stores nothing) when the vector cannot be
    /// normalised or its length differs from vectors already indexed.
    pub fn upsert(&mut self, name: &str, vector: &[f32], meta: IndexMetadata) -> bool {
        if self.dims.is_some_and(|dims| dims != vector.len()) {
            return false;
        }
        let Some(normalized) = l2_normalize(vector) else {
            return false;
        };
        self.dims = Some(normalized.len());
        self.entries.insert(
            name.to_string(),
            IndexEntry {
                vector: Arc::from(normalized),
                meta,
            },
        );
        true
    }

    /// Replace metadata for an existing entry without touching its vector.
    pub fn set_metadata(&mut self, name: &str, meta: IndexMetadata) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.meta = meta;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.entries.remove(name).is_some();
        if self.entries.is_empty() {
            self.dims = None;
        }
        removed
    }

    /// Top-`top_k` entries by cosine similarity to `query`, keeping only
    /// hits with `similarity >= threshold`.
    ///
    /// Sorted by similarity descending, then table name ascending. An
    /// empty index, a zero-norm query, or a query of the wrong length
    /// yields an empty list.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        active_only: bool,
        threshold: f32,
    ) -> Vec<SearchHit> {
        if top_k == 0 || self.entries.is_empty() || Some(query.len()) != self.dims {
            return Vec::new();
        }
        let Some(q) = l2_normalize(query) else {
            return Vec::new();
        };

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter(|(_, e)| !active_only || e.meta.is_active)
            .map(|(name, e)| SearchHit {
                table_name: name.clone(),
                similarity: dot(&q, &e.vector).clamp(-1.0, 1.0),
            })
            .filter(|h| h.similarity >= threshold)
            .collect();

        // BTreeMap iteration is name-ordered and sort_by is stable, so
        // equal similarities stay name-ascending.
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE: IndexMetadata = IndexMetadata { is_active: true };
    const INACTIVE: IndexMetadata = IndexMetadata { is_active: false };

    #[test]
    fn test_search_sorted_with_name_tiebreak() {
        let mut index = VectorIndex::new();
        index.upsert("ZETA", &[1.0, 0.0], ACTIVE);
        index.upsert("ALPHA", &[2.0, 0.0], ACTIVE);
        index.upsert("MID", &[1.0, 1.0], ACTIVE);
        index.upsert("FAR", &[0.0, 1.0], ACTIVE);

        let hits = index.search(&[1.0, 0.0], 10, false, -1.0);
        let names: Vec<&str> = hits.iter().map(|h| h.table_name.as_str()).collect();
        assert_eq!(names, vec!["ALPHA", "ZETA", "MID", "FAR"]);
        for pair in hits.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_threshold_and_top_k() {
        let mut index = VectorIndex::new();
        index.upsert("A", &[1.0, 0.0], ACTIVE);
        index.upsert("B", &[1.0, 1.0], ACTIVE);
        index.upsert("C", &[0.0, 1.0], ACTIVE);

        let hits = index.search(&[1.0, 0.0], 10, false, 0.5);
        assert_eq!(hits.len(), 2);
        let hits = index.search(&[1.0, 0.0], 1, false, -1.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].table_name, "A");
    }

    #[test]
    fn test_active_only_filter() {
        let mut index = VectorIndex::new();
        index.upsert("OLD", &[1.0, 0.0], INACTIVE);
        index.upsert("NEW", &[0.9, 0.1], ACTIVE);

        let hits = index.search(&[1.0, 0.0], 10, true, 0.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].table_name, "NEW");

        index.set_metadata("OLD", ACTIVE);
        assert_eq!(index.search(&[1.0, 0.0], 10, true, 0.0)[0].table_name, "OLD");
    }

    #[test]
    fn test_upsert_replaces() {
        let mut index = VectorIndex::new();
        index.upsert("A", &[1.0, 0.0], ACTIVE);
        index.upsert("A", &[0.0, 1.0], ACTIVE);
        assert_eq!(index.len(), 1);
        let hits = index.search(&[0.0, 1.0], 1, false, 0.0);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_inputs_return_empty() {
        let empty = VectorIndex::new();
        assert!(empty.search(&[1.0, 0.0], 5, false, 0.0).is_empty());

        let mut index = VectorIndex::new();
        assert!(!index.upsert("ZERO", &[0.0, 0.0], ACTIVE));
        index.upsert("A", &[1.0, 0.0], ACTIVE);
        assert!(!index.upsert("B", &[1.0, 0.0, 0.0], ACTIVE));
        assert!(index.search(&[0.0, 0.0], 5, false, -1.0).is_empty());
        assert!(index.search(&[1.0, 0.0, 0.0], 5, false, -1.0).is_empty());
    }
}
