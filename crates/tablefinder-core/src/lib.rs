//! # tablefinder core
//!
//! Pure retrieval logic for tablefinder: catalog and profile models, the
//! table description builder, the embedding provider trait, the in-memory
//! vector index, foreign-key relationship expansion, relevance scoring,
//! and immutable schema snapshots.
//!
//! This crate contains no tokio, sqlx, network, or filesystem I/O. The
//! application crate supplies the catalog, the embedding backends, the
//! refresh scheduler, and persistence.
//!
//! ```text
//! query ─▶ EmbeddingProvider ─▶ VectorIndex::search ─▶ seeds
//!                                                        │
//!          ranked tables ◀─ scorer::rank ◀─ RelationshipGraph::expand
//! ```

pub mod description;
pub mod embedding;
pub mod graph;
pub mod index;
pub mod models;
pub mod scorer;
pub mod snapshot;
