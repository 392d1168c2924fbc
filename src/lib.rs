//! # tablefinder
//!
//! A schema retrieval engine: given a natural-language question, return the
//! database tables most likely needed to answer it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌────────────────┐
//! │   Catalog   │──▶│     Builder      │──▶│ SchemaSnapshot │
//! │ JSON/SQLite │   │ describe + embed │   │ (Arc, swapped) │
//! └─────────────┘   └──────────────────┘   └───────┬────────┘
//!                                                  │
//!                            ┌─────────────────────┤
//!                            ▼                     ▼
//!                       ┌──────────┐         ┌──────────┐
//!                       │   CLI    │         │   HTTP   │
//!                       │   (tf)   │         │  (axum)  │
//!                       └──────────┘         └──────────┘
//! ```
//!
//! The pure pieces (descriptions, vector index, relationship graph, scoring,
//! snapshots) live in the `tablefinder-core` crate. This crate adds the
//! runtime around them: catalogs, embedding providers, persistence, the
//! [`retriever::Retriever`], the background refresher, and the surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`catalog`] | Catalog source trait and JSON dump catalog |
//! | [`catalog_sqlite`] | SQLite catalog via sqlx introspection |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama, fastembed) |
//! | [`builder`] | Full and stats-only snapshot builds |
//! | [`persist`] | Snapshot file save/load |
//! | [`retriever`] | Query path and snapshot publishing |
//! | [`refresher`] | Background stats-only refresh |
//! | [`context`] | Schema context text for SQL generation |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |

pub mod builder;
pub mod catalog;
pub mod catalog_sqlite;
pub mod commands;
pub mod config;
pub mod context;
pub mod embedding;
pub mod persist;
pub mod refresher;
pub mod retriever;
pub mod server;
