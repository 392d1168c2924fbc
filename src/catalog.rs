//! Catalog sources: where table metadata comes from.
//!
//! The retrieval engine never issues SQL itself. Everything it knows about
//! the database arrives through a [`CatalogSource`]:
//!
//! | Implementation | Backing |
//! |----------------|---------|
//! | [`JsonCatalog`] | a JSON dump of table metadata and optional samples |
//! | [`SqliteCatalog`](crate::catalog_sqlite::SqliteCatalog) | a live SQLite database |
//!
//! # JSON dump format
//!
//! ```json
//! {
//!   "tables": [
//!     { "name": "CUSTOMERS", "columns": [{"name": "CUSTOMER_ID", "data_type": "INTEGER"}],
//!       "primary_keys": ["CUSTOMER_ID"], "row_count": 1200 }
//!   ],
//!   "samples": {
//!     "CUSTOMERS": { "columns": ["CUSTOMER_ID"], "rows": [[1], [2]] }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Deserialize;

use tablefinder_core::models::{SampleRows, TableMetadata, TableStats};

use crate::config::{CatalogConfig, CatalogKind};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog could not be read at all.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("table not found: {0}")]
    TableNotFound(String),
}

/// A source of table metadata.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every table with its columns, keys, indexes and row count.
    async fn get_tables(&self) -> Result<Vec<TableMetadata>, CatalogError>;

    /// Up to `n` rows of `table`.
    async fn sample_rows(&self, table: &str, n: usize) -> Result<SampleRows, CatalogError>;

    /// Row counts and active flags only, for stats-only refreshes.
    async fn table_stats(&self) -> Result<Vec<TableStats>, CatalogError> {
        Ok(self
            .get_tables()
            .await?
            .iter()
            .map(TableStats::from)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDump {
    tables: Vec<TableMetadata>,
    #[serde(default)]
    samples: BTreeMap<String, SampleRows>,
}

/// Catalog backed by a JSON dump file.
///
/// The parsed dump is cached and reused until the file's modification time
/// or length changes, so one refresh parses it once however many tables it
/// samples, and edits are picked up by the next refresh.
pub struct JsonCatalog {
    path: PathBuf,
    cache: Mutex<Option<CachedDump>>,
}

struct CachedDump {
    modified: Option<SystemTime>,
    len: u64,
    dump: Arc<CatalogDump>,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> CatalogError {
        CatalogError::Unavailable(format!("{}: {}", self.path.display(), e))
    }

    async fn load(&self) -> Result<Arc<CatalogDump>, CatalogError> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.unavailable(e))?;
        let modified = meta.modified().ok();
        let len = meta.len();

        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.as_ref() {
                if cached.modified.is_some() && cached.modified == modified && cached.len == len {
                    return Ok(Arc::clone(&cached.dump));
                }
            }
        }

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.unavailable(e))?;
        let dump: Arc<CatalogDump> =
            Arc::new(serde_json::from_str(&text).map_err(|e| self.unavailable(e))?);
        tracing::debug!(path = %self.path.display(), tables = dump.tables.len(), "parsed catalog dump");

        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedDump {
            modified,
            len,
            dump: Arc::clone(&dump),
        });
        Ok(dump)
    }
}

#[async_trait]
impl CatalogSource for JsonCatalog {
    async fn get_tables(&self) -> Result<Vec<TableMetadata>, CatalogError> {
        Ok(self.load().await?.tables.clone())
    }

    async fn sample_rows(&self, table: &str, n: usize) -> Result<SampleRows, CatalogError> {
        let dump = self.load().await?;
        if !dump.tables.iter().any(|t| t.name == table) {
            return Err(CatalogError::TableNotFound(table.to_string()));
        }
        let mut sample = dump.samples.get(table).cloned().unwrap_or_default();
        sample.rows.truncate(n);
        Ok(sample)
    }
}

/// Open the catalog named by `[catalog]`.
pub async fn open_catalog(config: &CatalogConfig) -> anyhow::Result<Arc<dyn CatalogSource>> {
    match config.kind {
        CatalogKind::Json => Ok(Arc::new(JsonCatalog::new(&config.path))),
        CatalogKind::Sqlite => Ok(Arc::new(
            crate::catalog_sqlite::SqliteCatalog::connect(&config.path).await?,
        )),
    }
}
