//! SQLite catalog: introspects a live database through sqlx.
//!
//! Metadata comes from SQLite's table-valued pragma functions, which accept
//! bound parameters:
//!
//! | Function | Used for |
//! |----------|----------|
//! | `pragma_table_info` | columns, types, nullability, primary key order |
//! | `pragma_foreign_key_list` | foreign keys, grouped by constraint id |
//! | `pragma_index_list` / `pragma_index_info` | indexes and their columns |
//!
//! Row counts use `COUNT(*)`. This module is the only place in the crate
//! that issues SQL.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};

use tablefinder_core::models::{
    ColumnMeta, ForeignKeyMeta, IndexMeta, SampleRows, TableMetadata, TableStats,
};

use crate::catalog::{CatalogError, CatalogSource};

pub struct SqliteCatalog {
    pool: SqlitePool,
}

fn unavailable(e: sqlx::Error) -> CatalogError {
    CatalogError::Unavailable(e.to_string())
}

/// Quote an identifier for interpolation into SQL text.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqliteCatalog {
    /// Open an existing database file read-only.
    pub async fn connect(path: &Path) -> Result<Self, CatalogError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(unavailable)?
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        Ok(Self { pool })
    }

    /// Wrap an already-open pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn table_names(&self) -> Result<Vec<String>, CatalogError> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn columns(&self, table: &str) -> Result<(Vec<ColumnMeta>, Vec<String>), CatalogError> {
        let rows = sqlx::query(
            r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut columns = Vec::with_capacity(rows.len());
        let mut pk: Vec<(i64, String)> = Vec::new();
        for row in rows {
            let name: String = row.try_get("name").map_err(unavailable)?;
            let data_type: String = row.try_get("type").map_err(unavailable)?;
            let not_null: i64 = row.try_get("notnull").map_err(unavailable)?;
            let pk_pos: i64 = row.try_get("pk").map_err(unavailable)?;
            if pk_pos > 0 {
                pk.push((pk_pos, name.clone()));
            }
            columns.push(ColumnMeta::new(name, data_type, not_null == 0 && pk_pos == 0));
        }
        pk.sort();
        Ok((columns, pk.into_iter().map(|(_, name)| name).collect()))
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyMeta>, CatalogError> {
        let rows = sqlx::query(
            r#"SELECT id, seq, "table" AS ref_table, "from" AS from_col, "to" AS to_col
               FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut by_id: BTreeMap<i64, ForeignKeyMeta> = BTreeMap::new();
        for row in rows {
            let id: i64 = row.try_get("id").map_err(unavailable)?;
            let ref_table: String = row.try_get("ref_table").map_err(unavailable)?;
            let from: String = row.try_get("from_col").map_err(unavailable)?;
            let to: Option<String> = row.try_get("to_col").map_err(unavailable)?;

            let fk = by_id.entry(id).or_insert_with(|| ForeignKeyMeta {
                columns: Vec::new(),
                referenced_table: ref_table,
                referenced_columns: Vec::new(),
            });
            fk.columns.push(from);
            if let Some(to) = to {
                fk.referenced_columns.push(to);
            }
        }
        Ok(by_id.into_values().collect())
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexMeta>, CatalogError> {
        let rows = sqlx::query(r#"SELECT name, "unique" FROM pragma_index_list(?1) ORDER BY name"#)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name").map_err(unavailable)?;
            let unique: i64 = row.try_get("unique").map_err(unavailable)?;
            let columns: Vec<Option<String>> =
                sqlx::query_scalar("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")
                    .bind(&name)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(unavailable)?;
            indexes.push(IndexMeta {
                name,
                // Expression index entries have no column name.
                columns: columns.into_iter().flatten().collect(),
                unique: unique != 0,
            });
        }
        Ok(indexes)
    }

    async fn row_count(&self, table: &str) -> Result<u64, CatalogError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(count.max(0) as u64)
    }
}

fn cell_value(row: &SqliteRow, idx: usize) -> serde_json::Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(serde_json::Value::from).unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(serde_json::Value::from).unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(serde_json::Value::from).unwrap_or_default();
    }
    serde_json::Value::Null
}

#[async_trait]
impl CatalogSource for SqliteCatalog {
    async fn get_tables(&self) -> Result<Vec<TableMetadata>, CatalogError> {
        let mut tables = Vec::new();
        for name in self.table_names().await? {
            let (columns, primary_keys) = self.columns(&name).await?;
            let foreign_keys = self.foreign_keys(&name).await?;
            let indexes = self.indexes(&name).await?;
            let row_count = self.row_count(&name).await?;
            tables.push(TableMetadata {
                name,
                columns,
                primary_keys,
                foreign_keys,
                indexes,
                row_count: Some(row_count),
                is_active: true,
            });
        }
        Ok(tables)
    }

    async fn sample_rows(&self, table: &str, n: usize) -> Result<SampleRows, CatalogError> {
        if !self.table_names().await?.iter().any(|t| t == table) {
            return Err(CatalogError::TableNotFound(table.to_string()));
        }
        let rows = sqlx::query(&format!("SELECT * FROM {} LIMIT ?1", quote_ident(table)))
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        let columns: Vec<String> = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| cell_value(row, i)).collect())
            .collect();

        Ok(SampleRows { columns, rows })
    }

    async fn table_stats(&self) -> Result<Vec<TableStats>, CatalogError> {
        let mut stats = Vec::new();
        for name in self.table_names().await? {
            let row_count = self.row_count(&name).await?;
            stats.push(TableStats {
                name,
                row_count: Some(row_count),
                is_active: true,
            });
        }
        Ok(stats)
    }
}
