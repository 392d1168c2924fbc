//! In-process fakes shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tablefinder::catalog::{CatalogError, CatalogSource};
use tablefinder::retriever::{Retriever, RetrieverSettings};
use tablefinder_core::embedding::{EmbeddingError, EmbeddingProvider};
use tablefinder_core::models::{SampleRows, TableMetadata};

pub const DIMS: usize = 4;

/// Catalog whose tables can be swapped between refreshes.
pub struct FakeCatalog {
    tables: Mutex<Vec<TableMetadata>>,
    unavailable: AtomicBool,
}

impl FakeCatalog {
    pub fn new(tables: Vec<TableMetadata>) -> Arc<Self> {
        Arc::new(Self {
            tables: Mutex::new(tables),
            unavailable: AtomicBool::new(false),
        })
    }

    pub fn set_tables(&self, tables: Vec<TableMetadata>) {
        *self.tables.lock().unwrap() = tables;
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn get_tables(&self) -> Result<Vec<TableMetadata>, CatalogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("connection refused".to_string()));
        }
        Ok(self.tables.lock().unwrap().clone())
    }

    async fn sample_rows(&self, table: &str, _n: usize) -> Result<SampleRows, CatalogError> {
        if self.tables.lock().unwrap().iter().any(|t| t.name == table) {
            Ok(SampleRows::default())
        } else {
            Err(CatalogError::TableNotFound(table.to_string()))
        }
    }
}

/// Deterministic embedder driven by substring rules.
///
/// The first rule whose needle occurs in the lowercased text decides the
/// vector. Texts matching no rule get a hash-derived vector that is never
/// zero. Texts containing a `fail_on` needle fail; texts containing
/// `slow_on` sleep for `delay` first.
pub struct FakeEmbedder {
    model: String,
    rules: Vec<(String, Vec<f32>)>,
    fail_on: Vec<String>,
    slow_on: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            model: "fake-embedder".to_string(),
            rules: Vec::new(),
            fail_on: Vec::new(),
            slow_on: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn model(mut self, name: &str) -> Self {
        self.model = name.to_string();
        self
    }

    pub fn rule(mut self, needle: &str, vector: [f32; DIMS]) -> Self {
        self.rules.push((needle.to_lowercase(), vector.to_vec()));
        self
    }

    pub fn fail_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_lowercase());
        self
    }

    pub fn slow_on(mut self, needle: &str, delay: Duration) -> Self {
        self.slow_on = Some(needle.to_lowercase());
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some((_, v)) = self.rules.iter().find(|(needle, _)| text.contains(needle)) {
            return v.clone();
        }
        let mut v = vec![1.0f32; DIMS];
        for (i, b) in text.bytes().enumerate() {
            v[i % DIMS] += f32::from(b % 7);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        DIMS
    }

    fn max_batch_size(&self) -> usize {
        8
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lowered: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();

        if let Some(slow) = &self.slow_on {
            if lowered.iter().any(|t| t.contains(slow.as_str())) {
                tokio::time::sleep(self.delay).await;
            }
        }
        if lowered
            .iter()
            .any(|t| self.fail_on.iter().any(|f| t.contains(f.as_str())))
        {
            return Err(EmbeddingError::Request("simulated failure".to_string()));
        }
        Ok(lowered.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// `CUSTOMERS(customer_id PK)` and `SALES(sale_id PK, customer_id FK → CUSTOMERS)`.
pub fn shop_tables() -> Vec<TableMetadata> {
    vec![
        TableMetadata::new("CUSTOMERS")
            .with_column("CUSTOMER_ID", "INTEGER", false)
            .with_column("NAME", "VARCHAR", true)
            .with_primary_key("CUSTOMER_ID")
            .with_row_count(1_200),
        TableMetadata::new("SALES")
            .with_column("SALE_ID", "INTEGER", false)
            .with_column("CUSTOMER_ID", "INTEGER", false)
            .with_column("TOTAL", "DECIMAL", false)
            .with_primary_key("SALE_ID")
            .with_foreign_key("CUSTOMER_ID", "CUSTOMERS", "CUSTOMER_ID")
            .with_row_count(50_000),
    ]
}

/// Embedder placing "purchase history" queries next to the sales table.
pub fn shop_embedder() -> FakeEmbedder {
    FakeEmbedder::new()
        .rule("purchase history", [0.9, 0.1, 0.0, 0.0])
        .rule("sales transactions", [1.0, 0.0, 0.0, 0.0])
        .rule("customer master", [0.0, 1.0, 0.0, 0.0])
}

pub fn retriever(
    catalog: Arc<FakeCatalog>,
    embedder: Arc<FakeEmbedder>,
    settings: RetrieverSettings,
) -> Arc<Retriever> {
    Arc::new(Retriever::new(catalog, embedder, settings))
}
