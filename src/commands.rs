//! CLI command implementations.
//!
//! Each `tf` subcommand opens a [`Retriever`] from configuration, warm
//! starting from the persisted snapshot when one exists, and prints its
//! result to stdout.

use std::sync::Arc;

use anyhow::{bail, Result};

use tablefinder_core::snapshot::{SnapshotInfo, SnapshotStats};

use crate::catalog::open_catalog;
use crate::config::Config;
use crate::embedding::create_provider;
use crate::retriever::{Retriever, RetrieverSettings};

/// Construct the retriever described by `config` and load any persisted
/// snapshot.
pub async fn open_retriever(config: &Config) -> Result<Arc<Retriever>> {
    let catalog = open_catalog(&config.catalog).await?;
    let provider = create_provider(&config.embedding)?;
    let settings = RetrieverSettings::from_config(config)?;
    let retriever = Arc::new(Retriever::new(catalog, provider, settings));
    retriever.load_persisted().await;
    Ok(retriever)
}

/// Build a snapshot first if nothing was persisted.
async fn ensure_snapshot(retriever: &Retriever) -> Result<()> {
    if retriever.snapshot().is_none() {
        println!("No persisted snapshot; running a full build first.");
        let stats = retriever.refresh(true).await?;
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &SnapshotStats) {
    if stats.skipped {
        println!("Refresh skipped: another refresh is running.");
        return;
    }
    println!(
        "Snapshot v{} ({:?}) published in {} ms",
        stats.version.unwrap_or_default(),
        stats.kind,
        stats.duration_ms
    );
    println!("  tables processed:   {}", stats.tables_processed);
    println!("  tables embedded:    {}", stats.tables_embedded);
    println!("  embedding failures: {}", stats.embedding_failures);
    println!(
        "  persisted:          {}",
        if stats.persisted { "yes" } else { "no" }
    );
}

pub async fn run_build(retriever: &Retriever) -> Result<()> {
    let stats = retriever.refresh(true).await?;
    print_stats(&stats);
    Ok(())
}

pub async fn run_refresh(retriever: &Retriever, full: bool) -> Result<()> {
    if !full && retriever.snapshot().is_none() {
        bail!("No snapshot to refresh. Run `tf build` first.");
    }
    let stats = retriever.refresh(full).await?;
    print_stats(&stats);
    Ok(())
}

pub async fn run_search(
    retriever: &Retriever,
    query: &str,
    limit: usize,
    expand: bool,
    explain: bool,
) -> Result<()> {
    ensure_snapshot(retriever).await?;
    let results = retriever.find_relevant(query, limit, expand).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let via = match &result.origin_table {
            Some(origin) if result.is_expanded => format!("  (via {})", origin),
            _ => String::new(),
        };
        println!(
            "{}. [{:.3}] {}{}",
            i + 1,
            result.final_score,
            result.table_name,
            via
        );
        if explain {
            println!(
                "    semantic: {:.3}  importance: {:.3}  keyword: {:.3}",
                result.semantic_score, result.importance_score, result.keyword_score
            );
        }
    }
    Ok(())
}

fn print_info(info: &SnapshotInfo) {
    println!("tablefinder — Snapshot");
    println!("======================");
    println!();
    println!("  Version:     {} ({:?})", info.version, info.kind);
    println!(
        "  Created:     {}",
        info.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  Age:         {}s{}",
        info.age_secs,
        if info.is_stale { " (stale)" } else { "" }
    );
    println!();
    println!("  Tables:      {}", info.table_count);
    println!("  Active:      {}", info.active_count);
    println!(
        "  Embedded:    {} ({} failed)",
        info.embedded_count, info.embedding_failures
    );
    println!("  With data:   {}", info.tables_with_data);
    println!("  With FKs:    {}", info.tables_with_foreign_keys);
    println!("  Total rows:  {}", info.total_rows);
    if let Some(next) = info.next_refresh_at {
        println!("  Next refresh: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!();
}

pub fn run_info(retriever: &Retriever) -> Result<()> {
    match retriever.snapshot_info() {
        Some(info) => print_info(&info),
        None => println!("No snapshot. Run `tf build` to create one."),
    }
    Ok(())
}

pub async fn run_context(retriever: &Retriever, tables: &[String]) -> Result<()> {
    ensure_snapshot(retriever).await?;
    let context = retriever.table_context(tables)?;
    if context.is_empty() {
        println!("No matching tables.");
    } else {
        print!("{}", context);
    }
    Ok(())
}
