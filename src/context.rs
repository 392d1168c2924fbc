//! Compact schema context for a downstream SQL generator.
//!
//! Renders the tables chosen by retrieval as plain text, using only what the
//! snapshot already holds:
//!
//! ```text
//! Relevant tables for this query:
//!
//! - SALES (48,210 rows):
//!   columns: SALE_ID, CUSTOMER_ID, SALE_DATE, TOTAL
//!   primary key: SALE_ID
//!   indexed columns: CUSTOMER_ID, SALE_DATE
//!   relationships: CUSTOMER_ID → CUSTOMERS
//!   note: Cancelled sales have STATUS = 'C'
//! ```

use std::collections::BTreeMap;

use tablefinder_core::description::group_thousands;
use tablefinder_core::models::TableProfile;
use tablefinder_core::snapshot::SchemaSnapshot;

const MAX_COLUMNS: usize = 30;
const MAX_INDEXED_COLUMNS: usize = 10;
const MAX_RELATIONSHIPS: usize = 3;

/// Render context for `names`, in the order given. Names the snapshot does
/// not know are skipped; an empty or fully unknown list renders as `""`.
pub fn render(
    snapshot: &SchemaSnapshot,
    names: &[String],
    notes: &BTreeMap<String, String>,
) -> String {
    let blocks: Vec<String> = names
        .iter()
        .filter_map(|name| snapshot.profile(name))
        .map(|profile| render_table(profile, notes.get(&profile.name)))
        .collect();

    if blocks.is_empty() {
        return String::new();
    }
    format!("Relevant tables for this query:\n\n{}", blocks.join("\n"))
}

fn render_table(profile: &TableProfile, note: Option<&String>) -> String {
    let meta = &profile.metadata;
    let rows = match profile.row_count {
        Some(n) => format!("{} rows", group_thousands(n)),
        None => "unknown rows".to_string(),
    };
    let mut lines = vec![format!("- {} ({}):", profile.name, rows)];

    let shown: Vec<&str> = meta.column_names().take(MAX_COLUMNS).collect();
    if !shown.is_empty() {
        lines.push(format!("  columns: {}", shown.join(", ")));
    }
    if meta.columns.len() > MAX_COLUMNS {
        lines.push(format!(
            "  ... and {} more columns",
            meta.columns.len() - MAX_COLUMNS
        ));
    }

    if !meta.primary_keys.is_empty() {
        lines.push(format!("  primary key: {}", meta.primary_keys.join(", ")));
    }

    let mut indexed: Vec<&str> = Vec::new();
    for column in meta.indexes.iter().flat_map(|i| i.columns.iter()) {
        if !indexed.contains(&column.as_str()) {
            indexed.push(column);
        }
    }
    if !indexed.is_empty() {
        indexed.truncate(MAX_INDEXED_COLUMNS);
        lines.push(format!("  indexed columns: {}", indexed.join(", ")));
    }

    let relationships: Vec<String> = meta
        .foreign_keys
        .iter()
        .filter(|fk| !fk.referenced_table.is_empty())
        .take(MAX_RELATIONSHIPS)
        .map(|fk| format!("{} → {}", fk.columns.join(", "), fk.referenced_table))
        .collect();
    if !relationships.is_empty() {
        lines.push(format!("  relationships: {}", relationships.join("; ")));
    }

    if let Some(note) = note {
        lines.push(format!("  note: {}", note));
    }

    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use tablefinder_core::graph::RelationshipGraph;
    use tablefinder_core::models::{EmbeddingState, IndexMeta, TableMetadata};

    fn snapshot(tables: Vec<TableMetadata>) -> SchemaSnapshot {
        let graph = RelationshipGraph::build(&tables, None);
        let profiles = tables
            .into_iter()
            .map(|m| TableProfile::new(m, String::new(), EmbeddingState::Skipped, true, Utc::now()))
            .collect();
        SchemaSnapshot::assemble(1, "m", profiles, graph, Duration::from_secs(60), Utc::now())
    }

    #[test]
    fn test_render_sales() {
        let mut sales = TableMetadata::new("SALES")
            .with_column("SALE_ID", "INTEGER", false)
            .with_column("CUSTOMER_ID", "INTEGER", false)
            .with_primary_key("SALE_ID")
            .with_foreign_key("CUSTOMER_ID", "CUSTOMERS", "CUSTOMER_ID")
            .with_row_count(48_210);
        sales.indexes.push(IndexMeta {
            name: "IX_SALES_CUSTOMER".to_string(),
            columns: vec!["CUSTOMER_ID".to_string()],
            unique: false,
        });
        let snap = snapshot(vec![sales, TableMetadata::new("CUSTOMERS")]);
        let mut notes = BTreeMap::new();
        notes.insert("SALES".to_string(), "Cancelled sales have STATUS = 'C'".to_string());

        let text = render(&snap, &["SALES".to_string(), "NOPE".to_string()], &notes);
        assert!(text.starts_with("Relevant tables for this query:"));
        assert!(text.contains("- SALES (48,210 rows):"));
        assert!(text.contains("  columns: SALE_ID, CUSTOMER_ID"));
        assert!(text.contains("  primary key: SALE_ID"));
        assert!(text.contains("  indexed columns: CUSTOMER_ID"));
        assert!(text.contains("  relationships: CUSTOMER_ID → CUSTOMERS"));
        assert!(text.contains("  note: Cancelled sales"));
        assert!(!text.contains("NOPE"));
    }

    #[test]
    fn test_render_caps_columns() {
        let mut wide = TableMetadata::new("WIDE");
        for i in 0..35 {
            wide = wide.with_column(&format!("C{}", i), "TEXT", true);
        }
        let snap = snapshot(vec![wide]);
        let text = render(&snap, &["WIDE".to_string()], &BTreeMap::new());
        assert!(text.contains("... and 5 more columns"));
        assert!(text.contains("C29"));
        assert!(!text.contains("C30,"));
        assert!(text.contains("(unknown rows)"));
    }

    #[test]
    fn test_render_unknown_only_is_empty() {
        let snap = snapshot(vec![TableMetadata::new("A")]);
        assert_eq!(render(&snap, &["B".to_string()], &BTreeMap::new()), "");
    }
}
