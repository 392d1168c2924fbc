//! Table relationship graph and seed expansion.
//!
//! Edges come from two places:
//!
//! - **Foreign keys** in catalog metadata. Every FK yields a `References`
//!   edge on the owning table and a mirrored `ReferencedBy` edge on the
//!   target.
//! - **A curated graph** loaded from JSON (`{"graph": {"TABLE": [...]}}`)
//!   carrying domain knowledge that literal FKs miss.
//!
//! [`RelationshipGraph::expand`] adds neighbours of the strongest seeds to a
//! result set with a decayed score:
//!
//! ```text
//! seed (0.80) ──FK──▶ neighbour (0.80 × 0.75 = 0.60)
//! seed (0.80) ──curated──▶ neighbour (0.80 × 0.70 = 0.56)
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::{Candidate, TableMetadata};

/// Score multiplier for foreign-key neighbours.
pub const FK_DECAY: f64 = 0.75;
/// Score multiplier for curated neighbours.
pub const CURATED_DECAY: f64 = 0.7;

const DETAIL_HINTS: &[&str] = &[
    "detail", "line", "code", "key", "detalle", "det", "linea", "codigo", "clave",
];
const STOCK_HINTS: &[&str] = &["stock", "price", "cost", "existencia", "precio", "costo"];
const CATALOG_HINTS: &[&str] = &[
    "type", "group", "category", "family", "tipo", "grupo", "categoria", "familia",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    /// `from_table` holds the foreign key.
    References,
    /// `to_table` holds the foreign key.
    ReferencedBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOrigin {
    ForeignKey,
    Curated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub from_table: String,
    pub to_table: String,
    /// FK columns in key order; empty for curated edges.
    pub via_columns: Vec<String>,
    pub direction: EdgeDirection,
    pub origin: EdgeOrigin,
}

/// Hand-maintained adjacency list, `{"graph": {"TABLE": ["RELATED", ...]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedGraph {
    #[serde(default)]
    pub graph: BTreeMap<String, Vec<String>>,
}

impl CuratedGraph {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

/// Bounds applied by [`RelationshipGraph::expand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionLimits {
    /// Neighbours taken per seed, per edge source.
    pub max_related_per_seed: usize,
    /// Ceiling on seeds plus expanded tables.
    pub max_total: usize,
    /// How many of the strongest seeds are expanded.
    pub seed_count: usize,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            max_related_per_seed: 3,
            max_total: 12,
            seed_count: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    fk_edges: BTreeMap<String, Vec<RelationshipEdge>>,
    curated: BTreeMap<String, Vec<String>>,
}

impl RelationshipGraph {
    /// Build the graph for one snapshot. Edges that touch tables absent
    /// from `tables` are dropped, as are self references.
    pub fn build(tables: &[TableMetadata], curated: Option<&CuratedGraph>) -> Self {
        let known: BTreeSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        let mut fk_edges: BTreeMap<String, Vec<RelationshipEdge>> = BTreeMap::new();

        for table in tables {
            for fk in &table.foreign_keys {
                let target = fk.referenced_table.as_str();
                if target == table.name || !known.contains(target) {
                    continue;
                }
                fk_edges
                    .entry(table.name.clone())
                    .or_default()
                    .push(RelationshipEdge {
                        from_table: table.name.clone(),
                        to_table: target.to_string(),
                        via_columns: fk.columns.clone(),
                        direction: EdgeDirection::References,
                        origin: EdgeOrigin::ForeignKey,
                    });
                fk_edges
                    .entry(target.to_string())
                    .or_default()
                    .push(RelationshipEdge {
                        from_table: target.to_string(),
                        to_table: table.name.clone(),
                        via_columns: fk.columns.clone(),
                        direction: EdgeDirection::ReferencedBy,
                        origin: EdgeOrigin::ForeignKey,
                    });
            }
        }
        for edges in fk_edges.values_mut() {
            edges.sort_by(|a, b| {
                a.direction
                    .cmp(&b.direction)
                    .then_with(|| a.to_table.cmp(&b.to_table))
                    .then_with(|| a.via_columns.cmp(&b.via_columns))
            });
        }

        let mut curated_edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(curated) = curated {
            for (from, related) in &curated.graph {
                if !known.contains(from.as_str()) {
                    continue;
                }
                let mut targets: Vec<String> = related
                    .iter()
                    .filter(|t| *t != from && known.contains(t.as_str()))
                    .cloned()
                    .collect();
                targets.sort();
                targets.dedup();
                if !targets.is_empty() {
                    curated_edges.insert(from.clone(), targets);
                }
            }
        }

        Self {
            fk_edges,
            curated: curated_edges,
        }
    }

    /// All edges leaving `table`: FK edges first, then curated ones.
    pub fn edges(&self, table: &str) -> Vec<RelationshipEdge> {
        let mut edges = self.fk_edges.get(table).cloned().unwrap_or_default();
        if let Some(targets) = self.curated.get(table) {
            edges.extend(targets.iter().map(|to| RelationshipEdge {
                from_table: table.to_string(),
                to_table: to.clone(),
                via_columns: Vec::new(),
                direction: EdgeDirection::References,
                origin: EdgeOrigin::Curated,
            }));
        }
        edges
    }

    pub fn edge_count(&self) -> usize {
        self.fk_edges.values().map(Vec::len).sum::<usize>()
            + self.curated.values().map(Vec::len).sum::<usize>()
    }

    /// FK neighbours of `table`: referenced tables by name, then referencing
    /// tables by name. Each neighbour appears once.
    pub fn fk_neighbors(&self, table: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for edge in self.fk_edges.get(table).map(Vec::as_slice).unwrap_or(&[]) {
            if !out.contains(&edge.to_table.as_str()) {
                out.push(edge.to_table.as_str());
            }
        }
        out
    }

    /// Curated neighbours of `table`, most promising join targets first.
    pub fn curated_neighbors(&self, table: &str) -> Vec<&str> {
        let Some(targets) = self.curated.get(table) else {
            return Vec::new();
        };
        let mut scored: Vec<(&str, u32)> = targets
            .iter()
            .map(|t| (t.as_str(), curated_priority(table, t)))
            .collect();
        scored.sort_by_key(|&(name, priority)| (Reverse(priority), name));
        scored.into_iter().map(|(name, _)| name).collect()
    }

    /// Add relationship neighbours of the strongest seeds.
    ///
    /// `seeds` should be ordered strongest first. `eligible` filters which
    /// tables may be added (e.g. only active ones). Returns seeds plus
    /// expanded candidates, at most `limits.max_total` of them, ordered by
    /// score descending with seeds ahead of expanded tables on ties.
    pub fn expand(
        &self,
        seeds: &[Candidate],
        limits: &ExpansionLimits,
        eligible: impl Fn(&str) -> bool,
    ) -> Vec<Candidate> {
        let mut seed_names: BTreeSet<&str> = BTreeSet::new();
        let mut unique_seeds: Vec<&Candidate> = Vec::new();
        for seed in seeds {
            if seed_names.insert(seed.table_name.as_str()) {
                unique_seeds.push(seed);
            }
        }

        let mut expanded: BTreeMap<String, Candidate> = BTreeMap::new();
        for seed in unique_seeds.iter().take(limits.seed_count) {
            let name = seed.table_name.as_str();
            for neighbour in self
                .fk_neighbors(name)
                .into_iter()
                .filter(|n| !seed_names.contains(n) && eligible(n))
                .take(limits.max_related_per_seed)
            {
                offer(&mut expanded, neighbour, seed, FK_DECAY);
            }
            for neighbour in self
                .curated_neighbors(name)
                .into_iter()
                .filter(|n| !seed_names.contains(n) && eligible(n))
                .take(limits.max_related_per_seed)
            {
                offer(&mut expanded, neighbour, seed, CURATED_DECAY);
            }
        }

        let mut combined: Vec<Candidate> = unique_seeds.into_iter().cloned().collect();
        combined.extend(expanded.into_values());
        combined.sort_by(|a, b| {
            b.semantic_score
                .total_cmp(&a.semantic_score)
                .then_with(|| a.is_expanded.cmp(&b.is_expanded))
                .then_with(|| a.table_name.cmp(&b.table_name))
        });
        combined.truncate(limits.max_total);
        combined
    }
}

/// Record `name` as reached from `seed`, keeping the best score seen.
fn offer(expanded: &mut BTreeMap<String, Candidate>, name: &str, seed: &Candidate, decay: f64) {
    let score = seed.semantic_score * decay;
    if expanded
        .get(name)
        .is_some_and(|existing| existing.semantic_score >= score)
    {
        return;
    }
    expanded.insert(
        name.to_string(),
        Candidate {
            table_name: name.to_string(),
            semantic_score: score,
            is_expanded: true,
            origin_table: Some(seed.table_name.clone()),
        },
    );
}

/// Priority of a curated neighbour: detail/code tables first, then
/// stock/price tables, tables named after the seed, and type catalogs.
fn curated_priority(seed: &str, related: &str) -> u32 {
    let related = related.to_lowercase();
    let has = |hints: &[&str]| hints.iter().any(|h| related.contains(h));

    let mut score = 0;
    if has(DETAIL_HINTS) {
        score += 10;
    }
    if has(STOCK_HINTS) {
        score += 9;
    }
    let base = seed.to_lowercase();
    let base = base.trim_end_matches('s');
    if !base.is_empty() && related.contains(base) {
        score += 8;
    }
    if has(CATALOG_HINTS) {
        score += 7;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> Vec<TableMetadata> {
        vec![
            TableMetadata::new("CUSTOMERS").with_primary_key("CUSTOMER_ID"),
            TableMetadata::new("SALES")
                .with_primary_key("SALE_ID")
                .with_foreign_key("CUSTOMER_ID", "CUSTOMERS", "CUSTOMER_ID")
                .with_foreign_key("STORE_ID", "STORES", "STORE_ID"),
            TableMetadata::new("SALES_LINES")
                .with_foreign_key("SALE_ID", "SALES", "SALE_ID")
                .with_foreign_key("PRODUCT_ID", "PRODUCTS", "PRODUCT_ID"),
            TableMetadata::new("STORES"),
            TableMetadata::new("PRODUCTS"),
            TableMetadata::new("PRODUCT_PRICES"),
            TableMetadata::new("PRODUCT_GROUPS"),
            TableMetadata::new("AUDIT_LOG"),
        ]
    }

    fn curated() -> CuratedGraph {
        CuratedGraph::from_json(
            r#"{"graph": {"PRODUCTS": ["AUDIT_LOG", "PRODUCT_GROUPS", "PRODUCT_PRICES", "GHOST"]}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_fk_edges_both_directions() {
        let graph = RelationshipGraph::build(&shop(), None);
        assert_eq!(graph.fk_neighbors("SALES"), vec!["CUSTOMERS", "STORES", "SALES_LINES"]);
        assert_eq!(graph.fk_neighbors("CUSTOMERS"), vec!["SALES"]);

        let edges = graph.edges("CUSTOMERS");
        assert_eq!(edges[0].direction, EdgeDirection::ReferencedBy);
        assert_eq!(edges[0].via_columns, vec!["CUSTOMER_ID"]);
    }

    #[test]
    fn test_unknown_tables_dropped() {
        let graph = RelationshipGraph::build(&shop(), Some(&curated()));
        assert!(!graph.curated_neighbors("PRODUCTS").contains(&"GHOST"));
        assert!(graph.fk_neighbors("GHOST").is_empty());
    }

    #[test]
    fn test_curated_priority_order() {
        let graph = RelationshipGraph::build(&shop(), Some(&curated()));
        assert_eq!(
            graph.curated_neighbors("PRODUCTS"),
            vec!["PRODUCT_PRICES", "PRODUCT_GROUPS", "AUDIT_LOG"]
        );
    }

    #[test]
    fn test_expand_customer_sales() {
        let graph = RelationshipGraph::build(&shop(), None);
        let seeds = vec![Candidate::seed("SALES", 0.8)];
        let out = graph.expand(&seeds, &ExpansionLimits::default(), |_| true);

        assert_eq!(out[0].table_name, "SALES");
        assert!(!out[0].is_expanded);
        let customers = out.iter().find(|c| c.table_name == "CUSTOMERS").unwrap();
        assert!(customers.is_expanded);
        assert_eq!(customers.origin_table.as_deref(), Some("SALES"));
        assert!((customers.semantic_score - 0.8 * FK_DECAY).abs() < 1e-12);
    }

    #[test]
    fn test_expand_respects_max_total_and_decay() {
        let graph = RelationshipGraph::build(&shop(), Some(&curated()));
        let seeds = vec![
            Candidate::seed("SALES", 0.9),
            Candidate::seed("PRODUCTS", 0.7),
            Candidate::seed("SALES_LINES", 0.6),
        ];
        for max_total in 1..10 {
            let limits = ExpansionLimits {
                max_total,
                ..ExpansionLimits::default()
            };
            let out = graph.expand(&seeds, &limits, |_| true);
            assert!(out.len() <= max_total);

            for c in out.iter().filter(|c| c.is_expanded) {
                let origin = c.origin_table.as_deref().unwrap();
                let seed = seeds.iter().find(|s| s.table_name == origin).unwrap();
                assert!(c.semantic_score <= seed.semantic_score * FK_DECAY + 1e-12);
            }
        }
    }

    #[test]
    fn test_seed_never_re_added_and_dedupe_keeps_best() {
        let graph = RelationshipGraph::build(&shop(), None);
        // PRODUCTS is reachable from SALES_LINES only; SALES is a seed and
        // also a neighbour of SALES_LINES.
        let seeds = vec![
            Candidate::seed("SALES", 0.9),
            Candidate::seed("SALES_LINES", 0.5),
        ];
        let out = graph.expand(&seeds, &ExpansionLimits::default(), |_| true);
        let sales: Vec<_> = out.iter().filter(|c| c.table_name == "SALES").collect();
        assert_eq!(sales.len(), 1);
        assert!(!sales[0].is_expanded);

        let products = out.iter().find(|c| c.table_name == "PRODUCTS").unwrap();
        assert_eq!(products.origin_table.as_deref(), Some("SALES_LINES"));
    }

    #[test]
    fn test_eligible_filter_and_seed_count() {
        let graph = RelationshipGraph::build(&shop(), None);
        let seeds = vec![Candidate::seed("SALES", 0.9)];
        let out = graph.expand(&seeds, &ExpansionLimits::default(), |n| n != "STORES");
        assert!(out.iter().all(|c| c.table_name != "STORES"));

        let limits = ExpansionLimits {
            seed_count: 0,
            ..ExpansionLimits::default()
        };
        assert_eq!(graph.expand(&seeds, &limits, |_| true).len(), 1);
    }
}
