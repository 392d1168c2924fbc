//! Relevance scoring for candidate tables.
//!
//! Three factors, each in `[0, 1]`, combined by configurable weights:
//!
//! | Factor | Source |
//! |--------|--------|
//! | semantic | vector similarity (decayed seed score for expanded tables) |
//! | importance | row volume, foreign keys, column count, seed bonus |
//! | keyword | query words in table name, column names, description |

use std::collections::BTreeMap;

use crate::models::{Candidate, ScoredCandidate, TableProfile};

/// Query words shorter than this many characters are ignored.
const MIN_TERM_CHARS: usize = 4;

/// Weights for the three scoring factors. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerWeights {
    pub semantic: f64,
    pub importance: f64,
    pub keyword: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            semantic: 0.6,
            importance: 0.25,
            keyword: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightsError {
    #[error("weight `{name}` must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("scorer weights must sum to 1, got {0}")]
    BadSum(f64),
}

impl ScorerWeights {
    pub fn new(semantic: f64, importance: f64, keyword: f64) -> Result<Self, WeightsError> {
        let weights = Self {
            semantic,
            importance,
            keyword,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), WeightsError> {
        for (name, value) in [
            ("semantic", self.semantic),
            ("importance", self.importance),
            ("keyword", self.keyword),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(WeightsError::OutOfRange { name, value });
            }
        }
        let sum = self.semantic + self.importance + self.keyword;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(WeightsError::BadSum(sum));
        }
        Ok(())
    }
}

/// Lowercased, deduplicated query words of at least four characters,
/// in first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .map(str::to_lowercase)
    {
        if word.chars().count() >= MIN_TERM_CHARS && !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Structural importance of a table in `[0, 1]`.
///
/// `0.4·min(log10(rows+1)/6, 1) + 0.3·min(fk/5, 1)
///  + 0.2·min(max(cols-5, 0)/25, 1) + 0.1·[seed]`
pub fn importance_score(profile: &TableProfile, is_seed: bool) -> f64 {
    let rows = profile
        .row_count
        .map(|r| ((r as f64 + 1.0).log10() / 6.0).min(1.0))
        .unwrap_or(0.0);
    let fks = (profile.foreign_key_count as f64 / 5.0).min(1.0);
    let cols = (profile.column_count.saturating_sub(5) as f64 / 25.0).min(1.0);
    let seed = if is_seed { 1.0 } else { 0.0 };
    (0.4 * rows + 0.3 * fks + 0.2 * cols + 0.1 * seed).clamp(0.0, 1.0)
}

/// Token overlap between `terms` and a table, in `[0, 1]`.
///
/// Each term found in the table name adds 0.4; columns containing any term
/// add up to 0.4 (saturating at five columns); terms found in the
/// description add up to 0.2 (saturating at ten).
pub fn keyword_score(terms: &[String], profile: &TableProfile) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let name = profile.name.to_lowercase();
    let description = profile.description.to_lowercase();

    let name_hits = terms.iter().filter(|t| name.contains(t.as_str())).count();
    let col_hits = profile
        .column_names()
        .filter(|col| {
            let col = col.to_lowercase();
            terms.iter().any(|t| col.contains(t.as_str()))
        })
        .count();
    let desc_hits = terms
        .iter()
        .filter(|t| description.contains(t.as_str()))
        .count();

    let score = 0.4 * name_hits as f64
        + 0.4 * (col_hits as f64 / 5.0).min(1.0)
        + 0.2 * (desc_hits as f64 / 10.0).min(1.0);
    score.clamp(0.0, 1.0)
}

/// Score and sort candidates.
///
/// Candidates without a profile in `profiles` are dropped. Output is
/// sorted by `final_score` descending, then table name ascending.
pub fn rank(
    candidates: &[Candidate],
    profiles: &BTreeMap<String, TableProfile>,
    query: &str,
    weights: &ScorerWeights,
) -> Vec<ScoredCandidate> {
    let terms = query_terms(query);

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .filter_map(|c| {
            let profile = profiles.get(&c.table_name)?;
            let semantic = clamp_unit(c.semantic_score);
            let importance = importance_score(profile, !c.is_expanded);
            let keyword = keyword_score(&terms, profile);
            let final_score = clamp_unit(
                weights.semantic * semantic
                    + weights.importance * importance
                    + weights.keyword * keyword,
            );
            Some(ScoredCandidate {
                table_name: c.table_name.clone(),
                semantic_score: semantic,
                importance_score: importance,
                keyword_score: keyword,
                final_score,
                is_expanded: c.is_expanded,
                origin_table: c.origin_table.clone(),
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| a.table_name.cmp(&b.table_name))
    });
    scored
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
