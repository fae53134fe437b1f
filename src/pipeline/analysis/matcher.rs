use serde::Serialize;

use crate::catalog::{CatalogEntry, CategoryCatalog};

/// Confidence reported when nothing in the catalog overlaps the text.
pub const NO_MATCH_CONFIDENCE: f64 = 0.2;

const MIN_MATCH_CONFIDENCE: f64 = 0.3;
const MAX_MATCH_CONFIDENCE: f64 = 0.95;
const TOP_N: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCategory {
    pub category_id: String,
    pub score: u32,
}

/// Result of keyword-overlap classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMatch {
    pub category_id: Option<String>,
    pub confidence: f64,
    pub top3: Vec<ScoredCategory>,
}

impl CategoryMatch {
    /// Runner-up ids with a positive score, best match excluded.
    pub fn alternates(&self) -> Vec<String> {
        self.top3
            .iter()
            .skip(1)
            .filter(|s| s.score > 0)
            .map(|s| s.category_id.clone())
            .collect()
    }

    pub fn best_score(&self) -> u32 {
        self.top3.first().map(|s| s.score).unwrap_or(0)
    }

    pub fn runner_up_score(&self) -> u32 {
        self.top3.get(1).map(|s| s.score).unwrap_or(0)
    }
}

/// Sum of keyword hits: 2 for a multi-word keyword, 1 for a single word.
/// `lowered` must already be lowercase.
fn score_keywords<'a>(lowered: &str, keywords: impl IntoIterator<Item = &'a str>) -> u32 {
    keywords
        .into_iter()
        .map(|k| k.to_lowercase())
        .filter(|k| !k.trim().is_empty() && lowered.contains(k.as_str()))
        .map(|k| if k.contains(' ') { 2 } else { 1 })
        .sum()
}

fn score_entry(lowered: &str, entry: &CatalogEntry) -> u32 {
    score_keywords(lowered, entry.keywords.iter().map(String::as_str))
        + score_keywords(lowered, [entry.title.as_str(), entry.description.as_str()])
}

/// Score `text` against every catalog entry and pick the best.
///
/// Confidence is the relative separation between best and runner-up:
/// `clamp((best - second + 1) / (best + 2), 0.3, 0.95)`.
pub fn match_category(text: &str, catalog: &CategoryCatalog) -> CategoryMatch {
    let lowered = text.to_lowercase();

    let mut scored: Vec<ScoredCategory> = catalog
        .entries()
        .iter()
        .map(|entry| ScoredCategory {
            category_id: entry.id.clone(),
            score: score_entry(&lowered, entry),
        })
        .collect();
    // Stable: ties keep catalog order.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(TOP_N);

    let best = match scored.first() {
        Some(best) if best.score > 0 => best,
        _ => {
            return CategoryMatch {
                category_id: None,
                confidence: NO_MATCH_CONFIDENCE,
                top3: scored,
            }
        }
    };

    let best_score = f64::from(best.score);
    let second = f64::from(scored.get(1).map(|s| s.score).unwrap_or(0));
    let confidence = ((best_score - second + 1.0) / (best_score + 2.0))
        .clamp(MIN_MATCH_CONFIDENCE, MAX_MATCH_CONFIDENCE);

    CategoryMatch {
        category_id: Some(best.category_id.clone()),
        confidence,
        top3: scored,
    }
}
