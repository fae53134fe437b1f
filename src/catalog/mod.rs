//! Closed EPA category catalog.
//!
//! The catalog is loaded once at startup into an immutable [`CategoryCatalog`]
//! and passed by reference to the matcher, the external prompt builder and the
//! workflow. It is never mutated after construction.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bundled default catalog.
const BUNDLED_CATALOG: &str = include_str!("../../resources/epas.json");

/// Bundled example transcripts, served to the UI and used as fixtures.
const BUNDLED_EXAMPLES: &str = include_str!("../../resources/example_transcripts.json");

/// Label shown when a draft carries no category.
pub const UNMATCHED_LABEL: &str = "Not confidently matched";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog JSON is invalid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog entry #{0} has an empty id")]
    EmptyId(usize),

    #[error("Duplicate catalog id: {0}")]
    DuplicateId(String),

    #[error("Catalog file could not be read: {0}")]
    Io(#[from] std::io::Error),
}

/// One category of the closed taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Immutable table of catalog entries in file order.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    entries: Vec<CatalogEntry>,
}

impl CategoryCatalog {
    /// Build a catalog, rejecting empty and duplicate ids.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for (i, entry) in entries.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(CatalogError::EmptyId(i));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
        }
        Ok(Self { entries })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn load_file(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load from `path` when given, else the bundled catalog.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let catalog = match path {
            Some(p) => Self::load_file(p)?,
            None => Self::bundled()?,
        };
        tracing::info!(entries = catalog.len(), custom = path.is_some(), "Catalog loaded");
        Ok(catalog)
    }

    /// Entries in file order. The matcher scores in this order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Entries sorted by id, for presentation and prompt building.
    pub fn sorted(&self) -> Vec<&CatalogEntry> {
        let mut sorted: Vec<&CatalogEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Human label for a category id: `"<id> — <title>"`, the bare id when
    /// unknown, or [`UNMATCHED_LABEL`] when there is no id.
    pub fn label(&self, id: Option<&str>) -> String {
        match id {
            None => UNMATCHED_LABEL.to_string(),
            Some(id) => match self.get(id) {
                Some(entry) => format!("{} — {}", entry.id, entry.title),
                None => id.to_string(),
            },
        }
    }
}

/// A sample attending-resident conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleTranscript {
    pub id: String,
    pub label: String,
    pub expected_category: String,
    pub transcript: String,
}

pub fn example_transcripts() -> Result<Vec<ExampleTranscript>, CatalogError> {
    Ok(serde_json::from_str(BUNDLED_EXAMPLES)?)
}
