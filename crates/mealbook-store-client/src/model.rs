//! Record types for the shared catalog

use serde::{Deserialize, Serialize};

/// A single recipe in the shared catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    /// Cookbook this recipe came from, if any
    #[serde(default)]
    pub cookbook_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A cookbook recipes can reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookbookEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// One cooking-log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    #[serde(default)]
    pub recipe_id: Option<String>,
    /// Date cooked, RFC 3339
    #[serde(default)]
    pub cooked_at: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The single synchronized aggregate.
///
/// Replaced wholesale on every remote pull and written wholesale on every
/// push (last-writer-wins at document granularity). Unknown fields from the
/// remote copy are ignored and missing fields default, so older and newer
/// app versions can share a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub cookbooks: Vec<CookbookEntry>,
    #[serde(default)]
    pub cuisines: Vec<String>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl CatalogDocument {
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
            && self.cookbooks.is_empty()
            && self.cuisines.is_empty()
            && self.logs.is_empty()
    }
}

/// A shared catalog group.
///
/// `code` is the human-shareable external handle used in invite URLs;
/// `id` is the internal key for all document reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub name: String,
}
