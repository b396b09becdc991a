//! Join module for reportq
//!
//! Join resolution is an ordered merge over table families. The text of each
//! join comes from a catalog that knows how a target family relates to the
//! family immediately before it in the chain.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Source of join clauses for adjacent family pairs
pub trait JoinCatalog {
    /// The join clause that brings `target` into a chain currently ending at `current`
    ///
    /// # Returns
    /// * `Some(String)` with the complete clause (e.g. `LEFT JOIN ... ON ...`)
    /// * `None` if the catalog has no relationship for the pair
    fn join_clause(&self, target: &str, current: &str) -> Option<String>;
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEntry {
    /// Family being joined in
    pub target: String,
    /// Family the chain currently ends at
    pub current: String,
    /// Complete join clause text
    pub clause: String,
}

/// In-memory join catalog keyed by (target, current)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<JoinEntry>", into = "Vec<JoinEntry>")]
pub struct JoinTable {
    entries: HashMap<(String, String), String>,
}

impl JoinTable {
    pub fn new() -> Self {
        JoinTable::default()
    }

    /// Register the clause joining `target` onto `current`
    pub fn insert(&mut self, target: &str, current: &str, clause: &str) {
        self.entries
            .insert((target.to_string(), current.to_string()), clause.to_string());
    }

    pub fn with(mut self, target: &str, current: &str, clause: &str) -> Self {
        self.insert(target, current, clause);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl JoinCatalog for JoinTable {
    fn join_clause(&self, target: &str, current: &str) -> Option<String> {
        self.entries
            .get(&(target.to_string(), current.to_string()))
            .cloned()
    }
}

impl From<Vec<JoinEntry>> for JoinTable {
    fn from(entries: Vec<JoinEntry>) -> Self {
        let mut table = JoinTable::new();
        for entry in entries {
            table.insert(&entry.target, &entry.current, &entry.clause);
        }
        table
    }
}

impl From<JoinTable> for Vec<JoinEntry> {
    fn from(table: JoinTable) -> Self {
        let mut entries: Vec<JoinEntry> = table
            .entries
            .into_iter()
            .map(|((target, current), clause)| JoinEntry {
                target,
                current,
                clause,
            })
            .collect();
        entries.sort_by(|a, b| (&a.current, &a.target).cmp(&(&b.current, &b.target)));
        entries
    }
}
