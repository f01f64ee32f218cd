//! The index data model: `Index`, `FileSummary`, `Symbol`, `Reference`,
//! `ParseError`, and the watch-session state that sub-file incremental
//! re-parse is keyed on.
//!
//! Field order matches declaration order below; `serde_json` preserves
//! struct-field order for objects, which is what gives the persisted JSON
//! its deterministic key order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tree_sitter::Tree;

/// Current schema major version. `load` refuses a document whose major
/// differs from this.
pub const SCHEMA_VERSION: &str = "1.0";

fn schema_major(version: &str) -> u32 {
    version
        .split('.')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

pub fn schema_major_matches(version: &str) -> bool {
    schema_major(version) == schema_major(SCHEMA_VERSION)
}

/// The closed set of definition kinds a structural-tag query can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    FunctionDefinition,
    MethodDefinition,
    TypeDefinition,
    ClassDefinition,
    VariableDefinition,
    ConstantDefinition,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::FunctionDefinition => "function_definition",
            SymbolKind::MethodDefinition => "method_definition",
            SymbolKind::TypeDefinition => "type_definition",
            SymbolKind::ClassDefinition => "class_definition",
            SymbolKind::VariableDefinition => "variable_definition",
            SymbolKind::ConstantDefinition => "constant_definition",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "function" => Some(SymbolKind::FunctionDefinition),
            "method" => Some(SymbolKind::MethodDefinition),
            "type" | "interface" => Some(SymbolKind::TypeDefinition),
            "class" => Some(SymbolKind::ClassDefinition),
            "variable" => Some(SymbolKind::VariableDefinition),
            "constant" => Some(SymbolKind::ConstantDefinition),
            _ => None,
        }
    }

    /// A symbol is callable iff it can be the target of a `reference.call`.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            SymbolKind::FunctionDefinition | SymbolKind::MethodDefinition
        )
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named definition extracted from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub file: String,
    pub kind: SymbolKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

impl Symbol {
    /// Source-order comparator: ascending `start_line`, ties by `start_column`.
    pub fn source_order(a: &Symbol, b: &Symbol) -> std::cmp::Ordering {
        a.start_line
            .cmp(&b.start_line)
            .then(a.start_column.cmp(&b.start_column))
    }
}

/// A named reference (call site or otherwise) extracted from one file.
///
/// `kind` starts with `reference.`; call sites carry `reference.call`. Per
/// the reference-kind open question, any other `reference.*` suffix is
/// carried opaquely and never participates in call resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub file: String,
    pub kind: String,
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

pub const REFERENCE_CALL_KIND: &str = "reference.call";

impl Reference {
    pub fn is_call(&self) -> bool {
        self.kind == REFERENCE_CALL_KIND
    }

    pub fn source_order(a: &Reference, b: &Reference) -> std::cmp::Ordering {
        a.start_line
            .cmp(&b.start_line)
            .then(a.start_column.cmp(&b.start_column))
    }
}

/// A per-file parse failure. Presence implies this path carries no symbols
/// or references in the enclosing `Index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    pub path: String,
    pub error: String,
}

/// Everything extracted from one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub language: String,
    pub size_bytes: u64,
    pub mod_time_unix_nano: u64,
    pub imports: Vec<String>,
    pub symbols: Vec<Symbol>,
    pub references: Vec<Reference>,
}

impl FileSummary {
    /// The `{size_bytes, mod_time_unix_nano}` freshness key used by
    /// full-scan incremental reuse.
    pub fn freshness_key(&self) -> (u64, u64) {
        (self.size_bytes, self.mod_time_unix_nano)
    }
}

/// The top-level, persisted index artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub version: String,
    pub root: PathBuf,
    pub generated_at: String,
    pub files: Vec<FileSummary>,
    pub errors: Vec<ParseError>,
}

impl Index {
    pub fn sort(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        self.errors.sort_by(|a, b| a.path.cmp(&b.path));
    }

    pub fn file(&self, path: &str) -> Option<&FileSummary> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }
}

/// Statistics returned alongside an incremental (re)build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub parsed: usize,
    pub reused: usize,
    pub candidates: usize,
}

/// One entry of `WatchState`: the prior `(source, tree)` pair a sub-file
/// incremental re-parse reuses, plus the language it was parsed under.
///
/// The tree borrows from `source` by byte offset (a cyclic reference in
/// spirit); the two are therefore always replaced together, and the old
/// tree is dropped before the new pair is installed. Not `Send`/`Sync` —
/// exclusively owned by the `Builder` for the duration of a watch session.
pub struct WatchEntry {
    pub source: Vec<u8>,
    pub tree: Tree,
    pub language: String,
}

/// Per-session, Builder-exclusive watch state. Never serialized; released
/// (dropping every held tree) at the end of a watch session.
#[derive(Default)]
pub struct WatchState {
    entries: HashMap<String, WatchEntry>,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&WatchEntry> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: String, entry: WatchEntry) {
        self.entries.insert(path, entry);
    }

    pub fn remove(&mut self, path: &str) {
        self.entries.remove(path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_major_matches_same_major_different_minor() {
        assert!(schema_major_matches("1.0"));
        assert!(schema_major_matches("1.7"));
        assert!(!schema_major_matches("2.0"));
        assert!(!schema_major_matches("0.9"));
    }

    #[test]
    fn symbol_kind_round_trips_through_tag() {
        for (tag, kind) in [
            ("function", SymbolKind::FunctionDefinition),
            ("method", SymbolKind::MethodDefinition),
            ("type", SymbolKind::TypeDefinition),
            ("class", SymbolKind::ClassDefinition),
            ("variable", SymbolKind::VariableDefinition),
            ("constant", SymbolKind::ConstantDefinition),
        ] {
            assert_eq!(SymbolKind::from_tag(tag), Some(kind));
        }
        assert_eq!(SymbolKind::from_tag("bogus"), None);
    }

    #[test]
    fn only_function_and_method_are_callable() {
        assert!(SymbolKind::FunctionDefinition.is_callable());
        assert!(SymbolKind::MethodDefinition.is_callable());
        assert!(!SymbolKind::TypeDefinition.is_callable());
        assert!(!SymbolKind::ClassDefinition.is_callable());
    }

    #[test]
    fn index_file_lookup_requires_sorted_files() {
        let mut idx = Index {
            version: SCHEMA_VERSION.to_string(),
            root: PathBuf::from("/tmp/repo"),
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            files: vec![
                FileSummary {
                    path: "b.go".to_string(),
                    language: "go".to_string(),
                    size_bytes: 1,
                    mod_time_unix_nano: 1,
                    imports: vec![],
                    symbols: vec![],
                    references: vec![],
                },
                FileSummary {
                    path: "a.go".to_string(),
                    language: "go".to_string(),
                    size_bytes: 1,
                    mod_time_unix_nano: 1,
                    imports: vec![],
                    symbols: vec![],
                    references: vec![],
                },
            ],
            errors: vec![],
        };
        idx.sort();
        assert_eq!(idx.files[0].path, "a.go");
        assert!(idx.file("a.go").is_some());
        assert!(idx.file("missing.go").is_none());
    }

    #[test]
    fn serialized_symbol_field_order_matches_declaration() {
        let sym = Symbol {
            file: "a.go".to_string(),
            kind: SymbolKind::FunctionDefinition,
            name: "A".to_string(),
            signature: None,
            receiver: None,
            start_line: 3,
            end_line: 5,
            start_column: 1,
            end_column: 2,
        };
        let json = serde_json::to_string(&sym).unwrap();
        let file_pos = json.find("\"file\"").unwrap();
        let kind_pos = json.find("\"kind\"").unwrap();
        let name_pos = json.find("\"name\"").unwrap();
        assert!(file_pos < kind_pos && kind_pos < name_pos);
        assert!(!json.contains("signature"));
    }
}
