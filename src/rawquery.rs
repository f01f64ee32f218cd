//! Raw tree-sitter S-expression query mode (spec.md §4.4), offered
//! per-language alongside the structural selector grammar. Queries are
//! compiled lazily, once per distinct language represented in the index; a
//! compile failure is recorded against that language only and silently
//! suppresses output for it — it never fails the whole run, mirroring the
//! per-file `ParseError` quarantine the builder already applies.

use crate::grammar::GrammarRegistry;
use crate::model::Index;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tree_sitter::{Parser, Query, QueryCursor, StreamingIterator};

/// One capture produced by a raw query match.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RawCapture {
    pub file: String,
    pub capture: String,
    pub text: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

/// A language whose raw query failed to compile; its files contributed no
/// captures to this report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LanguageQueryError {
    pub language: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RawQueryReport {
    pub captures: Vec<RawCapture>,
    pub language_errors: Vec<LanguageQueryError>,
}

/// Runs `query_source` against every file in `index` whose language compiles
/// the query, reading source fresh from `root` (the index stores extracted
/// symbols/references, not parse trees, so raw queries reparse on demand).
/// `capture_filter`, if given, restricts output to only those capture names.
pub fn run(
    index: &Index,
    registry: &GrammarRegistry,
    root: &Path,
    query_source: &str,
    capture_filter: Option<&HashSet<String>>,
) -> RawQueryReport {
    let mut captures = Vec::new();
    let mut language_errors: Vec<LanguageQueryError> = Vec::new();
    let mut compiled: HashMap<&str, Result<Query, String>> = HashMap::new();
    let mut failed: HashSet<&str> = HashSet::new();

    for file in &index.files {
        let Some(cap) = registry.capability_by_name(&file.language) else {
            continue;
        };
        if failed.contains(cap.name) {
            continue;
        }

        let query_result = compiled
            .entry(cap.name)
            .or_insert_with(|| Query::new(&cap.language(), query_source).map_err(|e| e.to_string()));

        let query = match query_result {
            Ok(q) => &*q,
            Err(message) => {
                failed.insert(cap.name);
                language_errors.push(LanguageQueryError {
                    language: cap.name.to_string(),
                    message: message.clone(),
                });
                continue;
            }
        };

        let abs = root.join(&file.path);
        let Ok(source) = std::fs::read(&abs) else {
            continue;
        };
        let mut parser = Parser::new();
        if parser.set_language(&cap.language()).is_err() {
            continue;
        }
        let Some(tree) = parser.parse(&source, None) else {
            continue;
        };

        let names = query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source.as_slice());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let cname = names[capture.index as usize];
                if let Some(filter) = capture_filter {
                    if !filter.contains(cname) {
                        continue;
                    }
                }
                let node = capture.node;
                let text = node.utf8_text(&source).unwrap_or("").to_string();
                let start = node.start_position();
                let end = node.end_position();
                captures.push(RawCapture {
                    file: file.path.clone(),
                    capture: cname.to_string(),
                    text,
                    start_line: start.row as u32 + 1,
                    end_line: end.row as u32 + 1,
                    start_column: start.column as u32 + 1,
                    end_column: end.column as u32 + 1,
                });
            }
        }
    }

    captures.sort_by(|a, b| {
        (a.file.as_str(), a.start_line, a.start_column).cmp(&(b.file.as_str(), b.start_line, b.start_column))
    });

    RawQueryReport {
        captures,
        language_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn raw_query_captures_named_nodes_across_one_language() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main\n\nfunc A() {}\n\nfunc B() {}\n").unwrap();

        let registry = GrammarRegistry::builtin();
        let index = IndexBuilder::new(GrammarRegistry::builtin()).build_path(dir.path()).unwrap();

        let report = run(
            &index,
            &registry,
            dir.path(),
            "(function_declaration name: (identifier) @fn.name)",
            None,
        );
        assert_eq!(report.captures.len(), 2);
        assert!(report.captures.iter().all(|c| c.capture == "fn.name"));
        assert_eq!(report.language_errors.len(), 0);
    }

    #[test]
    fn capture_filter_restricts_output() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main\n\nfunc A() {}\n").unwrap();

        let registry = GrammarRegistry::builtin();
        let index = IndexBuilder::new(GrammarRegistry::builtin()).build_path(dir.path()).unwrap();

        let mut filter = HashSet::new();
        filter.insert("nope".to_string());
        let report = run(
            &index,
            &registry,
            dir.path(),
            "(function_declaration name: (identifier) @fn.name)",
            Some(&filter),
        );
        assert!(report.captures.is_empty());
    }

    #[test]
    fn invalid_query_is_recorded_against_its_language_only_and_does_not_panic() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main\n\nfunc A() {}\n").unwrap();
        fs::write(dir.path().join("b.py"), "def b():\n    pass\n").unwrap();

        let registry = GrammarRegistry::builtin();
        let index = IndexBuilder::new(GrammarRegistry::builtin()).build_path(dir.path()).unwrap();

        // Valid S-expression syntax but a node kind that exists in Go, not Python.
        let report = run(
            &index,
            &registry,
            dir.path(),
            "(function_declaration name: (identifier) @fn.name)",
            None,
        );
        assert_eq!(report.captures.len(), 1);
        assert_eq!(report.language_errors.len(), 1);
        assert_eq!(report.language_errors[0].language, "python");
    }
}
