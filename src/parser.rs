//! Parser Adapter: turns source bytes into an ordered sequence of
//! `Symbol`/`Reference`/import records for one file, via the Grammar
//! Registry's structural-tag query.
//!
//! One generic capture-walking routine serves every language; per-language
//! behavior lives entirely in the `.scm` query text the registry loads, not
//! in bespoke Rust per language.

use crate::grammar::LanguageCapability;
use crate::model::{FileSummary, Reference, Symbol, SymbolKind};
use std::collections::HashSet;
use tree_sitter::{Node, Parser, Point, StreamingIterator, Tree};

/// A successful parse: the `FileSummary` plus the tree it was derived from,
/// handed back to the caller so a watch session can seed the next
/// incremental re-parse.
pub struct ParsedFile {
    pub summary: FileSummary,
    pub tree: Tree,
}

fn make_parser(cap: &LanguageCapability) -> Result<Parser, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&cap.language())
        .map_err(|e| format!("setting language for {}: {e}", cap.name))?;
    Ok(parser)
}

fn point_at(source: &[u8], byte_offset: usize) -> Point {
    let mut row = 0usize;
    let mut col = 0usize;
    for &b in &source[..byte_offset.min(source.len())] {
        if b == b'\n' {
            row += 1;
            col = 0;
        } else {
            col += 1;
        }
    }
    Point { row, column: col }
}

/// A minimal byte-level diff between two source buffers, expressed as the
/// `tree_sitter::InputEdit` tree-sitter needs to reuse a prior tree.
fn diff_edit(prior: &[u8], new: &[u8]) -> tree_sitter::InputEdit {
    let max_common = prior.len().min(new.len());
    let mut prefix = 0;
    while prefix < max_common && prior[prefix] == new[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < max_common - prefix
        && prior[prior.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }
    let start_byte = prefix;
    let old_end_byte = prior.len() - suffix;
    let new_end_byte = new.len() - suffix;
    tree_sitter::InputEdit {
        start_byte,
        old_end_byte,
        new_end_byte,
        start_position: point_at(prior, start_byte),
        old_end_position: point_at(prior, old_end_byte),
        new_end_position: point_at(new, new_end_byte),
    }
}

fn clean_import_text(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '<' || c == '>')
        .to_string()
}

fn is_within(node: &Node, ancestor_kinds: &[&str]) -> bool {
    if ancestor_kinds.is_empty() {
        return false;
    }
    let mut cur = node.parent();
    while let Some(n) = cur {
        if ancestor_kinds.contains(&n.kind()) {
            return true;
        }
        cur = n.parent();
    }
    false
}

struct Extracted {
    symbols: Vec<Symbol>,
    references: Vec<Reference>,
    imports: Vec<String>,
}

fn extract(
    cap: &LanguageCapability,
    query: &tree_sitter::Query,
    tree: &Tree,
    source: &[u8],
    rel_path: &str,
) -> Extracted {
    let mut symbols = Vec::new();
    let mut references = Vec::new();
    let mut imports_raw: Vec<(usize, String)> = Vec::new();

    let names = query.capture_names();
    let mut cursor = tree_sitter::QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    while let Some(m) = matches.next() {
        let mut outer: Option<(&str, Node)> = None;
        let mut name_node: Option<Node> = None;
        let mut signature_node: Option<Node> = None;
        let mut receiver_node: Option<Node> = None;
        let mut import_node: Option<Node> = None;

        for capture in m.captures {
            let cname = names[capture.index as usize];
            match cname {
                "name" => name_node = Some(capture.node),
                "signature" => signature_node = Some(capture.node),
                "receiver" => receiver_node = Some(capture.node),
                "import" => import_node = Some(capture.node),
                other if other.starts_with("definition.") || other.starts_with("reference.") => {
                    outer = Some((other, capture.node))
                }
                _ => {}
            }
        }

        if let Some(node) = import_node {
            if let Ok(text) = node.utf8_text(source) {
                imports_raw.push((node.start_byte(), clean_import_text(text)));
            }
            continue;
        }

        let Some((tag, outer_node)) = outer else {
            continue;
        };
        let Some(name_node) = name_node else { continue };
        let Ok(name) = name_node.utf8_text(source) else {
            continue;
        };

        let start = outer_node.start_position();
        let end = outer_node.end_position();
        let span = (
            start.row as u32 + 1,
            end.row as u32 + 1,
            start.column as u32 + 1,
            end.column as u32 + 1,
        );

        if let Some(suffix) = tag.strip_prefix("definition.") {
            let mut kind = match SymbolKind::from_tag(suffix) {
                Some(k) => k,
                None => continue,
            };
            if kind == SymbolKind::FunctionDefinition
                && is_within(&outer_node, cap.method_container_kinds)
            {
                kind = SymbolKind::MethodDefinition;
            }
            symbols.push(Symbol {
                file: rel_path.to_string(),
                kind,
                name: name.to_string(),
                signature: signature_node.and_then(|n| n.utf8_text(source).ok()).map(String::from),
                receiver: receiver_node.and_then(|n| n.utf8_text(source).ok()).map(String::from),
                start_line: span.0,
                end_line: span.1,
                start_column: span.2,
                end_column: span.3,
            });
        } else if let Some(suffix) = tag.strip_prefix("reference.") {
            references.push(Reference {
                file: rel_path.to_string(),
                kind: format!("reference.{suffix}"),
                name: name.to_string(),
                start_line: span.0,
                end_line: span.1,
                start_column: span.2,
                end_column: span.3,
            });
        }
    }

    symbols.sort_by(Symbol::source_order);
    references.sort_by(Reference::source_order);

    imports_raw.sort_by_key(|(byte, _)| *byte);
    let mut seen = HashSet::new();
    let mut imports = Vec::new();
    for (_, text) in imports_raw {
        if seen.insert(text.clone()) {
            imports.push(text);
        }
    }

    Extracted {
        symbols,
        references,
        imports,
    }
}

/// Parses `source` from scratch under `cap`, with no prior tree to reuse.
pub fn parse(
    cap: &LanguageCapability,
    rel_path: &str,
    source: &[u8],
    size_bytes: u64,
    mod_time_unix_nano: u64,
) -> Result<ParsedFile, String> {
    let mut parser = make_parser(cap)?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| format!("{rel_path}: tree-sitter produced no tree (cancelled?)"))?;
    let query = cap
        .compile_tags_query()
        .map_err(|e| format!("{rel_path}: {e}"))?;
    let extracted = extract(cap, &query, &tree, source, rel_path);

    Ok(ParsedFile {
        summary: FileSummary {
            path: rel_path.to_string(),
            language: cap.name.to_string(),
            size_bytes,
            mod_time_unix_nano,
            imports: extracted.imports,
            symbols: extracted.symbols,
            references: extracted.references,
        },
        tree,
    })
}

/// Re-parses `new_source` by editing `prior_tree` with the byte-level diff
/// against `prior_source`, instead of parsing from scratch. Equivalent, by
/// construction, to `parse` on the post-edit bytes.
pub fn parse_incremental(
    cap: &LanguageCapability,
    rel_path: &str,
    prior_source: &[u8],
    prior_tree: &Tree,
    new_source: &[u8],
    size_bytes: u64,
    mod_time_unix_nano: u64,
) -> Result<ParsedFile, String> {
    let mut seed = prior_tree.clone();
    let edit = diff_edit(prior_source, new_source);
    seed.edit(&edit);

    let mut parser = make_parser(cap)?;
    let tree = parser
        .parse(new_source, Some(&seed))
        .ok_or_else(|| format!("{rel_path}: tree-sitter produced no tree (cancelled?)"))?;
    let query = cap
        .compile_tags_query()
        .map_err(|e| format!("{rel_path}: {e}"))?;
    let extracted = extract(cap, &query, &tree, new_source, rel_path);

    Ok(ParsedFile {
        summary: FileSummary {
            path: rel_path.to_string(),
            language: cap.name.to_string(),
            size_bytes,
            mod_time_unix_nano,
            imports: extracted.imports,
            symbols: extracted.symbols,
            references: extracted.references,
        },
        tree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarRegistry;

    #[test]
    fn parses_single_go_function() {
        let registry = GrammarRegistry::builtin();
        let cap = registry.capability_by_name("go").unwrap();
        let source = b"package main\n\nfunc A() {}\n";
        let parsed = parse(cap, "main.go", source, source.len() as u64, 1).unwrap();
        assert_eq!(parsed.summary.symbols.len(), 1);
        let sym = &parsed.summary.symbols[0];
        assert_eq!(sym.kind, SymbolKind::FunctionDefinition);
        assert_eq!(sym.name, "A");
        assert_eq!(sym.start_line, 3);
    }

    #[test]
    fn parses_go_method_with_receiver() {
        let registry = GrammarRegistry::builtin();
        let cap = registry.capability_by_name("go").unwrap();
        let source = b"package main\n\ntype T struct{}\n\nfunc (t *T) M() {}\n";
        let parsed = parse(cap, "t.go", source, source.len() as u64, 1).unwrap();
        let method = parsed
            .summary
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::MethodDefinition)
            .expect("method symbol");
        assert_eq!(method.name, "M");
        assert_eq!(method.receiver.as_deref(), Some("T"));
    }

    #[test]
    fn parses_go_imports_in_source_order() {
        let registry = GrammarRegistry::builtin();
        let cap = registry.capability_by_name("go").unwrap();
        let source = b"package main\n\nimport (\n\t\"fmt\"\n\t\"os\"\n)\n\nfunc A() {}\n";
        let parsed = parse(cap, "main.go", source, source.len() as u64, 1).unwrap();
        assert_eq!(parsed.summary.imports, vec!["fmt".to_string(), "os".to_string()]);
    }

    #[test]
    fn parses_python_method_inside_class() {
        let registry = GrammarRegistry::builtin();
        let cap = registry.capability_by_name("python").unwrap();
        let source = b"class Foo:\n    def bar(self):\n        pass\n";
        let parsed = parse(cap, "foo.py", source, source.len() as u64, 1).unwrap();
        let method = parsed
            .summary
            .symbols
            .iter()
            .find(|s| s.name == "bar")
            .expect("bar symbol");
        assert_eq!(method.kind, SymbolKind::MethodDefinition);
    }

    #[test]
    fn sub_file_incremental_matches_from_scratch_parse() {
        let registry = GrammarRegistry::builtin();
        let cap = registry.capability_by_name("go").unwrap();
        let before = b"package main\n\nfunc A() {}\n".to_vec();
        let after = b"package main\n\nfunc A() {}\n\nfunc B() {}\n".to_vec();

        let first = parse(cap, "main.go", &before, before.len() as u64, 1).unwrap();
        let incremental = parse_incremental(
            cap,
            "main.go",
            &before,
            &first.tree,
            &after,
            after.len() as u64,
            2,
        )
        .unwrap();
        let from_scratch = parse(cap, "main.go", &after, after.len() as u64, 2).unwrap();

        assert_eq!(incremental.summary.symbols, from_scratch.summary.symbols);
        assert_eq!(
            incremental.summary.references,
            from_scratch.summary.references
        );
    }
}
