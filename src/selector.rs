//! Structural selectors (`kind[filter,...]`) over `Symbol` records, and a
//! rename planner that turns a uniquely-resolved selector plus the
//! cross-reference graph's call samples into a serializable `RenamePlan`.

use crate::error::{RenamePlanError, SelectorError};
use crate::model::{Index, Symbol, SymbolKind};
use crate::xref::Graph;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindFilter {
    Any,
    Function,
    Method,
    Type,
}

#[derive(Debug, Clone)]
enum Filter {
    Name(Regex),
    Signature(Regex),
    Receiver(Regex),
    File(Regex),
    StartGe(u32),
    StartLe(u32),
    StartEq(u32),
    EndGe(u32),
    EndLe(u32),
    EndEq(u32),
    Line(u32),
}

/// A parsed `kind[filter,...]` selector.
#[derive(Debug, Clone)]
pub struct Selector {
    kind: KindFilter,
    filters: Vec<Filter>,
    source: String,
}

impl Selector {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, symbol: &Symbol) -> bool {
        let kind_ok = match self.kind {
            KindFilter::Any => true,
            KindFilter::Function => symbol.kind == SymbolKind::FunctionDefinition,
            KindFilter::Method => symbol.kind == SymbolKind::MethodDefinition,
            KindFilter::Type => symbol.kind == SymbolKind::TypeDefinition,
        };
        if !kind_ok {
            return false;
        }
        self.filters.iter().all(|f| filter_matches(f, symbol))
    }
}

fn filter_matches(filter: &Filter, symbol: &Symbol) -> bool {
    match filter {
        Filter::Name(re) => re.is_match(&symbol.name),
        Filter::Signature(re) => symbol.signature.as_deref().is_some_and(|s| re.is_match(s)),
        Filter::Receiver(re) => symbol.receiver.as_deref().is_some_and(|s| re.is_match(s)),
        Filter::File(re) => re.is_match(&symbol.file),
        Filter::StartGe(n) => symbol.start_line >= *n,
        Filter::StartLe(n) => symbol.start_line <= *n,
        Filter::StartEq(n) => symbol.start_line == *n,
        Filter::EndGe(n) => symbol.end_line >= *n,
        Filter::EndLe(n) => symbol.end_line <= *n,
        Filter::EndEq(n) => symbol.end_line == *n,
        Filter::Line(n) => symbol.start_line <= *n && symbol.end_line >= *n,
    }
}

/// Parses a selector of the form `kind` or `kind[filter,filter,...]`.
///
/// `kind` is one of `function_definition`, `method_definition`,
/// `type_definition`, or `*`. Filters are comma-separated, with commas
/// inside `/regex/` delimiters not treated as separators.
pub fn parse(input: &str) -> Result<Selector, SelectorError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SelectorError::InvalidSelector {
            input: input.to_string(),
            message: "selector is empty".to_string(),
        });
    }

    let (kind_part, filters_part) = match input.find('[') {
        None => (input, None),
        Some(open) => {
            if !input.ends_with(']') {
                return Err(SelectorError::InvalidSelector {
                    input: input.to_string(),
                    message: "unterminated `[`".to_string(),
                });
            }
            (&input[..open], Some(&input[open + 1..input.len() - 1]))
        }
    };

    let kind = match kind_part.trim() {
        "function_definition" => KindFilter::Function,
        "method_definition" => KindFilter::Method,
        "type_definition" => KindFilter::Type,
        "*" => KindFilter::Any,
        other => {
            return Err(SelectorError::InvalidSelector {
                input: input.to_string(),
                message: format!("unrecognized kind `{other}`"),
            })
        }
    };

    let mut filters = Vec::new();
    if let Some(raw) = filters_part {
        for token in split_respecting_regex(raw) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            filters.push(parse_filter(token)?);
        }
    }

    Ok(Selector {
        kind,
        filters,
        source: input.to_string(),
    })
}

fn split_respecting_regex(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_regex = false;
    for c in raw.chars() {
        match c {
            '/' => {
                in_regex = !in_regex;
                current.push(c);
            }
            ',' if !in_regex => {
                out.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn parse_filter(token: &str) -> Result<Filter, SelectorError> {
    let invalid = || SelectorError::InvalidSelector {
        input: token.to_string(),
        message: "unrecognized filter syntax".to_string(),
    };

    for (key, ctor) in [
        ("name", Filter::Name as fn(Regex) -> Filter),
        ("signature", Filter::Signature as fn(Regex) -> Filter),
        ("receiver", Filter::Receiver as fn(Regex) -> Filter),
        ("file", Filter::File as fn(Regex) -> Filter),
    ] {
        let prefix = format!("{key}=/");
        if let Some(rest) = token.strip_prefix(&prefix) {
            let pattern = rest.strip_suffix('/').ok_or_else(invalid)?;
            let re = Regex::new(pattern).map_err(|_| invalid())?;
            return Ok(ctor(re));
        }
    }

    if let Some(rest) = token.strip_prefix("line=") {
        let n: u32 = rest.parse().map_err(|_| invalid())?;
        return Ok(Filter::Line(n));
    }

    for (field, mk_ge, mk_le, mk_eq) in [
        ("start", Filter::StartGe as fn(u32) -> Filter, Filter::StartLe as fn(u32) -> Filter, Filter::StartEq as fn(u32) -> Filter),
        ("end", Filter::EndGe as fn(u32) -> Filter, Filter::EndLe as fn(u32) -> Filter, Filter::EndEq as fn(u32) -> Filter),
    ] {
        if let Some(rest) = token.strip_prefix(&format!("{field}>=")) {
            return rest.parse().map(mk_ge).map_err(|_| invalid());
        }
        if let Some(rest) = token.strip_prefix(&format!("{field}<=")) {
            return rest.parse().map(mk_le).map_err(|_| invalid());
        }
        if let Some(rest) = token.strip_prefix(&format!("{field}=")) {
            return rest.parse().map(mk_eq).map_err(|_| invalid());
        }
    }

    Err(invalid())
}

/// Evaluates `selector` against every symbol in `index`, in file-then-source
/// order.
pub fn evaluate<'a>(index: &'a Index, selector: &Selector) -> Vec<&'a Symbol> {
    let mut out = Vec::new();
    for file in &index.files {
        for symbol in &file.symbols {
            if selector.matches(symbol) {
                out.push(symbol);
            }
        }
    }
    out
}

/// A single textual edit produced by the rename planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameEdit {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub old_text: String,
    pub new_text: String,
    pub is_definition: bool,
}

/// A structured, serializable rename plan. Planning never mutates source; a
/// caller applies `edits` (or not) after inspecting them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenamePlan {
    pub selector: String,
    pub target_name: String,
    pub new_name: String,
    pub edits: Vec<RenameEdit>,
}

/// Plans a rename of the single definition `selector` uniquely resolves to,
/// to `new_name`, rewriting the definition site and every call site the
/// cross-reference graph attributes to it.
pub fn plan_rename(
    index: &Index,
    graph: &Graph,
    selector: &Selector,
    new_name: &str,
) -> Result<RenamePlan, RenamePlanError> {
    let matches = evaluate(index, selector);
    let target = match matches.as_slice() {
        [] => {
            return Err(RenamePlanError::NoTarget {
                selector: selector.source().to_string(),
            })
        }
        [single] => single,
        _ => {
            return Err(RenamePlanError::AmbiguousTarget {
                selector: selector.source().to_string(),
                count: matches.len(),
            })
        }
    };

    let def = graph
        .definitions()
        .iter()
        .find(|d| d.file == target.file && d.kind == target.kind && d.name == target.name && d.start_line == target.start_line)
        .ok_or_else(|| RenamePlanError::NoTarget {
            selector: selector.source().to_string(),
        })?;

    let mut edits = vec![RenameEdit {
        file: target.file.clone(),
        line: target.start_line,
        column: target.start_column,
        old_text: target.name.clone(),
        new_text: new_name.to_string(),
        is_definition: true,
    }];

    for edge in graph.incoming_edges(def.id) {
        for sample in &edge.samples {
            edits.push(RenameEdit {
                file: sample.file.clone(),
                line: sample.line,
                column: sample.column,
                old_text: sample.name.clone(),
                new_text: new_name.to_string(),
                is_definition: false,
            });
        }
    }

    edits.sort_by(|a, b| (a.file.as_str(), a.line, a.column).cmp(&(b.file.as_str(), b.line, b.column)));
    edits.dedup();

    Ok(RenamePlan {
        selector: selector.source().to_string(),
        target_name: target.name.clone(),
        new_name: new_name.to_string(),
        edits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn bare_kind_selector_matches_only_that_kind() {
        let selector = parse("function_definition").unwrap();
        let fun = Symbol {
            file: "a.go".into(),
            kind: SymbolKind::FunctionDefinition,
            name: "Foo".into(),
            signature: None,
            receiver: None,
            start_line: 1,
            end_line: 3,
            start_column: 0,
            end_column: 1,
        };
        let typ = Symbol {
            kind: SymbolKind::TypeDefinition,
            ..fun.clone()
        };
        assert!(selector.matches(&fun));
        assert!(!selector.matches(&typ));
    }

    #[test]
    fn name_regex_filter_narrows_matches() {
        let selector = parse("function_definition[name=/^Handle/]").unwrap();
        let matching = Symbol {
            file: "a.go".into(),
            kind: SymbolKind::FunctionDefinition,
            name: "HandleRequest".into(),
            signature: None,
            receiver: None,
            start_line: 1,
            end_line: 3,
            start_column: 0,
            end_column: 1,
        };
        let other = Symbol { name: "Other".into(), ..matching.clone() };
        assert!(selector.matches(&matching));
        assert!(!selector.matches(&other));
    }

    #[test]
    fn line_range_filters_combine_with_and_semantics() {
        let selector = parse("*[start>=10,end<=20]").unwrap();
        let inside = Symbol {
            file: "a.go".into(),
            kind: SymbolKind::FunctionDefinition,
            name: "F".into(),
            signature: None,
            receiver: None,
            start_line: 10,
            end_line: 20,
            start_column: 0,
            end_column: 1,
        };
        let outside = Symbol { start_line: 5, ..inside.clone() };
        assert!(selector.matches(&inside));
        assert!(!selector.matches(&outside));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(parse("bogus_kind").is_err());
    }

    #[test]
    fn unterminated_bracket_is_rejected() {
        assert!(parse("function_definition[name=/foo/").is_err());
    }

    #[test]
    fn rename_plan_covers_definition_and_all_call_sites() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("main.go"),
            "package main\n\nfunc Target() {}\n\nfunc Caller() {\n\tTarget()\n\tTarget()\n}\n",
        )
        .unwrap();
        let index = IndexBuilder::default().build_path(dir.path()).unwrap();
        let graph = Graph::build(&index);

        let selector = parse("function_definition[name=/^Target$/]").unwrap();
        let plan = plan_rename(&index, &graph, &selector, "Renamed").unwrap();

        assert_eq!(plan.target_name, "Target");
        assert!(plan.edits.iter().any(|e| e.is_definition));
        assert_eq!(plan.edits.iter().filter(|e| !e.is_definition).count(), 2);
    }

    #[test]
    fn rename_plan_rejects_ambiguous_selector() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("main.go"),
            "package main\n\nfunc A() {}\n\nfunc B() {}\n",
        )
        .unwrap();
        let index = IndexBuilder::default().build_path(dir.path()).unwrap();
        let graph = Graph::build(&index);

        let selector = parse("function_definition").unwrap();
        let err = plan_rename(&index, &graph, &selector, "X").unwrap_err();
        assert!(matches!(err, RenamePlanError::AmbiguousTarget { count: 2, .. }));
    }
}
