//! Cross-Reference Graph: callable definitions, enclosing-callable
//! resolution, and the four-level (file → package → import → global) call
//! resolution ladder, built in one immutable pass over an `Index`.

use crate::model::{Index, Reference, SymbolKind};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use tracing::debug;

fn package_of(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => path[..i].to_string(),
        None => ".".to_string(),
    }
}

fn trailing_segment(import: &str) -> &str {
    import
        .rsplit(['/', '.'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(import)
}

fn definition_id(file: &str, kind: SymbolKind, name: &str, start_line: u32) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    file.hash(&mut hasher);
    kind.as_str().hash(&mut hasher);
    name.hash(&mut hasher);
    start_line.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub id: u64,
    pub file: String,
    pub package: String,
    pub kind: SymbolKind,
    pub name: String,
    pub signature: Option<String>,
    pub receiver: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    pub callable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSample {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    File,
    Package,
    Import,
    Global,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::File => "file",
            Resolution::Package => "package",
            Resolution::Import => "import",
            Resolution::Global => "global",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub caller_id: u64,
    pub callee_id: u64,
    pub count: u32,
    pub resolution: Resolution,
    pub samples: Vec<CallSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    OutsideCallable,
    AmbiguousFile,
    AmbiguousPackage,
    AmbiguousImport,
    AmbiguousGlobal,
    NotFound,
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::OutsideCallable => "outside_callable",
            UnresolvedReason::AmbiguousFile => "ambiguous_file",
            UnresolvedReason::AmbiguousPackage => "ambiguous_package",
            UnresolvedReason::AmbiguousImport => "ambiguous_import",
            UnresolvedReason::AmbiguousGlobal => "ambiguous_global",
            UnresolvedReason::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedCall {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub name: String,
    pub reason: UnresolvedReason,
    pub candidate_count: Option<usize>,
}

pub struct WalkResult {
    pub roots: Vec<u64>,
    pub nodes: Vec<u64>,
    pub edges: Vec<(u64, u64)>,
    pub depth: usize,
    pub reverse: bool,
}

/// The immutable cross-reference graph derived from one `Index`.
pub struct Graph {
    definitions: Vec<Definition>,
    by_id: HashMap<u64, usize>,
    edges: Vec<Edge>,
    unresolved: Vec<UnresolvedCall>,
    incoming_by_callee: HashMap<u64, Vec<usize>>,
    outgoing_by_caller: HashMap<u64, Vec<usize>>,
}

impl Graph {
    pub fn build(index: &Index) -> Self {
        let mut definitions = Vec::new();
        for file in &index.files {
            let package = package_of(&file.path);
            for sym in &file.symbols {
                definitions.push(Definition {
                    id: definition_id(&sym.file, sym.kind, &sym.name, sym.start_line),
                    file: sym.file.clone(),
                    package: package.clone(),
                    kind: sym.kind,
                    name: sym.name.clone(),
                    signature: sym.signature.clone(),
                    receiver: sym.receiver.clone(),
                    start_line: sym.start_line,
                    end_line: sym.end_line,
                    start_column: sym.start_column,
                    end_column: sym.end_column,
                    callable: sym.kind.is_callable(),
                });
            }
        }

        let mut by_id = HashMap::with_capacity(definitions.len());
        let mut callables_by_file_name: HashMap<(String, String), Vec<usize>> = HashMap::new();
        let mut callables_by_package_name: HashMap<(String, String), Vec<usize>> = HashMap::new();
        let mut callables_by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut callables_by_file: HashMap<String, Vec<usize>> = HashMap::new();
        let mut packages_last_segment: HashMap<String, Vec<String>> = HashMap::new();

        for (i, def) in definitions.iter().enumerate() {
            by_id.insert(def.id, i);
            if def.callable {
                callables_by_file_name
                    .entry((def.file.clone(), def.name.clone()))
                    .or_default()
                    .push(i);
                callables_by_package_name
                    .entry((def.package.clone(), def.name.clone()))
                    .or_default()
                    .push(i);
                callables_by_name.entry(def.name.clone()).or_default().push(i);
                callables_by_file.entry(def.file.clone()).or_default().push(i);
            }
        }
        for idxs in callables_by_file.values_mut() {
            idxs.sort_by_key(|&i| definitions[i].start_line);
        }
        for def in &definitions {
            if def.callable {
                let last = trailing_segment(&def.package).to_string();
                let bucket = packages_last_segment.entry(last).or_default();
                if !bucket.contains(&def.package) {
                    bucket.push(def.package.clone());
                }
            }
        }

        let mut imports_by_file: HashMap<&str, &[String]> = HashMap::new();
        for file in &index.files {
            imports_by_file.insert(file.path.as_str(), file.imports.as_slice());
        }

        let mut edges: Vec<Edge> = Vec::new();
        let mut edge_index: HashMap<(u64, u64), usize> = HashMap::new();
        let mut unresolved = Vec::new();

        for file in &index.files {
            let callables_here = callables_by_file.get(file.path.as_str());
            for reference in &file.references {
                if !reference.is_call() {
                    continue;
                }
                let caller = enclosing_callable(reference, callables_here, &definitions);
                let Some(caller_idx) = caller else {
                    unresolved.push(UnresolvedCall {
                        file: file.path.clone(),
                        line: reference.start_line,
                        column: reference.start_column,
                        name: reference.name.clone(),
                        reason: UnresolvedReason::OutsideCallable,
                        candidate_count: None,
                    });
                    continue;
                };
                let caller_def = &definitions[caller_idx];
                let caller_package = caller_def.package.clone();
                let caller_id = caller_def.id;

                let resolution = resolve_call(
                    &file.path,
                    &caller_package,
                    &reference.name,
                    imports_by_file.get(file.path.as_str()).copied().unwrap_or(&[]),
                    &callables_by_file_name,
                    &callables_by_package_name,
                    &callables_by_name,
                    &packages_last_segment,
                );

                match resolution {
                    Ok((callee_indices, resolution_level)) => {
                        debug_assert_eq!(callee_indices.len(), 1);
                        let callee_id = definitions[callee_indices[0]].id;
                        let key = (caller_id, callee_id);
                        let sample = CallSample {
                            file: file.path.clone(),
                            line: reference.start_line,
                            column: reference.start_column,
                            kind: reference.kind.clone(),
                            name: reference.name.clone(),
                        };
                        match edge_index.get(&key) {
                            Some(&pos) => {
                                edges[pos].count += 1;
                                if edges[pos].samples.len() < 3 {
                                    edges[pos].samples.push(sample);
                                }
                            }
                            None => {
                                edge_index.insert(key, edges.len());
                                edges.push(Edge {
                                    caller_id,
                                    callee_id,
                                    count: 1,
                                    resolution: resolution_level,
                                    samples: vec![sample],
                                });
                            }
                        }
                    }
                    Err((reason, candidate_count)) => {
                        unresolved.push(UnresolvedCall {
                            file: file.path.clone(),
                            line: reference.start_line,
                            column: reference.start_column,
                            name: reference.name.clone(),
                            reason,
                            candidate_count,
                        });
                    }
                }
            }
        }

        edges.sort_by(|a, b| {
            let ca = &definitions[by_id[&a.caller_id]];
            let cb = &definitions[by_id[&b.caller_id]];
            let ea = &definitions[by_id[&a.callee_id]];
            let eb = &definitions[by_id[&b.callee_id]];
            (ca.file.as_str(), ca.start_line, ca.name.as_str(), ea.file.as_str(), ea.start_line, ea.name.as_str())
                .cmp(&(cb.file.as_str(), cb.start_line, cb.name.as_str(), eb.file.as_str(), eb.start_line, eb.name.as_str()))
        });

        let mut incoming_by_callee: HashMap<u64, Vec<usize>> = HashMap::new();
        let mut outgoing_by_caller: HashMap<u64, Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            incoming_by_callee.entry(edge.callee_id).or_default().push(i);
            outgoing_by_caller.entry(edge.caller_id).or_default().push(i);
        }

        debug!(
            definitions = definitions.len(),
            edges = edges.len(),
            unresolved = unresolved.len(),
            "cross-reference graph built"
        );

        Graph {
            definitions,
            by_id,
            edges,
            unresolved,
            incoming_by_callee,
            outgoing_by_caller,
        }
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn unresolved(&self) -> &[UnresolvedCall] {
        &self.unresolved
    }

    pub fn definition(&self, id: u64) -> Option<&Definition> {
        self.by_id.get(&id).map(|&i| &self.definitions[i])
    }

    pub fn find_definitions(&self, pattern: &str, regex_mode: bool) -> Vec<&Definition> {
        let mut out: Vec<&Definition> = if regex_mode {
            let re = regex::Regex::new(pattern);
            match re {
                Ok(re) => self
                    .definitions
                    .iter()
                    .filter(|d| d.callable && re.is_match(&d.name))
                    .collect(),
                Err(_) => Vec::new(),
            }
        } else {
            self.definitions
                .iter()
                .filter(|d| d.callable && d.name == pattern)
                .collect()
        };
        out.sort_by(|a, b| (a.file.as_str(), a.start_line, a.name.as_str()).cmp(&(b.file.as_str(), b.start_line, b.name.as_str())));
        out
    }

    pub fn incoming_count(&self, id: u64) -> usize {
        self.incoming_by_callee.get(&id).map(|v| v.len()).unwrap_or(0)
    }

    pub fn outgoing_count(&self, id: u64) -> usize {
        self.outgoing_by_caller.get(&id).map(|v| v.len()).unwrap_or(0)
    }

    pub fn incoming_edges(&self, id: u64) -> Vec<&Edge> {
        self.incoming_by_callee
            .get(&id)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    pub fn outgoing_edges(&self, id: u64) -> Vec<&Edge> {
        self.outgoing_by_caller
            .get(&id)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Breadth-first traversal from `roots`, following `outgoing` edges (or
    /// `incoming` when `reverse`), stopping after `depth` hops. `depth <= 0`
    /// clamps to `1`.
    pub fn walk(&self, roots: &[u64], depth: i64, reverse: bool) -> WalkResult {
        let depth = if depth <= 0 { 1 } else { depth as usize };
        let mut visited: Vec<u64> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut edges_out: Vec<(u64, u64)> = Vec::new();
        let mut edges_seen = std::collections::HashSet::new();

        let mut frontier: VecDeque<(u64, usize)> = VecDeque::new();
        for &r in roots {
            if seen.insert(r) {
                visited.push(r);
            }
            frontier.push_back((r, 0));
        }

        while let Some((node, hops)) = frontier.pop_front() {
            if hops >= depth {
                continue;
            }
            let adjacent = if reverse {
                self.incoming_edges(node)
            } else {
                self.outgoing_edges(node)
            };
            for edge in adjacent {
                let next = if reverse { edge.caller_id } else { edge.callee_id };
                let edge_key = (edge.caller_id, edge.callee_id);
                if edges_seen.insert(edge_key) {
                    edges_out.push(edge_key);
                }
                if seen.insert(next) {
                    visited.push(next);
                }
                frontier.push_back((next, hops + 1));
            }
        }

        WalkResult {
            roots: roots.to_vec(),
            nodes: visited,
            edges: edges_out,
            depth,
            reverse,
        }
    }
}

fn enclosing_callable(
    reference: &Reference,
    callables_here: Option<&Vec<usize>>,
    definitions: &[Definition],
) -> Option<usize> {
    let callables = callables_here?;
    let mut best: Option<usize> = None;
    for &idx in callables {
        let def = &definitions[idx];
        if reference.start_line >= def.start_line && reference.start_line <= def.end_line {
            best = Some(match best {
                None => idx,
                Some(cur) => {
                    let cur_def = &definitions[cur];
                    let cur_span = cur_def.end_line - cur_def.start_line;
                    let new_span = def.end_line - def.start_line;
                    if new_span < cur_span {
                        idx
                    } else if new_span == cur_span && def.start_line > cur_def.start_line {
                        idx
                    } else {
                        cur
                    }
                }
            });
        }
    }
    best
}

type ByFileName = HashMap<(String, String), Vec<usize>>;
type ByPackageName = HashMap<(String, String), Vec<usize>>;
type ByName = HashMap<String, Vec<usize>>;
type PackagesBySegment = HashMap<String, Vec<String>>;

#[allow(clippy::too_many_arguments)]
fn resolve_call(
    file: &str,
    package: &str,
    name: &str,
    imports: &[String],
    callables_by_file_name: &ByFileName,
    callables_by_package_name: &ByPackageName,
    callables_by_name: &ByName,
    packages_by_segment: &PackagesBySegment,
) -> Result<(Vec<usize>, Resolution), (UnresolvedReason, Option<usize>)> {
    if let Some(v) = callables_by_file_name.get(&(file.to_string(), name.to_string())) {
        match v.len() {
            0 => {}
            1 => return Ok((v.clone(), Resolution::File)),
            n => return Err((UnresolvedReason::AmbiguousFile, Some(n))),
        }
    }

    if let Some(v) = callables_by_package_name.get(&(package.to_string(), name.to_string())) {
        match v.len() {
            0 => {}
            1 => return Ok((v.clone(), Resolution::Package)),
            n => return Err((UnresolvedReason::AmbiguousPackage, Some(n))),
        }
    }

    let mut import_candidates: Vec<usize> = Vec::new();
    for import in imports {
        let seg = trailing_segment(import);
        if let Some(packages) = packages_by_segment.get(seg) {
            for pkg in packages {
                if let Some(v) = callables_by_package_name.get(&(pkg.clone(), name.to_string())) {
                    for &i in v {
                        if !import_candidates.contains(&i) {
                            import_candidates.push(i);
                        }
                    }
                }
            }
        }
    }
    match import_candidates.len() {
        0 => {}
        1 => return Ok((import_candidates, Resolution::Import)),
        n => return Err((UnresolvedReason::AmbiguousImport, Some(n))),
    }

    match callables_by_name.get(name) {
        Some(v) if v.len() == 1 => Ok((v.clone(), Resolution::Global)),
        Some(v) if v.len() >= 2 => Err((UnresolvedReason::AmbiguousGlobal, Some(v.len()))),
        _ => Err((UnresolvedReason::NotFound, None)),
    }
}
