//! Component Bridge Analyzer: partitions packages into components by a
//! directory-naming convention, tallies internal cross-component edges and
//! external-dependency pressure from import strings, and supports
//! focus-component BFS traversal.

use crate::model::Index;
use std::collections::{HashMap, HashSet, VecDeque};

/// Derives a component name from a package path per the fixed naming rule:
/// `"."` → `"root"`; a single-segment package is itself the component; a
/// package whose first segment is `cmd`, `internal`, or `pkg` contributes its
/// first two segments; otherwise only the first segment.
pub fn component_name(package: &str) -> String {
    if package == "." {
        return "root".to_string();
    }
    let segments: Vec<&str> = package.split('/').collect();
    match segments.as_slice() {
        [only] => only.to_string(),
        [first, second, ..] if matches!(*first, "cmd" | "internal" | "pkg") => {
            format!("{first}/{second}")
        }
        [first, ..] => first.to_string(),
    }
}

fn package_of(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => path[..i].to_string(),
        None => ".".to_string(),
    }
}

/// Parses the `module X` line from a `go.mod` file's contents, if present.
pub fn parse_module_path(go_mod_contents: &str) -> Option<String> {
    go_mod_contents.lines().find_map(|line| {
        let line = line.trim();
        line.strip_prefix("module ").map(|rest| rest.trim().to_string())
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSummary {
    pub name: String,
    pub package_count: usize,
    pub file_count: usize,
    pub internal_imports: u32,
    pub external_imports: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSample {
    pub from_package: String,
    pub to_package: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEdge {
    pub from: String,
    pub to: String,
    pub count: u32,
    pub samples: Vec<BridgeSample>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEntry {
    pub component: String,
    pub count: u32,
}

/// One external import path's frequency within a component, as ranked by
/// `external_by_component`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFrequency {
    pub import: String,
    pub count: u32,
}

/// How many of a component's most frequent external import paths
/// `external_by_component` retains.
pub const EXTERNAL_TOP_K: usize = 5;

pub struct BridgeModel {
    pub components: Vec<ComponentSummary>,
    pub bridges: Vec<BridgeEdge>,
    pub external: Vec<ExternalEntry>,
    /// Per component, the top [`EXTERNAL_TOP_K`] external import paths by
    /// frequency, sorted `(count desc, import asc)`.
    pub external_by_component: HashMap<String, Vec<ImportFrequency>>,
}

impl BridgeModel {
    /// Builds the component/bridge model for `index`. `module_path` is the
    /// Go module prefix parsed from `go.mod`, if the root carries one; when
    /// absent, no import ever matches the internal-prefix test, so every
    /// import is tallied as external and `bridges` may come back empty.
    pub fn build(index: &Index, module_path: Option<&str>) -> Self {
        let mut packages: HashMap<String, HashSet<String>> = HashMap::new(); // component -> packages
        let mut file_counts: HashMap<String, usize> = HashMap::new();
        let mut internal_counts: HashMap<String, u32> = HashMap::new();
        let mut external_counts: HashMap<String, u32> = HashMap::new();
        let mut external_path_counts: HashMap<String, HashMap<String, u32>> = HashMap::new();
        let mut bridge_index: HashMap<(String, String), usize> = HashMap::new();
        let mut bridges: Vec<BridgeEdge> = Vec::new();

        for file in &index.files {
            let from_package = package_of(&file.path);
            let from_component = component_name(&from_package);
            packages.entry(from_component.clone()).or_default().insert(from_package.clone());
            *file_counts.entry(from_component.clone()).or_insert(0) += 1;

            for import in &file.imports {
                match module_path.and_then(|prefix| internal_suffix(prefix, import)) {
                    Some(to_package) => {
                        let to_component = component_name(&to_package);
                        packages.entry(to_component.clone()).or_default().insert(to_package.clone());
                        if to_component == from_component {
                            *internal_counts.entry(from_component.clone()).or_insert(0) += 1;
                        } else {
                            let key = (from_component.clone(), to_component.clone());
                            let sample = BridgeSample {
                                from_package: from_package.clone(),
                                to_package: to_package.clone(),
                            };
                            match bridge_index.get(&key) {
                                Some(&pos) => {
                                    bridges[pos].count += 1;
                                    if bridges[pos].samples.len() < 3 {
                                        bridges[pos].samples.push(sample);
                                    }
                                }
                                None => {
                                    bridge_index.insert(key, bridges.len());
                                    bridges.push(BridgeEdge {
                                        from: from_component.clone(),
                                        to: to_component.clone(),
                                        count: 1,
                                        samples: vec![sample],
                                    });
                                }
                            }
                        }
                    }
                    None => {
                        *external_counts.entry(from_component.clone()).or_insert(0) += 1;
                        *external_path_counts
                            .entry(from_component.clone())
                            .or_default()
                            .entry(import.clone())
                            .or_insert(0) += 1;
                    }
                }
            }
        }

        let mut components: Vec<ComponentSummary> = packages
            .into_iter()
            .map(|(name, pkgs)| ComponentSummary {
                package_count: pkgs.len(),
                file_count: *file_counts.get(&name).unwrap_or(&0),
                internal_imports: *internal_counts.get(&name).unwrap_or(&0),
                external_imports: *external_counts.get(&name).unwrap_or(&0),
                name,
            })
            .collect();
        components.sort_by(|a, b| (std::cmp::Reverse(a.file_count), a.name.as_str()).cmp(&(std::cmp::Reverse(b.file_count), b.name.as_str())));

        bridges.sort_by(|a, b| {
            (std::cmp::Reverse(a.count), a.from.as_str(), a.to.as_str())
                .cmp(&(std::cmp::Reverse(b.count), b.from.as_str(), b.to.as_str()))
        });

        let mut external: Vec<ExternalEntry> = external_counts
            .into_iter()
            .map(|(component, count)| ExternalEntry { component, count })
            .collect();
        external.sort_by(|a, b| {
            (std::cmp::Reverse(a.count), a.component.as_str()).cmp(&(std::cmp::Reverse(b.count), b.component.as_str()))
        });

        let external_by_component: HashMap<String, Vec<ImportFrequency>> = external_path_counts
            .into_iter()
            .map(|(component, counts)| {
                let mut freqs: Vec<ImportFrequency> = counts
                    .into_iter()
                    .map(|(import, count)| ImportFrequency { import, count })
                    .collect();
                freqs.sort_by(|a, b| {
                    (std::cmp::Reverse(a.count), a.import.as_str())
                        .cmp(&(std::cmp::Reverse(b.count), b.import.as_str()))
                });
                freqs.truncate(EXTERNAL_TOP_K);
                (component, freqs)
            })
            .collect();

        BridgeModel {
            components,
            bridges,
            external,
            external_by_component,
        }
    }

    /// BFS from `focus` over the bridge adjacency, reversing edges when
    /// `reverse`; stops after `depth` hops (`depth <= 0` clamps to 1).
    pub fn focus_walk(&self, focus: &str, depth: i64, reverse: bool) -> FocusWalk {
        let depth = if depth <= 0 { 1 } else { depth as usize };
        let mut direct_incoming = HashSet::new();
        let mut direct_outgoing = HashSet::new();
        for edge in &self.bridges {
            if edge.from == focus {
                direct_outgoing.insert(edge.to.clone());
            }
            if edge.to == focus {
                direct_incoming.insert(edge.from.clone());
            }
        }

        let mut visited = vec![focus.to_string()];
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(focus.to_string());
        let mut frontier = VecDeque::new();
        frontier.push_back((focus.to_string(), 0usize));

        while let Some((node, hops)) = frontier.pop_front() {
            if hops >= depth {
                continue;
            }
            for edge in &self.bridges {
                let (from, to) = if reverse { (&edge.to, &edge.from) } else { (&edge.from, &edge.to) };
                if from == &node && seen.insert(to.clone()) {
                    visited.push(to.clone());
                    frontier.push_back((to.clone(), hops + 1));
                }
            }
        }

        let mut direct_incoming: Vec<String> = direct_incoming.into_iter().collect();
        let mut direct_outgoing: Vec<String> = direct_outgoing.into_iter().collect();
        direct_incoming.sort();
        direct_outgoing.sort();

        FocusWalk {
            focus: focus.to_string(),
            depth,
            reverse,
            direct_incoming,
            direct_outgoing,
            walk: visited,
        }
    }
}

pub struct FocusWalk {
    pub focus: String,
    pub depth: usize,
    pub reverse: bool,
    pub direct_incoming: Vec<String>,
    pub direct_outgoing: Vec<String>,
    pub walk: Vec<String>,
}

fn internal_suffix(module_path: &str, import: &str) -> Option<String> {
    let suffix = import.strip_prefix(module_path)?;
    let suffix = suffix.strip_prefix('/')?;
    if suffix.is_empty() {
        None
    } else {
        Some(suffix.to_string())
    }
}
