//! Ignore-aware, capability-filtered directory discovery.

use crate::grammar::GrammarRegistry;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SKIP_DIR_BASENAMES: &[&str] = &[".git", ".hg", ".svn", "node_modules", "vendor"];

fn is_skipped_dir(root: &Path, dir: &Path) -> bool {
    if dir == root {
        return false;
    }
    match dir.file_name().and_then(|n| n.to_str()) {
        Some(name) => SKIP_DIR_BASENAMES.contains(&name) || name.starts_with('.'),
        None => false,
    }
}

/// Compiles `patterns` (`.gitignore`-style lines, typically from
/// `ProjectConfig.exclude.paths`) into a matcher rooted at `root`. A pattern
/// that fails to parse is skipped with a warning rather than failing
/// discovery — an ignore rule is a pruning hint, never a refusal signal.
fn build_extra_ignore(root: &Path, patterns: &[String]) -> Option<Gitignore> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        if let Err(e) = builder.add_line(None, pattern) {
            warn!(pattern = %pattern, error = %e, "ignoring invalid exclude pattern");
        }
    }
    match builder.build() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "failed to compile exclude patterns, ignoring them");
            None
        }
    }
}

/// Walks `root`, honoring `.gitignore`-style ignore files plus any
/// additional `extra_ignore_patterns`, skipping the conventional noise
/// directories, and keeping only files whose extension maps to a registered
/// grammar capability.
pub fn discover(root: &Path, registry: &GrammarRegistry, extra_ignore_patterns: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let walk_root = root.to_path_buf();
    let extra = build_extra_ignore(root, extra_ignore_patterns);
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .parents(true)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir && is_skipped_dir(&walk_root, entry.path()) {
                return false;
            }
            if let Some(matcher) = &extra {
                if matcher.matched(entry.path(), is_dir).is_ignore() {
                    return false;
                }
            }
            true
        })
        .build();

    for entry in walker.flatten() {
        let path = entry.path();
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
            && registry.capability_for(path).is_some()
        {
            out.push(path.to_path_buf());
        }
    }
    out.sort();
    debug!(root = %root.display(), candidates = out.len(), "discovery complete");
    out
}
