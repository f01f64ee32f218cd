//! Index Builder: discovery, full-scan parallel parsing with `{size,mtime}`
//! reuse, watch-driven sub-file incremental updates, and JSON persistence.

use crate::error::IndexError;
use crate::grammar::GrammarRegistry;
use crate::index::discover::discover;
use crate::model::{BuildStats, FileSummary, Index, ParseError, WatchEntry, WatchState, SCHEMA_VERSION};
use crate::parser;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// A cooperative cancellation flag shared between a caller and a running
/// build. Cancellation is all-or-nothing: a tripped token makes the whole
/// call fail with [`IndexError::Cancelled`], never a partial index.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options governing how `apply_watch_changes` reuses parse trees.
#[derive(Debug, Clone, Copy)]
pub struct WatchApplyOptions {
    pub subfile_incremental: bool,
}

impl Default for WatchApplyOptions {
    fn default() -> Self {
        Self {
            subfile_incremental: true,
        }
    }
}

/// Resolves the full-scan worker count: `GTS_INDEX_WORKERS` if set and a
/// valid positive integer, else `min(num_cpu, candidates)`, clamped to
/// `[1, candidates]` (with `candidates == 0` treated as `1`).
pub fn worker_count(candidates: usize) -> usize {
    let ceiling = candidates.max(1);
    let from_env = std::env::var("GTS_INDEX_WORKERS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0);
    let n = from_env.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1)
            .min(ceiling)
    });
    n.clamp(1, ceiling)
}

fn to_forward_slash(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}

fn freshness_of(path: &Path) -> std::io::Result<(u64, u64)> {
    let meta = std::fs::metadata(path)?;
    let nanos = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    Ok((meta.len(), nanos))
}

enum WorkOutcome {
    Parsed(FileSummary),
    Reused(FileSummary),
    Errored(ParseError),
}

fn index_one(
    registry: &GrammarRegistry,
    abs: &Path,
    rel: &str,
    prior: Option<&FileSummary>,
) -> WorkOutcome {
    let Some(cap) = registry.capability_for(abs) else {
        // discover() already filtered by extension; unreachable in practice.
        return WorkOutcome::Errored(ParseError {
            path: rel.to_string(),
            error: "no grammar capability for this path".to_string(),
        });
    };

    let (size, mtime) = match freshness_of(abs) {
        Ok(v) => v,
        Err(e) => {
            return WorkOutcome::Errored(ParseError {
                path: rel.to_string(),
                error: format!("io error: {e}"),
            })
        }
    };

    if let Some(prior) = prior {
        if prior.freshness_key() == (size, mtime) {
            return WorkOutcome::Reused(prior.clone());
        }
    }

    let source = match std::fs::read(abs) {
        Ok(s) => s,
        Err(e) => {
            return WorkOutcome::Errored(ParseError {
                path: rel.to_string(),
                error: format!("io error: {e}"),
            })
        }
    };

    match parser::parse(cap, rel, &source, size, mtime) {
        Ok(parsed) => WorkOutcome::Parsed(parsed.summary),
        Err(message) => WorkOutcome::Errored(ParseError {
            path: rel.to_string(),
            error: message,
        }),
    }
}

/// Discovers source files under `root`, parses (or reuses) each, and
/// assembles a sorted, deterministic `Index`.
pub struct IndexBuilder {
    registry: GrammarRegistry,
    ignore_patterns: Vec<String>,
}

impl IndexBuilder {
    pub fn new(registry: GrammarRegistry) -> Self {
        Self {
            registry,
            ignore_patterns: Vec::new(),
        }
    }

    /// Adds `.gitignore`-style patterns (e.g. from `ProjectConfig.exclude.paths`)
    /// pruning matching paths from discovery, on top of `.gitignore`/`.git/info/exclude`
    /// and the built-in noise-directory skip list.
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    pub fn build_path(&self, root: &Path) -> Result<Index, IndexError> {
        let (index, _) = self.build_path_incremental(root, None)?;
        Ok(index)
    }

    pub fn build_path_incremental(
        &self,
        root: &Path,
        prior: Option<&Index>,
    ) -> Result<(Index, BuildStats), IndexError> {
        self.build_path_incremental_cancellable(root, prior, &CancellationToken::new())
    }

    pub fn build_path_incremental_cancellable(
        &self,
        root: &Path,
        prior: Option<&Index>,
        token: &CancellationToken,
    ) -> Result<(Index, BuildStats), IndexError> {
        let canonical_root = root.canonicalize().map_err(|e| IndexError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;

        let candidates = discover(&canonical_root, &self.registry, &self.ignore_patterns);
        let n_workers = worker_count(candidates.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .build()
            .map_err(|e| IndexError::ParseFailure {
                path: canonical_root.clone(),
                message: format!("failed to build worker pool: {e}"),
            })?;

        let prior_by_path: HashMap<&str, &FileSummary> = prior
            .map(|idx| idx.files.iter().map(|f| (f.path.as_str(), f)).collect())
            .unwrap_or_default();

        let rels: Vec<(PathBuf, String)> = candidates
            .into_iter()
            .map(|abs| {
                let rel = to_forward_slash(abs.strip_prefix(&canonical_root).unwrap_or(&abs));
                (abs, rel)
            })
            .collect();

        let registry = &self.registry;
        let outcomes: Vec<WorkOutcome> = pool.install(|| {
            rels.par_iter()
                .map(|(abs, rel)| {
                    if token.is_cancelled() {
                        return WorkOutcome::Errored(ParseError {
                            path: rel.clone(),
                            error: "cancelled".to_string(),
                        });
                    }
                    index_one(registry, abs, rel, prior_by_path.get(rel.as_str()).copied())
                })
                .collect()
        });

        if token.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let mut files = Vec::new();
        let mut errors = Vec::new();
        let mut stats = BuildStats {
            parsed: 0,
            reused: 0,
            candidates: rels.len(),
        };

        for outcome in outcomes {
            match outcome {
                WorkOutcome::Parsed(summary) => {
                    stats.parsed += 1;
                    files.push(summary);
                }
                WorkOutcome::Reused(summary) => {
                    stats.reused += 1;
                    files.push(summary);
                }
                WorkOutcome::Errored(err) => {
                    stats.parsed += 1;
                    warn!(path = %err.path, error = %err.error, "parse failure");
                    errors.push(err);
                }
            }
        }
        debug!(workers = n_workers, parsed = stats.parsed, reused = stats.reused, "full-scan build complete");

        let mut index = Index {
            version: SCHEMA_VERSION.to_string(),
            root: canonical_root,
            generated_at: chrono::Utc::now().to_rfc3339(),
            files,
            errors,
        };
        index.sort();

        Ok((index, stats))
    }

    /// Applies a watcher-supplied changed-path batch to `current`,
    /// reusing sub-file incremental trees from `watch_state` where
    /// possible. Paths are processed in sorted order, single-threaded, per
    /// the watch-mode concurrency discipline.
    pub fn apply_watch_changes(
        &self,
        current: &Index,
        changed_abs_paths: &[PathBuf],
        watch_state: &mut WatchState,
        opts: WatchApplyOptions,
    ) -> Result<(Index, BuildStats), IndexError> {
        let root = &current.root;
        let mut rels: Vec<String> = changed_abs_paths
            .iter()
            .filter_map(|p| p.strip_prefix(root).ok())
            .map(to_forward_slash)
            .collect();
        rels.sort();
        rels.dedup();

        let mut files: HashMap<String, FileSummary> = current
            .files
            .iter()
            .cloned()
            .map(|f| (f.path.clone(), f))
            .collect();
        let mut errors: HashMap<String, ParseError> = current
            .errors
            .iter()
            .cloned()
            .map(|e| (e.path.clone(), e))
            .collect();

        let touched_existing = rels
            .iter()
            .filter(|r| files.contains_key(r.as_str()) || errors.contains_key(r.as_str()))
            .count();
        let mut stats = BuildStats {
            parsed: 0,
            reused: (current.files.len() + current.errors.len()).saturating_sub(touched_existing),
            candidates: rels.len(),
        };

        for rel in &rels {
            let abs = root.join(rel);
            if !abs.exists() {
                files.remove(rel);
                errors.remove(rel);
                watch_state.remove(rel);
                continue;
            }

            let Some(cap) = self.registry.capability_for(&abs) else {
                files.remove(rel);
                watch_state.remove(rel);
                continue;
            };

            let (size, mtime) = match freshness_of(&abs) {
                Ok(v) => v,
                Err(e) => {
                    errors.insert(
                        rel.clone(),
                        ParseError {
                            path: rel.clone(),
                            error: format!("io error: {e}"),
                        },
                    );
                    files.remove(rel);
                    stats.parsed += 1;
                    continue;
                }
            };

            let source = match std::fs::read(&abs) {
                Ok(s) => s,
                Err(e) => {
                    errors.insert(
                        rel.clone(),
                        ParseError {
                            path: rel.clone(),
                            error: format!("io error: {e}"),
                        },
                    );
                    files.remove(rel);
                    stats.parsed += 1;
                    continue;
                }
            };

            let prior_entry = watch_state.get(rel);
            let parsed = if opts.subfile_incremental {
                match prior_entry {
                    Some(entry) if entry.language == cap.name => parser::parse_incremental(
                        cap,
                        rel,
                        &entry.source,
                        &entry.tree,
                        &source,
                        size,
                        mtime,
                    ),
                    _ => parser::parse(cap, rel, &source, size, mtime),
                }
            } else {
                parser::parse(cap, rel, &source, size, mtime)
            };

            stats.parsed += 1;
            match parsed {
                Ok(parsed) => {
                    errors.remove(rel);
                    files.insert(rel.clone(), parsed.summary);
                    watch_state.insert(
                        rel.clone(),
                        WatchEntry {
                            source,
                            tree: parsed.tree,
                            language: cap.name.to_string(),
                        },
                    );
                }
                Err(message) => {
                    files.remove(rel);
                    warn!(path = %rel, error = %message, "watch reparse failed");
                    errors.insert(
                        rel.clone(),
                        ParseError {
                            path: rel.clone(),
                            error: message,
                        },
                    );
                    watch_state.remove(rel);
                }
            }
        }

        debug!(changed = rels.len(), parsed = stats.parsed, "watch batch applied");

        let mut index = Index {
            version: SCHEMA_VERSION.to_string(),
            root: root.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            files: files.into_values().collect(),
            errors: errors.into_values().collect(),
        };
        index.sort();

        Ok((index, stats))
    }

    pub fn load(&self, path: &Path) -> Result<Index, IndexError> {
        let bytes = std::fs::read(path).map_err(|e| IndexError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let index: Index = serde_json::from_slice(&bytes)?;
        if !crate::model::schema_major_matches(&index.version) {
            let expected: u32 = SCHEMA_VERSION
                .split('.')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let found: u32 = index
                .version
                .split('.')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            return Err(IndexError::SchemaMismatch { expected, found });
        }
        Ok(index)
    }

    pub fn save(&self, path: &Path, index: &Index) -> Result<(), IndexError> {
        let file = std::fs::File::create(path).map_err(|e| IndexError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::to_writer_pretty(file, index)?;
        Ok(())
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(GrammarRegistry::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn builder() -> IndexBuilder {
        IndexBuilder::default()
    }

    #[test]
    fn single_file_go_index_matches_scenario_one() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.go"), "package main\n\nfunc A() {}\n").unwrap();

        let index = builder().build_path(dir.path()).unwrap();
        assert_eq!(index.files.len(), 1);
        assert_eq!(index.files[0].path, "main.go");
        assert_eq!(index.files[0].symbols.len(), 1);
        assert_eq!(index.files[0].symbols[0].name, "A");
        assert_eq!(index.files[0].symbols[0].start_line, 3);
    }

    #[test]
    fn incremental_reuse_then_no_op_rebuild() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main\n\nfunc A() {}\n").unwrap();
        fs::write(dir.path().join("b.go"), "package main\n\nfunc B() {}\n").unwrap();

        let b = builder();
        let (first, stats1) = b.build_path_incremental(dir.path(), None).unwrap();
        assert_eq!(stats1.parsed, 2);
        assert_eq!(stats1.reused, 0);

        let (_second, stats2) = b
            .build_path_incremental(dir.path(), Some(&first))
            .unwrap();
        assert_eq!(stats2.parsed, 0);
        assert_eq!(stats2.reused, 2);
    }

    #[test]
    fn changing_one_file_reparses_only_that_file() {
        let dir = tempdir().unwrap();
        let a_path = dir.path().join("a.go");
        fs::write(&a_path, "package main\n\nfunc A() {}\n").unwrap();
        fs::write(dir.path().join("b.go"), "package main\n\nfunc B() {}\n").unwrap();

        let b = builder();
        let (first, _) = b.build_path_incremental(dir.path(), None).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&a_path, "package main\n\nfunc A() {}\nfunc A2() {}\n").unwrap();

        let (second, stats) = b.build_path_incremental(dir.path(), Some(&first)).unwrap();
        assert_eq!(stats.parsed, 1);
        assert_eq!(stats.reused, 1);
        let a_summary = second.file("a.go").unwrap();
        assert_eq!(a_summary.symbols.len(), 2);
    }

    #[test]
    fn discovery_filter_excludes_unrecognized_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main\n\nfunc A() {}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "hi\n").unwrap();

        let index = builder().build_path(dir.path()).unwrap();
        assert!(index.files.iter().all(|f| f.path != "notes.txt"));
        assert!(index.errors.iter().all(|e| e.path != "notes.txt"));
    }

    #[test]
    fn round_trip_through_save_and_load() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main\n\nfunc A() {}\n").unwrap();
        let b = builder();
        let index = b.build_path(dir.path()).unwrap();

        let out_path = dir.path().join("index.json");
        b.save(&out_path, &index).unwrap();
        let loaded = b.load(&out_path).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn load_refuses_mismatched_schema_major() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("index.json");
        let bogus = serde_json::json!({
            "version": "99.0",
            "root": dir.path(),
            "generated_at": "2026-01-01T00:00:00Z",
            "files": [],
            "errors": [],
        });
        fs::write(&out_path, serde_json::to_vec(&bogus).unwrap()).unwrap();

        let err = builder().load(&out_path).unwrap_err();
        assert!(matches!(err, IndexError::SchemaMismatch { .. }));
    }

    #[test]
    fn watch_apply_reuse_stats_exclude_reparsed_files() {
        use crate::model::WatchState;

        let dir = tempdir().unwrap();
        let a_path = dir.path().join("a.go");
        fs::write(&a_path, "package main\n\nfunc A() {}\n").unwrap();
        fs::write(dir.path().join("b.go"), "package main\n\nfunc B() {}\n").unwrap();
        fs::write(dir.path().join("c.go"), "package main\n\nfunc C() {}\n").unwrap();

        let b = builder();
        let (current, _) = b.build_path_incremental(dir.path(), None).unwrap();
        let mut watch_state = WatchState::new();

        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&a_path, "package main\n\nfunc A() {}\nfunc A2() {}\n").unwrap();

        let (next, stats) = b
            .apply_watch_changes(
                &current,
                &[a_path.clone()],
                &mut watch_state,
                WatchApplyOptions::default(),
            )
            .unwrap();

        // Only `a.go` was touched; `b.go` and `c.go` carry over untouched.
        assert_eq!(stats.parsed, 1);
        assert_eq!(stats.reused, 2);
        assert_eq!(next.files.len(), 3);
        assert_eq!(next.file("a.go").unwrap().symbols.len(), 2);
    }
}
