//! Thin CLI surface over the library. Contains no indexing logic of its
//! own — each command builds on `loctrace::{index, xref, selector, bridge}`
//! and prints either a short human summary or the raw JSON value.

use crate::bridge::{parse_module_path, BridgeModel};
use crate::grammar::GrammarRegistry;
use crate::index::{IndexBuilder, WatchApplyOptions, WatchSession};
use crate::model::{Index, WatchState};
use crate::{cache, config, rawquery, selector};
use crate::xref::Graph;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Loads `root`'s project config (if any) and builds an `IndexBuilder` that
/// honors its `exclude.paths` and `workers` overrides, then scans `root`.
fn build_index(root: &std::path::Path) -> Result<Index> {
    let project_config = config::load(root);
    let builder = IndexBuilder::default().with_ignore_patterns(project_config.exclude.paths.clone());
    if let Some(workers) = project_config.worker_override() {
        std::env::set_var("GTS_INDEX_WORKERS", workers.to_string());
    }
    builder.build_path(root).context("building index")
}

#[derive(Parser, Debug)]
#[command(name = "loctrace")]
#[command(version, about = "Structural code intelligence over a tree-sitter index", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an index over a directory and print a summary.
    Scan {
        /// Root directory to scan.
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Write the built index as JSON to this path.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the full index JSON to stdout instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a structural selector (`kind[filter,...]`) against an index.
    Query {
        /// Selector expression, e.g. `function_definition[name=/^Handle/]`.
        selector: String,
        #[arg(long, default_value = ".")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Run a raw tree-sitter S-expression query over every file whose
    /// language compiles it; failures are recorded per-language, not fatal.
    RawQuery {
        /// Tree-sitter S-expression query source, e.g.
        /// `(function_declaration name: (identifier) @fn.name)`.
        query: String,
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Restrict output to these capture names (comma-separated).
        #[arg(long, value_delimiter = ',')]
        captures: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Cross-reference graph queries.
    Xref {
        #[command(subcommand)]
        action: XrefAction,
    },
    /// Component/bridge dependency summary.
    Bridges {
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Restrict output to a focus-component BFS traversal.
        #[arg(long)]
        focus: Option<String>,
        #[arg(long, default_value_t = 1)]
        depth: i64,
        #[arg(long)]
        reverse: bool,
    },
    /// Watch a directory and apply incremental updates as files change.
    Watch {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum XrefAction {
    /// Breadth-first walk from a `file::name` definition root.
    Walk {
        /// `path/to/file.go::FunctionName`
        root: String,
        #[arg(long, default_value = ".")]
        path: PathBuf,
        #[arg(long, default_value_t = 1)]
        depth: i64,
        #[arg(long)]
        reverse: bool,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scan { path, out, json } => cmd_scan(&path, out.as_deref(), json),
        Commands::Query { selector, path, json } => cmd_query(&selector, &path, json),
        Commands::RawQuery { query, path, captures, json } => cmd_raw_query(&query, &path, &captures, json),
        Commands::Xref { action } => match action {
            XrefAction::Walk { root, path, depth, reverse } => cmd_xref_walk(&root, &path, depth, reverse),
        },
        Commands::Bridges { path, focus, depth, reverse } => cmd_bridges(&path, focus.as_deref(), depth, reverse),
        Commands::Watch { path } => cmd_watch(&path),
    }
}

fn cmd_scan(path: &std::path::Path, out: Option<&std::path::Path>, json: bool) -> Result<()> {
    let index = build_index(path)?;

    let out_path = match out {
        Some(p) => p.to_path_buf(),
        None => {
            cache::ensure_cache_dir(path).context("resolving default cache path")?;
            cache::default_index_path(path)
        }
    };
    IndexBuilder::default()
        .save(&out_path, &index)
        .context("saving index")?;
    info!(path = %out_path.display(), "wrote index");

    if json {
        serde_json::to_writer_pretty(std::io::stdout(), &index)?;
        println!();
    } else {
        println!(
            "{} files indexed, {} parse errors",
            index.files.len(),
            index.errors.len()
        );
    }
    Ok(())
}

fn cmd_query(selector_src: &str, path: &std::path::Path, json: bool) -> Result<()> {
    let index = build_index(path)?;
    let parsed = selector::parse(selector_src).context("parsing selector")?;
    let matches = selector::evaluate(&index, &parsed);

    if json {
        serde_json::to_writer_pretty(std::io::stdout(), &matches)?;
        println!();
    } else {
        for symbol in &matches {
            println!("{}:{} {} {}", symbol.file, symbol.start_line, symbol.kind, symbol.name);
        }
    }
    Ok(())
}

fn cmd_raw_query(query: &str, path: &std::path::Path, captures: &[String], json: bool) -> Result<()> {
    let index = build_index(path)?;
    let registry = GrammarRegistry::builtin();
    let filter: Option<HashSet<String>> = if captures.is_empty() {
        None
    } else {
        Some(captures.iter().cloned().collect())
    };
    let report = rawquery::run(&index, &registry, path, query, filter.as_ref());

    for err in &report.language_errors {
        warn!(language = %err.language, error = %err.message, "raw query failed to compile for language");
    }

    if json {
        serde_json::to_writer_pretty(std::io::stdout(), &report)?;
        println!();
    } else {
        for capture in &report.captures {
            println!("{}:{} @{} {}", capture.file, capture.start_line, capture.capture, capture.text);
        }
    }
    Ok(())
}

fn cmd_xref_walk(root: &str, path: &std::path::Path, depth: i64, reverse: bool) -> Result<()> {
    let (file, name) = root
        .split_once("::")
        .context("xref root must be `file::name`")?;

    let index = build_index(path)?;
    let graph = Graph::build(&index);

    let mut roots: Vec<u64> = graph
        .definitions()
        .iter()
        .filter(|d| d.callable && d.file == file && d.name == name)
        .map(|d| d.id)
        .collect();
    roots.sort_unstable();
    roots.dedup();

    anyhow::ensure!(!roots.is_empty(), "no definition found for `{root}`");

    let walk = graph.walk(&roots, depth, reverse);
    for id in &walk.nodes {
        if let Some(def) = graph.definition(*id) {
            println!("{}:{} {}", def.file, def.start_line, def.name);
        }
    }
    Ok(())
}

fn cmd_bridges(path: &std::path::Path, focus: Option<&str>, depth: i64, reverse: bool) -> Result<()> {
    let index = build_index(path)?;
    let module_path = std::fs::read_to_string(path.join("go.mod"))
        .ok()
        .and_then(|contents| parse_module_path(&contents));
    let model = BridgeModel::build(&index, module_path.as_deref());

    match focus {
        Some(component) => {
            let walk = model.focus_walk(component, depth, reverse);
            println!("focus {} (depth {}, reverse {})", walk.focus, walk.depth, walk.reverse);
            println!("incoming: {:?}", walk.direct_incoming);
            println!("outgoing: {:?}", walk.direct_outgoing);
            println!("walk: {:?}", walk.walk);
        }
        None => {
            for c in &model.components {
                println!(
                    "{} files={} packages={} internal={} external={}",
                    c.name, c.file_count, c.package_count, c.internal_imports, c.external_imports
                );
            }
            for b in &model.bridges {
                println!("{} -> {} ({})", b.from, b.to, b.count);
            }
            for c in &model.components {
                let Some(top) = model.external_by_component.get(&c.name) else {
                    continue;
                };
                let rendered: Vec<String> =
                    top.iter().map(|f| format!("{}={}", f.import, f.count)).collect();
                println!("{} external: {}", c.name, rendered.join(", "));
            }
        }
    }
    Ok(())
}

fn cmd_watch(path: &std::path::Path) -> Result<()> {
    let builder = IndexBuilder::default();
    let mut index = builder.build_path(path).context("building initial index")?;
    let mut watch_state = WatchState::new();
    info!(files = index.files.len(), "initial scan complete, watching for changes");

    let session = WatchSession::start(path, Duration::from_millis(250)).context("starting watch session")?;
    for batch in session.changes.iter() {
        let (updated, stats) = builder
            .apply_watch_changes(&index, &batch, &mut watch_state, WatchApplyOptions::default())
            .context("applying watch changes")?;
        index = updated;
        info!(changed = stats.candidates, parsed = stats.parsed, "index updated");
    }
    Ok(())
}
