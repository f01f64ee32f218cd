// Clippy: deny unwrap_used in production code — use expect() or ? instead
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! `loctrace` - structural code intelligence CLI.
//!
//! A thin consumer of the `loctrace` library: indexing, structural
//! selectors, cross-reference walks, and component/bridge summaries.

use anyhow::Result;
use clap::Parser;
use loctrace::cli::{self, Cli};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    cli::run(cli)
}
