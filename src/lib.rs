//! Structural code intelligence: multi-language indexing, structural
//! selectors, and cross-reference analysis.
//!
//! The library surface is organized around the pipeline the CLI drives:
//! [`grammar`] registers per-language tree-sitter capabilities, [`parser`]
//! turns source bytes into [`model::Symbol`]/[`model::Reference`] records
//! via one generic tag-query walker, [`index`] discovers files and builds
//! (or incrementally updates) an [`model::Index`], [`xref`] derives a
//! cross-reference call graph from an index, [`selector`] evaluates
//! structural queries and plans renames, [`rawquery`] offers a lower-level
//! tree-sitter S-expression query mode per language, and [`bridge`]
//! partitions packages into components and tallies cross-component
//! dependency pressure.

pub mod bridge;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod grammar;
pub mod index;
pub mod model;
pub mod parser;
pub mod rawquery;
pub mod selector;
pub mod xref;
