//! Grammar Registry: maps a file extension to a [`LanguageCapability`].
//!
//! Each capability is a plain data record — `{ name, make_parser,
//! tags_query }` — rather than a trait object per language. Adding a
//! language means adding a record, not a new `impl`; this is the "behavior
//! is data, not polymorphism" dispatch the rest of the crate leans on.
//!
//! The `tags_query` follows the `@definition.<kind>` / `@reference.<kind>`
//! / `@import` / `@name` capture convention (the same one `tree-sitter-tags`
//! queries use): a single generic walker in [`crate::parser`] turns these
//! captures into `Symbol`/`Reference`/import records for every language,
//! instead of one bespoke extraction function per language.

use crate::error::GrammarError;
use std::path::Path;
use tree_sitter::{Language, Query};

/// A stateless record describing one language's parsing capability.
pub struct LanguageCapability {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    make_language: fn() -> Language,
    tags_query_source: &'static str,
    /// Ancestor node kinds that reclassify a `@definition.function` capture
    /// as `method_definition`. Needed for grammars (Python, Rust) where a
    /// method and a free function share one node kind and are told apart
    /// only by nesting, unlike Go/Java/C#/TS which have a distinct method
    /// node kind the tags query already targets directly.
    pub method_container_kinds: &'static [&'static str],
}

impl LanguageCapability {
    pub fn language(&self) -> Language {
        (self.make_language)()
    }

    pub fn compile_tags_query(&self) -> Result<Query, GrammarError> {
        Query::new(&self.language(), self.tags_query_source).map_err(|source| {
            GrammarError::InvalidQuery {
                language: self.name,
                source,
            }
        })
    }
}

macro_rules! capability {
    ($name:ident, $lang_name:expr, $exts:expr, $make:expr, $query_file:expr, $containers:expr) => {
        fn $name() -> LanguageCapability {
            LanguageCapability {
                name: $lang_name,
                extensions: $exts,
                make_language: $make,
                tags_query_source: include_str!($query_file),
                method_container_kinds: $containers,
            }
        }
    };
}

capability!(
    go_capability,
    "go",
    &["go"],
    || tree_sitter_go::LANGUAGE.into(),
    "queries/go.scm",
    &[]
);
capability!(
    python_capability,
    "python",
    &["py", "pyi"],
    || tree_sitter_python::LANGUAGE.into(),
    "queries/python.scm",
    &["class_definition"]
);
capability!(
    rust_capability,
    "rust",
    &["rs"],
    || tree_sitter_rust::LANGUAGE.into(),
    "queries/rust.scm",
    &["impl_item"]
);
capability!(
    typescript_capability,
    "typescript",
    &["ts", "tsx", "mts", "cts"],
    || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    "queries/typescript.scm",
    &[]
);
capability!(
    javascript_capability,
    "javascript",
    &["js", "jsx", "mjs", "cjs"],
    || tree_sitter_javascript::LANGUAGE.into(),
    "queries/javascript.scm",
    &[]
);
capability!(
    java_capability,
    "java",
    &["java"],
    || tree_sitter_java::LANGUAGE.into(),
    "queries/java.scm",
    &[]
);
capability!(
    csharp_capability,
    "csharp",
    &["cs"],
    || tree_sitter_c_sharp::LANGUAGE.into(),
    "queries/csharp.scm",
    &[]
);
capability!(
    c_capability,
    "c",
    &["c", "h"],
    || tree_sitter_c::LANGUAGE.into(),
    "queries/c.scm",
    &[]
);
capability!(
    cpp_capability,
    "cpp",
    &["cpp", "cc", "cxx", "hpp", "hh", "hxx"],
    || tree_sitter_cpp::LANGUAGE.into(),
    "queries/cpp.scm",
    &["class_specifier", "struct_specifier"]
);

/// The fixed, build-time extension → capability table.
pub struct GrammarRegistry {
    capabilities: Vec<LanguageCapability>,
}

impl GrammarRegistry {
    /// The registry shipped by this crate, covering every language the
    /// indexer understands out of the box.
    pub fn builtin() -> Self {
        Self {
            capabilities: vec![
                go_capability(),
                python_capability(),
                rust_capability(),
                typescript_capability(),
                javascript_capability(),
                java_capability(),
                csharp_capability(),
                c_capability(),
                cpp_capability(),
            ],
        }
    }

    /// Looks up the capability for a path by its extension. Returns `None`
    /// for unrecognized extensions — per spec, such paths are elided from
    /// the index, never recorded as errors.
    pub fn capability_for(&self, path: &Path) -> Option<&LanguageCapability> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.capabilities
            .iter()
            .find(|cap| cap.extensions.contains(&ext.as_str()))
    }

    pub fn capability_by_name(&self, name: &str) -> Option<&LanguageCapability> {
        self.capabilities.iter().find(|cap| cap.name == name)
    }

    pub fn supported_extensions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.capabilities.iter().flat_map(|cap| cap.extensions.iter().copied())
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_common_extensions() {
        let reg = GrammarRegistry::builtin();
        assert_eq!(reg.capability_for(Path::new("main.go")).unwrap().name, "go");
        assert_eq!(reg.capability_for(Path::new("a/b.py")).unwrap().name, "python");
        assert_eq!(reg.capability_for(Path::new("x.tsx")).unwrap().name, "typescript");
        assert_eq!(reg.capability_for(Path::new("x.rs")).unwrap().name, "rust");
    }

    #[test]
    fn unknown_extension_yields_none() {
        let reg = GrammarRegistry::builtin();
        assert!(reg.capability_for(Path::new("README.md")).is_none());
        assert!(reg.capability_for(Path::new("noext")).is_none());
    }

    #[test]
    fn every_capability_compiles_its_tags_query() {
        let reg = GrammarRegistry::builtin();
        for cap in &reg.capabilities {
            cap.compile_tags_query()
                .unwrap_or_else(|e| panic!("{}: {e}", cap.name));
        }
    }
}
