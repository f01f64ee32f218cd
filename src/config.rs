//! Project-level configuration.
//!
//! Loads optional `loctrace.toml` or `.loctracerc.json` from the scanned
//! root. Absence of either file is not an error: defaults apply.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub exclude: ExcludeConfig,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludeConfig {
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub json: bool,
}

impl ProjectConfig {
    /// A worker-count override from config, subordinate to the
    /// `GTS_INDEX_WORKERS` environment variable which the builder consults
    /// directly; returns `None` when neither is set.
    pub fn worker_override(&self) -> Option<usize> {
        if std::env::var("GTS_INDEX_WORKERS").is_ok() {
            return None;
        }
        self.workers
    }
}

/// Loads project configuration from `root`, trying `loctrace.toml` then
/// `.loctracerc.json`. Returns defaults if neither file exists or parsing
/// fails.
pub fn load(root: &Path) -> ProjectConfig {
    let toml_path = root.join("loctrace.toml");
    if toml_path.exists() {
        match load_toml(&toml_path) {
            Ok(config) => {
                debug!(path = %toml_path.display(), "loaded project config");
                return config;
            }
            Err(e) => warn!(path = %toml_path.display(), error = %e, "failed to load config"),
        }
    }

    let json_path = root.join(".loctracerc.json");
    if json_path.exists() {
        match load_json(&json_path) {
            Ok(config) => {
                debug!(path = %json_path.display(), "loaded project config");
                return config;
            }
            Err(e) => warn!(path = %json_path.display(), error = %e, "failed to load config"),
        }
    }

    debug!("no project config found, using defaults");
    ProjectConfig::default()
}

fn load_toml(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

fn load_json(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load(dir.path());
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn toml_config_is_parsed() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("loctrace.toml"),
            "workers = 4\n\n[exclude]\npaths = [\"generated/\"]\n\n[defaults]\nselector = \"function_definition\"\njson = true\n",
        )
        .unwrap();

        let config = load(dir.path());
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.exclude.paths, vec!["generated/".to_string()]);
        assert_eq!(config.defaults.selector.as_deref(), Some("function_definition"));
        assert!(config.defaults.json);
    }

    #[test]
    fn env_var_takes_priority_over_config_override() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("loctrace.toml"), "workers = 4\n").unwrap();
        let config = load(dir.path());

        std::env::set_var("GTS_INDEX_WORKERS", "2");
        assert_eq!(config.worker_override(), None);
        std::env::remove_var("GTS_INDEX_WORKERS");
        assert_eq!(config.worker_override(), Some(4));
    }
}
