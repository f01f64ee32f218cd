//! Default index cache location: `~/.cache/loctrace/<repo-hash>/index.json`.
//!
//! `scan`/`watch` write here when the caller gives no explicit output path;
//! it is never the only way to persist an index — `save`/`load` in
//! [`crate::index`] accept any path.

use std::path::{Path, PathBuf};

fn hash_path(path: &Path) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = canonical.to_string_lossy();

    let mut hasher = DefaultHasher::new();
    path_str.hash(&mut hasher);
    let hash = hasher.finish();

    let repo_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(20)
        .collect::<String>();

    format!("{repo_name}-{hash:012x}")
}

/// `~/.cache/loctrace/<repo-hash>/` for `repo_path`, on Unix; the platform
/// cache directory (via `dirs::cache_dir`) elsewhere.
pub fn cache_dir(repo_path: &Path) -> PathBuf {
    let repo_hash = hash_path(repo_path);
    let base = dirs::cache_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .map(|h| h.join(".cache"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("loctrace").join(repo_hash)
}

/// The default index path for `repo_path`: `<cache_dir>/index.json`.
pub fn default_index_path(repo_path: &Path) -> PathBuf {
    cache_dir(repo_path).join("index.json")
}

/// Ensures the cache directory for `repo_path` exists, returning it.
pub fn ensure_cache_dir(repo_path: &Path) -> std::io::Result<PathBuf> {
    let dir = cache_dir(repo_path);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_path_is_deterministic() {
        let path = Path::new("/tmp/loctrace-test-repo");
        assert_eq!(hash_path(path), hash_path(path));
    }

    #[test]
    fn cache_dir_embeds_crate_name_and_repo_leaf() {
        let path = Path::new("/home/user/my-project");
        let dir = cache_dir(path);
        let rendered = dir.to_string_lossy();
        assert!(rendered.contains("loctrace"));
        assert!(rendered.contains("my-project"));
    }

    #[test]
    fn default_index_path_ends_in_index_json() {
        let path = Path::new("/home/user/my-project");
        assert_eq!(default_index_path(path).file_name().unwrap(), "index.json");
    }
}
