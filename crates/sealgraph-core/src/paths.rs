use dirs::home_dir;
use std::path::PathBuf;

/// Returns the sealgraph home directory, or None if the user's home cannot be resolved.
pub fn try_sealgraph_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("SEALGRAPH_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".sealgraph"))
}

/// Returns the sealgraph home directory (`~/.sealgraph`), falling back to a
/// directory under the system temp dir when no home can be determined.
pub fn sealgraph_home() -> PathBuf {
    try_sealgraph_home().unwrap_or_else(|| std::env::temp_dir().join("sealgraph"))
}

/// Cache path: ~/.sealgraph/cache
pub fn cache_path() -> PathBuf {
    sealgraph_home().join("cache")
}

/// Fetched modules: ~/.sealgraph/cache/modules
pub fn module_cache_path() -> PathBuf {
    cache_path().join("modules")
}

/// Directory a module is checked out into, below `root`.
///
/// Module names are slash-delimited (`github.com/acme/lib`) and map onto
/// nested directories; the version is the last component.
pub fn module_dir(root: &std::path::Path, module_name: &str, version: &str) -> PathBuf {
    let mut dir = root.to_path_buf();
    for segment in module_name.split('/').filter(|s| !s.is_empty() && *s != "..") {
        dir.push(segment);
    }
    dir.join(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn module_dir_nests_segments() {
        let dir = module_dir(Path::new("/cache"), "github.com/acme/lib", "abc123");
        assert_eq!(dir, Path::new("/cache/github.com/acme/lib/abc123"));
    }

    #[test]
    fn module_dir_ignores_parent_segments() {
        let dir = module_dir(Path::new("/cache"), "../evil", "v1");
        assert_eq!(dir, Path::new("/cache/evil/v1"));
    }
}
