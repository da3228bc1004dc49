//! Locating real TEMPO granules for tests that want them.
//!
//! Granules run to hundreds of megabytes and are never checked in. Tests
//! that read one go through [`require_granule!`](crate::require_granule)
//! and skip when it cannot be found.

use std::path::{Path, PathBuf};

/// Env var pointing at a directory of downloaded granules.
pub const GRANULE_DIR_ENV: &str = "TEMPO_TEST_DATA";

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .unwrap_or(manifest)
        .to_path_buf()
}

/// Directories searched for granules, most specific first.
pub fn granule_search_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::var_os(GRANULE_DIR_ENV)
        .map(PathBuf::from)
        .into_iter()
        .collect();
    dirs.push(workspace_root().join("testdata"));
    dirs
}

/// First existing `name` under [`granule_search_dirs`].
pub fn find_granule(name: &str) -> Option<PathBuf> {
    granule_search_dirs()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

/// Scratch directory removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("tempo_test_")
        .tempdir()
        .expect("create scratch directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").is_file());
    }

    #[test]
    fn test_missing_granule_is_none() {
        assert!(find_granule("tempo_1900-01-01.nc").is_none());
    }

    #[test]
    fn test_temp_test_dir_prefix() {
        let dir = temp_test_dir();
        assert!(dir.path().is_dir());
        assert!(dir.path().to_string_lossy().contains("tempo_test_"));
    }
}
