//! Temporary directories for tests that write artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A fresh temporary directory, removed when the handle drops.
pub fn scratch_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("map-generator-test-")
        .tempdir()
        .unwrap_or_else(|e| panic!("failed to create scratch dir: {}", e))
}

/// Write `contents` to `dir/name` and return the full path.
pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap_or_else(|e| panic!("mkdir {}: {}", parent.display(), e));
    }
    fs::write(&path, contents).unwrap_or_else(|e| panic!("write {}: {}", path.display(), e));
    path
}

/// Sorted file names directly under `dir`.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("read_dir {}: {}", dir.display(), e))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_is_removed_on_drop() {
        let dir = scratch_dir();
        let path = dir.path().to_path_buf();
        write_file(&path, "a/b.txt", "x");
        assert!(path.join("a/b.txt").exists());
        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn test_list_files_is_sorted() {
        let dir = scratch_dir();
        write_file(dir.path(), "b.bmp", "");
        write_file(dir.path(), "a.bmp", "");
        write_file(dir.path(), "sub/c.bmp", "");
        assert_eq!(list_files(dir.path()), vec!["a.bmp", "b.bmp"]);
    }
}
