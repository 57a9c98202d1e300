//! Recursive folder size computation

use crate::{FsError, Result};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Total size in bytes of all files below `path`.
///
/// Subdirectories are walked in parallel. Unreadable subtrees count as zero;
/// only an unreadable `path` itself is an error. Symlinks are not followed.
/// `cancel` is polled between directories.
pub fn folder_size(path: &Path, cancel: &AtomicBool) -> Result<u64> {
    let read_dir = fs::read_dir(path).map_err(|e| FsError::from_io(e, path))?;
    let entries: Vec<fs::DirEntry> = read_dir.filter_map(|e| e.ok()).collect();

    let total = entries
        .par_iter()
        .map(|entry| {
            if cancel.load(Ordering::Relaxed) {
                return 0;
            }
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => folder_size(&entry.path(), cancel).unwrap_or(0),
                Ok(ft) if ft.is_file() => entry.metadata().map(|m| m.len()).unwrap_or(0),
                _ => 0,
            }
        })
        .sum();

    if cancel.load(Ordering::Relaxed) {
        return Err(FsError::Cancelled(path.display().to_string()));
    }
    Ok(total)
}

/// Number of direct children of `path`
pub fn child_count(path: &Path) -> Result<usize> {
    let read_dir = fs::read_dir(path).map_err(|e| FsError::from_io(e, path))?;
    Ok(read_dir.count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_size_recurses() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), vec![0u8; 100]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.bin"), vec![0u8; 50]).unwrap();

        let cancel = AtomicBool::new(false);
        assert_eq!(folder_size(dir.path(), &cancel).unwrap(), 150);
        assert_eq!(child_count(dir.path()).unwrap(), 2);
    }

    #[test]
    fn test_folder_size_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            folder_size(dir.path(), &cancel),
            Err(FsError::Cancelled(_))
        ));
    }
}
