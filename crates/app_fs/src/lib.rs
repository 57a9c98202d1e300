//! LiveLister file system layer
//!
//! Provides the collaborators the listing engine is driven by:
//! - Locator: normalized, hashable item identity
//! - Enumerator: container listing (filesystem and in-memory)
//! - FsWatcher: change notifications
//! - Folder size computation

mod browser;
mod change;
mod folder_size;
mod locator;
mod memory;
mod watcher;

pub use browser::{
    extension_of, natural_cmp, natural_sort_key, EntryStream, Enumerator, FsEnumerator,
    ItemAttributes, NaturalSortPart, RawEntry,
};
pub use change::{ChangeEvent, ChangeKind};
pub use folder_size::{child_count, folder_size};
pub use locator::Locator;
pub use memory::MemoryEnumerator;
pub use watcher::FsWatcher;

use std::path::Path;
use thiserror::Error;

/// File system errors
#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl FsError {
    /// Classify an IO error against the path it was raised for
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                FsError::AccessDenied(path.display().to_string())
            }
            _ => FsError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
