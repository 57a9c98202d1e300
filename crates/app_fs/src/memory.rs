//! In-memory item tree implementing `Enumerator`
//!
//! Used by demos and tests to drive the listing engine without touching
//! disk, including access failures and streams that break partway.

use crate::{Enumerator, EntryStream, FsError, ItemAttributes, Locator, RawEntry, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct Tree {
    items: HashMap<Locator, ItemAttributes>,
    denied: HashSet<Locator>,
    fail_after: HashMap<Locator, usize>,
}

/// Shared, mutable in-memory tree. Clones see the same items.
#[derive(Clone, Default)]
pub struct MemoryEnumerator {
    tree: Arc<RwLock<Tree>>,
}

impl MemoryEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, creating missing ancestors as containers
    pub fn insert(&self, path: impl Into<Locator>, attributes: ItemAttributes) -> Locator {
        let locator = path.into();
        let mut tree = self.tree.write();
        for ancestor in locator.ancestors() {
            if ancestor.is_root() {
                break;
            }
            tree.items
                .entry(ancestor)
                .or_insert_with(ItemAttributes::container);
        }
        tree.items.insert(locator.clone(), attributes);
        locator
    }

    pub fn insert_dir(&self, path: impl Into<Locator>) -> Locator {
        self.insert(path, ItemAttributes::container())
    }

    pub fn insert_file(&self, path: impl Into<Locator>, size: u64) -> Locator {
        self.insert(path, ItemAttributes::file(size))
    }

    /// Remove an item and everything below it
    pub fn remove(&self, path: impl Into<Locator>) {
        let locator = path.into();
        self.tree
            .write()
            .items
            .retain(|l, _| !locator.is_same_or_ancestor_of(l));
    }

    /// Move an item (and its subtree) to a new locator
    pub fn rename(&self, from: impl Into<Locator>, to: impl Into<Locator>) {
        let (from, to) = (from.into(), to.into());
        let mut tree = self.tree.write();
        let moved: Vec<(Locator, ItemAttributes)> = tree
            .items
            .iter()
            .filter(|(l, _)| from.is_same_or_ancestor_of(l))
            .map(|(l, a)| (l.clone(), a.clone()))
            .collect();
        for (old, attributes) in moved {
            tree.items.remove(&old);
            if let Some(new) = old.rebase(&from, &to) {
                tree.items.insert(new, attributes);
            }
        }
    }

    /// Replace an existing item's attributes
    pub fn set_attributes(&self, path: impl Into<Locator>, attributes: ItemAttributes) {
        let locator = path.into();
        if let Some(slot) = self.tree.write().items.get_mut(&locator) {
            *slot = attributes;
        }
    }

    /// Make enumeration of `path` fail with access denied
    pub fn deny(&self, path: impl Into<Locator>) {
        self.tree.write().denied.insert(path.into());
    }

    /// Make enumeration of `path` fail after yielding `count` entries
    pub fn fail_after(&self, path: impl Into<Locator>, count: usize) {
        self.tree.write().fail_after.insert(path.into(), count);
    }
}

impl Enumerator for MemoryEnumerator {
    fn enumerate(&self, container: &Locator) -> Result<EntryStream> {
        let tree = self.tree.read();
        if tree.denied.contains(container) {
            return Err(FsError::AccessDenied(container.to_string()));
        }
        if !container.is_root() {
            match tree.items.get(container) {
                None => return Err(FsError::NotFound(container.to_string())),
                Some(a) if !a.is_container => {
                    return Err(FsError::NotADirectory(container.to_string()))
                }
                Some(_) => {}
            }
        }

        let mut children: Vec<RawEntry> = tree
            .items
            .iter()
            .filter(|(l, _)| l.is_child_of(container))
            .map(|(l, a)| RawEntry::new(l.clone(), a.clone()))
            .collect();
        // Stable order so partial-failure cut points are deterministic
        children.sort_by(|a, b| a.parsing_name.cmp(&b.parsing_name));

        let mut stream: Vec<Result<RawEntry>> = children.into_iter().map(Ok).collect();
        if let Some(&count) = tree.fail_after.get(container) {
            stream.truncate(count);
            stream.push(Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "enumeration interrupted",
            ))));
        }
        Ok(Box::new(stream.into_iter()))
    }

    fn resolve(&self, locator: &Locator) -> Result<RawEntry> {
        self.tree
            .read()
            .items
            .get(locator)
            .map(|a| RawEntry::new(locator.clone(), a.clone()))
            .ok_or_else(|| FsError::NotFound(locator.to_string()))
    }

    fn exists(&self, locator: &Locator) -> bool {
        locator.is_root() || self.tree.read().items.contains_key(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_creates_ancestors() {
        let fs = MemoryEnumerator::new();
        fs.insert_file("/data/docs/a.txt", 3);

        assert!(fs.exists(&Locator::new("/data")));
        assert!(fs.exists(&Locator::new("/data/docs")));
        let names: Vec<String> = fs
            .enumerate(&Locator::new("/data/docs"))
            .unwrap()
            .map(|e| e.unwrap().display_name)
            .collect();
        assert_eq!(names, vec!["a.txt"]);
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = MemoryEnumerator::new();
        fs.insert_file("/data/docs/a.txt", 3);
        fs.rename("/data/docs", "/data/papers");

        assert!(!fs.exists(&Locator::new("/data/docs")));
        assert!(fs.exists(&Locator::new("/data/papers/a.txt")));
    }

    #[test]
    fn test_fail_after_yields_partial_then_error() {
        let fs = MemoryEnumerator::new();
        fs.insert_file("/d/a", 1);
        fs.insert_file("/d/b", 1);
        fs.fail_after("/d", 1);

        let results: Vec<_> = fs.enumerate(&Locator::new("/d")).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_denied_and_missing() {
        let fs = MemoryEnumerator::new();
        fs.insert_dir("/locked");
        fs.deny("/locked");

        assert!(matches!(
            fs.enumerate(&Locator::new("/locked")),
            Err(FsError::AccessDenied(_))
        ));
        assert!(matches!(
            fs.enumerate(&Locator::new("/missing")),
            Err(FsError::NotFound(_))
        ));
        assert!(fs.exists(&Locator::new("/")));
    }
}
