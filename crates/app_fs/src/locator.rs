//! Locator - hierarchical item identity independent of display name

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// A normalized, fully qualified item path.
///
/// Features:
/// - Lexical normalization (`.` and `..` resolved without touching disk)
/// - Lossy UTF-8 display string for logs
/// - xxh3 hash id of the raw path bytes, used as the enrichment cache key
///
/// Two locators are equal when their normalized paths are equal. Nothing
/// here checks that the item exists; a locator may go stale at any time.
#[derive(Debug, Clone)]
pub struct Locator {
    raw: PathBuf,
    display: String,
    id: u64,
}

impl Locator {
    /// Create a new Locator from any path-like type
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let raw = normalize(path.as_ref());
        let display = raw.to_string_lossy().to_string();
        // Hash the raw bytes; names differing only outside UTF-8 must not collide
        let id = xxh3_64(raw.as_os_str().as_encoded_bytes());
        Self { raw, display, id }
    }

    /// The filesystem path
    pub fn as_path(&self) -> &Path {
        &self.raw
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.raw.clone()
    }

    /// Display string for logs
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Hash id of the normalized path
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Parent locator, `None` at a root
    pub fn parent(&self) -> Option<Self> {
        self.raw.parent().map(Self::new)
    }

    /// Final component
    pub fn file_name(&self) -> Option<&str> {
        self.raw.file_name()?.to_str()
    }

    /// Extension of the final component
    pub fn extension(&self) -> Option<&str> {
        self.raw.extension()?.to_str()
    }

    /// Join with a parent-relative name
    pub fn join<P: AsRef<Path>>(&self, path: P) -> Self {
        Self::new(self.raw.join(path))
    }

    /// Whether this locator has no parent
    pub fn is_root(&self) -> bool {
        self.raw.parent().is_none()
    }

    /// The root this locator hangs from
    pub fn root(&self) -> Self {
        let root = self.raw.ancestors().last().unwrap_or(&self.raw);
        Self::new(root)
    }

    /// Direct child of `container`
    pub fn is_child_of(&self, container: &Locator) -> bool {
        self.raw.parent() == Some(container.raw.as_path())
    }

    /// Strict descendant of `ancestor` at any depth
    pub fn is_descendant_of(&self, ancestor: &Locator) -> bool {
        self.raw != ancestor.raw && self.raw.starts_with(&ancestor.raw)
    }

    /// `self` equals `other` or contains it
    pub fn is_same_or_ancestor_of(&self, other: &Locator) -> bool {
        other.raw.starts_with(&self.raw)
    }

    /// Re-home this locator after `from` moved to `to`.
    ///
    /// Returns `None` when `from` is not this locator or one of its ancestors.
    pub fn rebase(&self, from: &Locator, to: &Locator) -> Option<Self> {
        let rest = self.raw.strip_prefix(&from.raw).ok()?;
        if rest.as_os_str().is_empty() {
            Some(to.clone())
        } else {
            Some(to.join(rest))
        }
    }

    /// Strict ancestors, nearest first, ending at the root
    pub fn ancestors(&self) -> impl Iterator<Item = Locator> + '_ {
        self.raw.ancestors().skip(1).map(Self::new)
    }
}

/// Resolve `.` and `..` lexically. `..` never climbs above the root.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = normalized.parent().is_none() && normalized.has_root();
                if !at_root && !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(Component::CurDir);
    }
    normalized
}

impl PartialEq for Locator {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Locator {}

impl Hash for Locator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl AsRef<Path> for Locator {
    fn as_ref(&self) -> &Path {
        &self.raw
    }
}

impl From<PathBuf> for Locator {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for Locator {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for Locator {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for Locator {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PathBuf::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_hash_apart() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let a = Locator::new("/d").join(OsStr::from_bytes(b"\xffa.txt"));
        let b = Locator::new("/d").join(OsStr::from_bytes(b"\xfea.txt"));
        assert_eq!(a.display(), b.display());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_hash_consistency() {
        let a = Locator::new("/data/photos/cat.jpg");
        let b = Locator::new("/data/photos/./cat.jpg");
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_normalize_parent_dir() {
        let l = Locator::new("/data/photos/../music/song.mp3");
        assert_eq!(l.as_path(), Path::new("/data/music/song.mp3"));

        let above_root = Locator::new("/../etc");
        assert_eq!(above_root.as_path(), Path::new("/etc"));
    }

    #[test]
    fn test_relationships() {
        let container = Locator::new("/data/photos");
        let child = container.join("cat.jpg");
        let grandchild = container.join("trip/beach.jpg");

        assert!(child.is_child_of(&container));
        assert!(!grandchild.is_child_of(&container));
        assert!(grandchild.is_descendant_of(&container));
        assert!(!container.is_descendant_of(&container));
        assert!(container.is_same_or_ancestor_of(&container));
        assert!(Locator::new("/data").is_same_or_ancestor_of(&child));
        assert!(!Locator::new("/dat").is_same_or_ancestor_of(&child));
    }

    #[test]
    fn test_rebase() {
        let container = Locator::new("/data/photos/2024");
        let from = Locator::new("/data/photos");
        let to = Locator::new("/data/pictures");

        assert_eq!(
            container.rebase(&from, &to),
            Some(Locator::new("/data/pictures/2024"))
        );
        assert_eq!(from.rebase(&from, &to), Some(to.clone()));
        assert_eq!(Locator::new("/other").rebase(&from, &to), None);
    }

    #[test]
    fn test_ancestors_end_at_root() {
        let l = Locator::new("/a/b/c");
        let chain: Vec<_> = l.ancestors().map(|a| a.to_string()).collect();
        assert_eq!(chain, vec!["/a/b", "/a", "/"]);
        assert!(Locator::new("/").is_root());
        assert_eq!(l.root(), Locator::new("/"));
    }
}
