//! Directory enumeration - raw entries and the `Enumerator` seam

use crate::{FsError, Locator, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Structured metadata for one item.
///
/// `is_metadata_valid` is false when the item was listed but its metadata
/// could not be read; every other field then holds a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttributes {
    pub is_container: bool,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub hidden: bool,
    pub system: bool,
    pub read_only: bool,
    pub is_metadata_valid: bool,
}

impl ItemAttributes {
    /// A plain file of `size` bytes
    pub fn file(size: u64) -> Self {
        Self {
            size,
            is_metadata_valid: true,
            ..Default::default()
        }
    }

    /// A container (directory)
    pub fn container() -> Self {
        Self {
            is_container: true,
            is_metadata_valid: true,
            ..Default::default()
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Read attributes from filesystem metadata
    pub fn from_metadata(path: &Path, metadata: &fs::Metadata) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (hidden, system) = hidden_and_system(metadata, &name);

        Self {
            is_container: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            created: metadata.created().ok().map(to_utc),
            modified: metadata.modified().ok().map(to_utc),
            accessed: metadata.accessed().ok().map(to_utc),
            hidden,
            system,
            read_only: metadata.permissions().readonly(),
            is_metadata_valid: true,
        }
    }

    /// Short attribute string, e.g. `DHR-`
    pub fn flags(&self) -> String {
        let mut s = String::with_capacity(4);
        s.push(if self.is_container { 'D' } else { '-' });
        s.push(if self.hidden { 'H' } else { '-' });
        s.push(if self.read_only { 'R' } else { '-' });
        s.push(if self.system { 'S' } else { '-' });
        s
    }
}

fn to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

/// One enumerated item, as handed over by an `Enumerator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Fully qualified locator
    pub locator: Locator,
    /// Presentation form
    pub display_name: String,
    /// Exact-match form, unique within the container. Kept as the raw file
    /// name so names that are not valid UTF-8 stay distinct.
    pub parsing_name: OsString,
    /// Form offered in a rename prompt
    pub edit_name: String,
    pub attributes: ItemAttributes,
}

impl RawEntry {
    /// Build an entry named after the locator's final component. Display and
    /// edit names are its lossy UTF-8 form.
    pub fn new(locator: Locator, attributes: ItemAttributes) -> Self {
        let path = locator.as_path();
        let parsing_name = path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_os_string();
        let name = parsing_name.to_string_lossy().into_owned();
        Self {
            locator,
            display_name: name.clone(),
            parsing_name,
            edit_name: name,
            attributes,
        }
    }

    /// Create an entry from a filesystem path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| FsError::from_io(e, path))?;
        Ok(Self::new(
            Locator::new(path),
            ItemAttributes::from_metadata(path, &metadata),
        ))
    }

    /// Entry for an item that is listed but whose metadata is unreadable
    pub fn without_metadata(locator: Locator) -> Self {
        Self::new(locator, ItemAttributes::default())
    }

    /// Lower-cased extension, empty for containers and extensionless names
    pub fn extension(&self) -> String {
        if self.attributes.is_container {
            return String::new();
        }
        extension_of(&self.parsing_name.to_string_lossy())
    }
}

/// Lower-cased extension of a name, without the dot
pub fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(0) | None => String::new(),
        Some(i) => name[i + 1..].to_lowercase(),
    }
}

/// Lazy, possibly failing stream of entries
pub type EntryStream = Box<dyn Iterator<Item = Result<RawEntry>> + Send>;

/// Source of container contents.
///
/// `enumerate` fails outright when the container cannot be opened; errors
/// yielded by the stream afterwards are mid-stream failures.
pub trait Enumerator: Send + Sync + 'static {
    fn enumerate(&self, container: &Locator) -> Result<EntryStream>;

    /// Read one item's current metadata
    fn resolve(&self, locator: &Locator) -> Result<RawEntry>;

    fn exists(&self, locator: &Locator) -> bool;
}

/// `Enumerator` over the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsEnumerator;

impl Enumerator for FsEnumerator {
    fn enumerate(&self, container: &Locator) -> Result<EntryStream> {
        let path = container.as_path();
        let metadata = fs::metadata(path).map_err(|e| FsError::from_io(e, path))?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory(container.to_string()));
        }

        let read_dir = fs::read_dir(path).map_err(|e| FsError::from_io(e, path))?;
        let stream = read_dir.map(|entry| -> Result<RawEntry> {
            let entry = entry?;
            let path = entry.path();
            // A listed item whose metadata vanished still belongs in the listing
            Ok(match entry.metadata() {
                Ok(metadata) => RawEntry::new(
                    Locator::new(&path),
                    ItemAttributes::from_metadata(&path, &metadata),
                ),
                Err(e) => {
                    tracing::debug!("Metadata unavailable for {}: {}", path.display(), e);
                    RawEntry::without_metadata(Locator::new(&path))
                }
            })
        });
        Ok(Box::new(stream))
    }

    fn resolve(&self, locator: &Locator) -> Result<RawEntry> {
        RawEntry::from_path(locator.as_path())
    }

    fn exists(&self, locator: &Locator) -> bool {
        locator.as_path().exists()
    }
}

/// Generate a natural sort key (handles numbers correctly)
/// "image2.jpg" < "image10.jpg"
pub fn natural_sort_key(s: &str) -> Vec<NaturalSortPart> {
    let mut parts = Vec::new();
    let mut current_num = String::new();
    let mut current_str = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            if !current_str.is_empty() {
                parts.push(NaturalSortPart::Str(current_str.to_lowercase()));
                current_str.clear();
            }
            current_num.push(c);
        } else {
            if !current_num.is_empty() {
                parts.push(NaturalSortPart::num(&current_num));
                current_num.clear();
            }
            current_str.push(c);
        }
    }

    if !current_num.is_empty() {
        parts.push(NaturalSortPart::num(&current_num));
    }
    if !current_str.is_empty() {
        parts.push(NaturalSortPart::Str(current_str.to_lowercase()));
    }

    parts
}

/// Case-insensitive natural comparison of two names
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_sort_key(a).cmp(&natural_sort_key(b))
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NaturalSortPart {
    /// Digit run: value first, then digit count so "01" sorts after "1"
    Num(u64, usize),
    Str(String),
}

impl NaturalSortPart {
    fn num(digits: &str) -> Self {
        // Runs too long for u64 saturate and fall back to their length
        let value = digits.parse::<u64>().unwrap_or(u64::MAX);
        Self::Num(value, digits.len())
    }
}

/// Hidden and system flags
#[cfg(windows)]
fn hidden_and_system(metadata: &fs::Metadata, _name: &str) -> (bool, bool) {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

    let attrs = metadata.file_attributes();
    (
        attrs & FILE_ATTRIBUTE_HIDDEN != 0,
        attrs & FILE_ATTRIBUTE_SYSTEM != 0,
    )
}

#[cfg(not(windows))]
fn hidden_and_system(_metadata: &fs::Metadata, name: &str) -> (bool, bool) {
    (name.starts_with('.'), false)
}
