//! ItemRegistry - the authoritative set of entries for the open container
//!
//! Entries live in an arena keyed by `InternalId`. Nothing else owns an
//! entry; the view, scheduler and surface only hold ids.
//!
//! Bulk enumeration goes through `stage`/`commit_staged`: staged entries are
//! invisible to lookups until the commit publishes all of them at once.
//! Incremental changes use `add`/`remove`/`rename`/`update_metadata`.

use crate::entry::{Entry, Epoch, InternalId, ItemSnapshot};
use app_fs::{ItemAttributes, Locator, RawEntry};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::ffi::OsString;

#[derive(Default)]
pub struct ItemRegistry {
    container: Option<Locator>,
    epoch: Epoch,
    next_id: u64,
    entries: IndexMap<InternalId, Entry>,
    /// parsing name -> id, committed entries only
    by_name: HashMap<OsString, InternalId>,
    staged: IndexMap<OsString, Entry>,
    staging: bool,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new container generation.
    ///
    /// Drops every entry of the previous container. Ids keep counting up, so
    /// an id never names two different entries.
    pub fn begin_epoch(&mut self, container: Locator) -> Epoch {
        self.epoch = self.epoch.next();
        self.entries.clear();
        self.by_name.clear();
        self.staged.clear();
        self.staging = true;
        tracing::debug!(epoch = self.epoch.0, container = %container, "Registry reset");
        self.container = Some(container);
        self.epoch
    }

    /// Allocate an identity for an enumerated item without publishing it.
    ///
    /// Staging the same parsing name twice keeps the first identity and the
    /// latest metadata.
    pub fn stage(&mut self, raw: RawEntry) -> InternalId {
        if let Some(existing) = self.staged.get_mut(&raw.parsing_name) {
            existing.attributes = raw.attributes;
            return existing.id;
        }
        let id = self.allocate();
        let name = raw.parsing_name.clone();
        self.staged.insert(name, Entry::new(id, self.epoch, raw));
        id
    }

    /// Publish everything staged, in staging order
    pub fn commit_staged(&mut self) -> Vec<InternalId> {
        let staged = std::mem::take(&mut self.staged);
        let mut ids = Vec::with_capacity(staged.len());
        for (name, entry) in staged {
            // An incremental add may have raced ahead of the commit
            if let Some(old) = self.by_name.insert(name, entry.id) {
                self.entries.shift_remove(&old);
            }
            ids.push(entry.id);
            self.entries.insert(entry.id, entry);
        }
        self.staging = false;
        tracing::debug!(epoch = self.epoch.0, count = ids.len(), "Staged entries committed");
        ids
    }

    /// Add one entry immediately. Returns the existing id if the parsing
    /// name is already known, after refreshing its metadata.
    pub fn add(&mut self, raw: RawEntry) -> InternalId {
        if let Some(&id) = self.by_name.get(&raw.parsing_name) {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.attributes = raw.attributes;
            }
            return id;
        }
        let id = self.allocate();
        self.by_name.insert(raw.parsing_name.clone(), id);
        self.entries.insert(id, Entry::new(id, self.epoch, raw));
        id
    }

    pub fn remove(&mut self, id: InternalId) -> Option<Entry> {
        let entry = self.entries.shift_remove(&id)?;
        self.by_name.remove(&entry.parsing_name);
        Some(entry)
    }

    /// Committed entry at `locator`, if it is a direct child of the container
    pub fn find_by_locator(&self, locator: &Locator) -> Option<InternalId> {
        let container = self.container.as_ref()?;
        if !locator.is_child_of(container) {
            return None;
        }
        self.by_name.get(locator.as_path().file_name()?).copied()
    }

    /// Replace the metadata of an entry. A stale epoch or unknown id is a
    /// no-op and returns false.
    pub fn update_metadata(&mut self, epoch: Epoch, id: InternalId, attributes: ItemAttributes) -> bool {
        if epoch != self.epoch {
            tracing::debug!(%id, stale = epoch.0, current = self.epoch.0, "Stale metadata update dropped");
            return false;
        }
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.attributes = attributes;
                true
            }
            None => false,
        }
    }

    /// Give an entry new names and metadata, keeping its identity
    pub fn rename(&mut self, id: InternalId, raw: RawEntry) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        self.by_name.remove(&entry.parsing_name);
        self.by_name.insert(raw.parsing_name.clone(), id);
        entry.rename_from(raw);
        true
    }

    /// Substitute the container locator in place. Entries are untouched;
    /// their full locators follow the new container.
    pub fn set_container(&mut self, container: Locator) {
        self.container = Some(container);
    }

    pub fn container(&self) -> Option<&Locator> {
        self.container.as_ref()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Between `begin_epoch` and `commit_staged`
    pub fn is_staging(&self) -> bool {
        self.staging
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn get(&self, id: InternalId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: InternalId) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: InternalId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Fully qualified locator of a committed entry
    pub fn full_locator(&self, id: InternalId) -> Option<Locator> {
        let entry = self.entries.get(&id)?;
        Some(self.container.as_ref()?.join(&entry.parsing_name))
    }

    /// Worker-safe copy of an entry
    pub fn snapshot(&self, id: InternalId) -> Option<ItemSnapshot> {
        let entry = self.entries.get(&id)?;
        Some(ItemSnapshot {
            id,
            locator: self.full_locator(id)?,
            display_name: entry.display_name.clone(),
            attributes: entry.attributes.clone(),
        })
    }

    /// Committed entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<InternalId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn allocate(&mut self) -> InternalId {
        self.next_id += 1;
        InternalId(self.next_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(path: &str, size: u64) -> RawEntry {
        RawEntry::new(Locator::new(path), ItemAttributes::file(size))
    }

    #[test]
    fn test_staged_entries_invisible_until_commit() {
        let mut reg = ItemRegistry::new();
        reg.begin_epoch(Locator::new("/d"));
        let a = reg.stage(raw("/d/a.txt", 1));
        let b = reg.stage(raw("/d/b.txt", 2));

        assert!(reg.is_empty());
        assert_eq!(reg.find_by_locator(&Locator::new("/d/a.txt")), None);
        assert!(reg.is_staging());

        let ids = reg.commit_staged();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.find_by_locator(&Locator::new("/d/a.txt")), Some(a));
        assert!(!reg.is_staging());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_keep_separate_identities() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let container = Locator::new("/d");
        let first = container.join(OsStr::from_bytes(b"\xffa.txt"));
        let second = container.join(OsStr::from_bytes(b"\xfea.txt"));

        let mut reg = ItemRegistry::new();
        reg.begin_epoch(container);
        let a = reg.stage(RawEntry::new(first.clone(), ItemAttributes::file(1)));
        let b = reg.stage(RawEntry::new(second.clone(), ItemAttributes::file(2)));
        reg.commit_staged();

        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.find_by_locator(&first), Some(a));
        assert_eq!(reg.find_by_locator(&second), Some(b));
        assert_eq!(reg.full_locator(a), Some(first));
        assert_eq!(reg.get(a).unwrap().display_name, "\u{fffd}a.txt");
    }

    #[test]
    fn test_ids_unique_across_epochs() {
        let mut reg = ItemRegistry::new();
        reg.begin_epoch(Locator::new("/d"));
        let first = reg.stage(raw("/d/a.txt", 1));
        reg.commit_staged();

        reg.begin_epoch(Locator::new("/e"));
        let second = reg.stage(raw("/e/a.txt", 1));
        reg.commit_staged();

        assert_ne!(first, second);
        assert!(!reg.contains(first));
    }

    #[test]
    fn test_duplicate_stage_keeps_identity() {
        let mut reg = ItemRegistry::new();
        reg.begin_epoch(Locator::new("/d"));
        let a = reg.stage(raw("/d/a.txt", 1));
        let again = reg.stage(raw("/d/a.txt", 9));
        assert_eq!(a, again);

        reg.commit_staged();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(a).unwrap().attributes.size, 9);
    }

    #[test]
    fn test_update_metadata_stale_epoch_is_noop() {
        let mut reg = ItemRegistry::new();
        let old_epoch = reg.begin_epoch(Locator::new("/d"));
        let a = reg.stage(raw("/d/a.txt", 1));
        reg.commit_staged();

        assert!(reg.update_metadata(old_epoch, a, ItemAttributes::file(5)));
        assert_eq!(reg.get(a).unwrap().attributes.size, 5);

        reg.begin_epoch(Locator::new("/d"));
        let b = reg.stage(raw("/d/a.txt", 1));
        reg.commit_staged();
        assert!(!reg.update_metadata(old_epoch, b, ItemAttributes::file(7)));
        assert_eq!(reg.get(b).unwrap().attributes.size, 1);
    }

    #[test]
    fn test_rename_keeps_id_and_reindexes() {
        let mut reg = ItemRegistry::new();
        reg.begin_epoch(Locator::new("/d"));
        let a = reg.stage(raw("/d/A.txt", 1));
        reg.commit_staged();

        assert!(reg.rename(a, raw("/d/A2.txt", 1)));
        assert_eq!(reg.find_by_locator(&Locator::new("/d/A2.txt")), Some(a));
        assert_eq!(reg.find_by_locator(&Locator::new("/d/A.txt")), None);
        assert_eq!(reg.get(a).unwrap().display_name, "A2.txt");
    }

    #[test]
    fn test_container_substitution_moves_full_locators() {
        let mut reg = ItemRegistry::new();
        reg.begin_epoch(Locator::new("/d"));
        let a = reg.stage(raw("/d/a.txt", 1));
        reg.commit_staged();

        reg.set_container(Locator::new("/moved"));
        assert_eq!(reg.full_locator(a), Some(Locator::new("/moved/a.txt")));
        assert_eq!(reg.find_by_locator(&Locator::new("/moved/a.txt")), Some(a));
        assert_eq!(reg.snapshot(a).unwrap().locator, Locator::new("/moved/a.txt"));
    }

    #[test]
    fn test_add_known_name_returns_existing() {
        let mut reg = ItemRegistry::new();
        reg.begin_epoch(Locator::new("/d"));
        reg.commit_staged();
        let a = reg.add(raw("/d/a.txt", 1));
        let again = reg.add(raw("/d/a.txt", 3));

        assert_eq!(a, again);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(a).unwrap().attributes.size, 3);
        assert!(reg.remove(a).is_some());
        assert!(reg.remove(a).is_none());
    }
}
