//! SortGroupFilterEngine - presentation order over the registry
//!
//! Holds ids only. Entries are read from (and group keys written to) the
//! `ItemRegistry` passed into each call. Callers must remove an item from
//! the view before removing it from the registry so its group is released.

use super::compare::Comparator;
use super::filter::WildcardFilter;
use super::groups::{group_key_at, Group, GroupKey, GroupTable};
use crate::columns::{ColumnKind, ColumnSet};
use crate::config::{ContainerPlacement, FolderSettings, GroupMode, SortDirection, SortMode};
use crate::entry::{Entry, InternalId};
use crate::error::EngineError;
use crate::registry::ItemRegistry;
use chrono::{DateTime, Local};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Visible index of an item before and after a change. `None` means the
/// item was (or is now) filtered or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub before: Option<usize>,
    pub after: Option<usize>,
}

pub struct ViewEngine {
    comparator: Comparator,
    group_mode: GroupMode,
    groups: GroupTable,
    filter: Option<WildcardFilter>,
    show_hidden: bool,
    show_system: bool,
    columns: ColumnSet,
    order: Vec<InternalId>,
    filtered: BTreeSet<InternalId>,
}

impl ViewEngine {
    pub fn new(settings: &FolderSettings, columns: &[ColumnKind]) -> Result<Self, EngineError> {
        let mut view = Self {
            comparator: Comparator::default(),
            group_mode: GroupMode::None,
            groups: GroupTable::new(settings.group_direction),
            filter: None,
            show_hidden: true,
            show_system: true,
            columns: ColumnSet::new(columns),
            order: Vec::new(),
            filtered: BTreeSet::new(),
        };
        view.load_settings(settings)?;
        Ok(view)
    }

    /// Apply a whole settings block, then rebuild once
    pub fn apply_settings(&mut self, settings: &FolderSettings, reg: &mut ItemRegistry) -> Result<(), EngineError> {
        self.load_settings(settings)?;
        self.rebuild(reg);
        Ok(())
    }

    fn load_settings(&mut self, settings: &FolderSettings) -> Result<(), EngineError> {
        let filter = settings
            .active_filter()
            .map(|p| WildcardFilter::new(p, settings.filter_case_sensitive))
            .transpose()?;
        self.filter = filter;
        self.comparator = Comparator {
            mode: settings.sort_mode,
            direction: settings.sort_direction,
            placement: settings.container_placement,
        };
        self.group_mode = settings.group_mode;
        self.groups.set_direction(settings.group_direction);
        self.show_hidden = settings.show_hidden;
        self.show_system = settings.show_system;
        if !self.columns.is_visible(self.comparator.mode.column()) {
            self.columns.show(self.comparator.mode.column());
        }
        Ok(())
    }

    pub fn set_comparator(&mut self, mode: SortMode, direction: SortDirection, reg: &mut ItemRegistry) {
        self.comparator.mode = mode;
        self.comparator.direction = direction;
        self.columns.show(mode.column());
        self.reorder(reg);
    }

    pub fn set_container_placement(&mut self, placement: ContainerPlacement, reg: &mut ItemRegistry) {
        self.comparator.placement = placement;
        self.reorder(reg);
    }

    /// `GroupMode::None` turns grouping off
    pub fn set_group_key_fn(&mut self, mode: GroupMode, direction: SortDirection, reg: &mut ItemRegistry) {
        self.group_mode = mode;
        self.groups.set_direction(direction);
        self.rebuild(reg);
    }

    /// Replace the filter. `None` passes every name.
    ///
    /// An invalid pattern leaves the current filter in place.
    pub fn set_filter(
        &mut self,
        pattern: Option<&str>,
        case_sensitive: bool,
        reg: &mut ItemRegistry,
    ) -> Result<(), EngineError> {
        self.filter = pattern
            .map(|p| WildcardFilter::new(p, case_sensitive))
            .transpose()?;
        self.rebuild(reg);
        Ok(())
    }

    pub fn set_show_hidden(&mut self, show: bool, reg: &mut ItemRegistry) {
        self.show_hidden = show;
        self.rebuild(reg);
    }

    pub fn set_show_system(&mut self, show: bool, reg: &mut ItemRegistry) {
        self.show_system = show;
        self.rebuild(reg);
    }

    /// Show or hide a column. Hiding the sorted-by column falls back to the
    /// first remaining visible sortable column and re-sorts; returns true
    /// when that happened.
    pub fn set_column_visible(&mut self, column: ColumnKind, visible: bool, reg: &mut ItemRegistry) -> bool {
        if visible {
            self.columns.show(column);
            return false;
        }
        if !self.columns.hide(column) || self.comparator.mode.column() != column {
            return false;
        }
        let fallback = self.columns.first_sortable();
        tracing::info!(hidden = ?column, ?fallback, "Sorted-by column hidden; falling back");
        self.comparator.mode = fallback;
        self.reorder(reg);
        true
    }

    /// Re-sort the visible items with the current comparator and groups
    pub fn reorder(&mut self, reg: &ItemRegistry) {
        let mut order = std::mem::take(&mut self.order);
        order.sort_by(|a, b| self.cmp_ids(reg, *a, *b));
        self.order = order;
    }

    /// Re-evaluate filter and group key of every committed entry, then sort.
    /// Restored items land where the current comparator puts them.
    pub fn rebuild(&mut self, reg: &mut ItemRegistry) {
        let now = Local::now();
        self.groups.clear();
        self.order.clear();
        self.filtered.clear();

        for id in reg.ids() {
            if let Some(entry) = reg.get_mut(id) {
                entry.sort_group_key = None;
                entry.relative_sort_rank = None;
            }
            if self.passes_id(reg, id) {
                self.attach_group(reg, id, now);
                self.order.push(id);
            } else {
                self.filtered.insert(id);
            }
        }
        self.reorder(reg);
        tracing::debug!(
            visible = self.order.len(),
            filtered = self.filtered.len(),
            groups = self.groups.len(),
            "View rebuilt"
        );
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.filtered.clear();
        self.groups.clear();
    }

    /// Place a newly added item. Returns its visible index, `None` when
    /// it went to the filtered set.
    pub fn insert(&mut self, reg: &mut ItemRegistry, id: InternalId) -> Option<usize> {
        if !reg.contains(id) || self.order.contains(&id) || self.filtered.contains(&id) {
            return self.position(id);
        }
        if !self.passes_id(reg, id) {
            self.filtered.insert(id);
            return None;
        }
        self.attach_group(reg, id, Local::now());
        let index = self.search(reg, id);
        self.order.insert(index, id);
        Some(index)
    }

    /// Take an item out of the view. Returns the visible index it had.
    pub fn remove(&mut self, reg: &mut ItemRegistry, id: InternalId) -> Option<usize> {
        self.filtered.remove(&id);
        let index = self.position(id);
        if let Some(i) = index {
            self.order.remove(i);
        }
        self.detach_group(reg, id);
        index
    }

    /// Re-place an item whose names or metadata changed
    pub fn refresh_item(&mut self, reg: &mut ItemRegistry, id: InternalId) -> Placement {
        let before = self.position(id);
        if let Some(i) = before {
            self.order.remove(i);
        }
        self.filtered.remove(&id);

        if !reg.contains(id) {
            self.detach_group(reg, id);
            return Placement { before, after: None };
        }

        if !self.passes_id(reg, id) {
            self.detach_group(reg, id);
            self.filtered.insert(id);
            return Placement { before, after: None };
        }

        let now = Local::now();
        let key = reg
            .get(id)
            .and_then(|e| group_key_at(self.group_mode, e, now))
            .unwrap_or_else(GroupKey::unspecified);
        let current = reg
            .get(id)
            .and_then(|e| e.sort_group_key)
            .and_then(|g| self.groups.get(g))
            .map(|g| GroupKey {
                label: g.label.clone(),
                rank: g.relative_rank,
            });
        let unchanged = self.group_mode != GroupMode::None && current.as_ref() == Some(&key);
        if !unchanged {
            self.detach_group(reg, id);
            self.attach_group(reg, id, now);
        }

        let index = self.search(reg, id);
        self.order.insert(index, id);
        Placement {
            before,
            after: Some(index),
        }
    }

    pub fn order(&self) -> &[InternalId] {
        &self.order
    }

    pub fn filtered(&self) -> &BTreeSet<InternalId> {
        &self.filtered
    }

    pub fn is_filtered(&self, id: InternalId) -> bool {
        self.filtered.contains(&id)
    }

    pub fn position(&self, id: InternalId) -> Option<usize> {
        self.order.iter().position(|&o| o == id)
    }

    /// Live groups in display order; empty when grouping is off
    pub fn groups(&self) -> Vec<Group> {
        if self.group_mode == GroupMode::None {
            return Vec::new();
        }
        self.groups.sorted()
    }

    pub fn group(&self, id: crate::entry::GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    /// Whether groups appeared or disappeared since the last call
    pub fn take_groups_changed(&mut self) -> bool {
        self.groups.take_changed()
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    pub fn group_mode(&self) -> GroupMode {
        self.group_mode
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn filter(&self) -> Option<&WildcardFilter> {
        self.filter.as_ref()
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    fn passes(&self, entry: &Entry) -> bool {
        if entry.attributes.hidden && !self.show_hidden {
            return false;
        }
        if entry.attributes.system && !self.show_system {
            return false;
        }
        self.filter
            .as_ref()
            .map_or(true, |f| f.matches(&entry.display_name))
    }

    fn passes_id(&self, reg: &ItemRegistry, id: InternalId) -> bool {
        reg.get(id).map_or(false, |e| self.passes(e))
    }

    fn attach_group(&mut self, reg: &mut ItemRegistry, id: InternalId, now: DateTime<Local>) {
        if self.group_mode == GroupMode::None {
            return;
        }
        let Some(key) = reg.get(id).map(|e| group_key_at(self.group_mode, e, now)) else {
            return;
        };
        let (group, rank) = self.groups.acquire(key);
        if let Some(entry) = reg.get_mut(id) {
            entry.sort_group_key = Some(group);
            entry.relative_sort_rank = Some(rank);
        }
    }

    fn detach_group(&mut self, reg: &mut ItemRegistry, id: InternalId) {
        let Some(entry) = reg.get_mut(id) else {
            return;
        };
        entry.relative_sort_rank = None;
        if let Some(group) = entry.sort_group_key.take() {
            self.groups.release(group);
        }
    }

    fn search(&self, reg: &ItemRegistry, id: InternalId) -> usize {
        match self.order.binary_search_by(|other| self.cmp_ids(reg, *other, id)) {
            Ok(i) | Err(i) => i,
        }
    }

    fn cmp_ids(&self, reg: &ItemRegistry, a: InternalId, b: InternalId) -> Ordering {
        let (Some(ea), Some(eb)) = (reg.get(a), reg.get(b)) else {
            return a.cmp(&b);
        };
        let by_group = match (ea.sort_group_key, eb.sort_group_key) {
            (Some(ga), Some(gb)) if self.group_mode != GroupMode::None => self.groups.compare(ga, gb),
            _ => Ordering::Equal,
        };
        by_group.then_with(|| self.comparator.compare(ea, eb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_fs::{ItemAttributes, Locator, RawEntry};

    fn registry(items: &[(&str, ItemAttributes)]) -> (ItemRegistry, Vec<InternalId>) {
        let mut reg = ItemRegistry::new();
        reg.begin_epoch(Locator::new("/d"));
        for (name, attrs) in items {
            reg.stage(RawEntry::new(Locator::new(format!("/d/{}", name)), attrs.clone()));
        }
        let ids = reg.commit_staged();
        (reg, ids)
    }

    fn abc() -> (ItemRegistry, Vec<InternalId>) {
        registry(&[
            ("A.txt", ItemAttributes::file(10)),
            ("B", ItemAttributes::container()),
            ("c.txt", ItemAttributes::file(5)),
        ])
    }

    fn names(view: &ViewEngine, reg: &ItemRegistry) -> Vec<String> {
        view.order()
            .iter()
            .map(|id| reg.get(*id).unwrap().display_name.clone())
            .collect()
    }

    fn view() -> ViewEngine {
        ViewEngine::new(&FolderSettings::default(), &[ColumnKind::Name, ColumnKind::Size]).unwrap()
    }

    #[test]
    fn test_default_order() {
        let (mut reg, _) = abc();
        let mut v = view();
        v.rebuild(&mut reg);
        assert_eq!(names(&v, &reg), vec!["B", "A.txt", "c.txt"]);
    }

    #[test]
    fn test_filter_moves_container_to_filtered_set() {
        let (mut reg, ids) = abc();
        let mut v = view();
        v.rebuild(&mut reg);
        v.set_filter(Some("*.txt"), false, &mut reg).unwrap();

        assert_eq!(names(&v, &reg), vec!["A.txt", "c.txt"]);
        assert_eq!(v.filtered().len(), 1);
        assert!(v.is_filtered(ids[1]));
    }

    #[test]
    fn test_filter_idempotent_and_round_trip() {
        let (mut reg, _) = abc();
        let mut v = view();
        v.rebuild(&mut reg);
        let original = v.order().to_vec();

        v.set_filter(Some("*.txt"), false, &mut reg).unwrap();
        let once = (v.order().to_vec(), v.filtered().clone());
        v.set_filter(Some("*.txt"), false, &mut reg).unwrap();
        assert_eq!(once, (v.order().to_vec(), v.filtered().clone()));

        // Sort mode changes while items are hidden; restore uses the new order
        v.set_comparator(SortMode::Size, SortDirection::Descending, &mut reg);
        v.set_filter(None, false, &mut reg).unwrap();
        assert!(v.filtered().is_empty());
        assert_eq!(names(&v, &reg), vec!["A.txt", "c.txt", "B"]);
        assert_ne!(v.order(), original.as_slice());
    }

    #[test]
    fn test_show_hidden_off_filters_hidden() {
        let (mut reg, _) = registry(&[
            (".git", ItemAttributes::container().with_hidden(true)),
            ("main.rs", ItemAttributes::file(1)),
        ]);
        let mut v = view();
        v.set_show_hidden(false, &mut reg);
        assert_eq!(names(&v, &reg), vec!["main.rs"]);
        v.set_show_hidden(true, &mut reg);
        assert_eq!(names(&v, &reg), vec![".git", "main.rs"]);
    }

    #[test]
    fn test_size_grouping_counts_and_order() {
        let (mut reg, _) = registry(&[
            ("a", ItemAttributes::file(5 * 1024 * 1024)),
            ("b", ItemAttributes::file(0)),
            ("c", ItemAttributes::file(500 * 1024)),
        ]);
        let mut v = view();
        v.set_group_key_fn(GroupMode::Size, SortDirection::Ascending, &mut reg);

        let groups = v.groups();
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Empty", "Small", "Medium"]);
        assert!(groups.iter().all(|g| g.member_count == 1));
        assert!(groups[0].relative_rank < groups[1].relative_rank);
        assert!(groups[1].relative_rank < groups[2].relative_rank);
        // Group order wins over name order
        assert_eq!(names(&v, &reg), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_group_counts_exclude_filtered() {
        let (mut reg, _) = registry(&[
            ("a.txt", ItemAttributes::file(0)),
            ("b.log", ItemAttributes::file(0)),
        ]);
        let mut v = view();
        v.set_group_key_fn(GroupMode::Size, SortDirection::Ascending, &mut reg);
        assert_eq!(v.groups()[0].member_count, 2);

        v.set_filter(Some("*.txt"), false, &mut reg).unwrap();
        assert_eq!(v.groups()[0].member_count, 1);

        v.set_filter(Some("*.md"), false, &mut reg).unwrap();
        assert!(v.groups().is_empty());
        assert!(reg.iter().all(|e| e.sort_group_key.is_none()));
    }

    #[test]
    fn test_insert_remove_refresh() {
        let (mut reg, ids) = abc();
        let mut v = view();
        v.rebuild(&mut reg);

        let d = reg.add(RawEntry::new(Locator::new("/d/b.txt"), ItemAttributes::file(1)));
        assert_eq!(v.insert(&mut reg, d), Some(2));
        assert_eq!(names(&v, &reg), vec!["B", "A.txt", "b.txt", "c.txt"]);

        // A.txt -> z.txt moves to the end
        reg.rename(ids[0], RawEntry::new(Locator::new("/d/z.txt"), ItemAttributes::file(10)));
        let placement = v.refresh_item(&mut reg, ids[0]);
        assert_eq!(placement, Placement { before: Some(1), after: Some(3) });

        assert_eq!(v.remove(&mut reg, d), Some(1));
        reg.remove(d);
        assert_eq!(names(&v, &reg), vec!["B", "c.txt", "z.txt"]);
    }

    #[test]
    fn test_hiding_sorted_column_falls_back() {
        let (mut reg, _) = abc();
        let mut v = view();
        v.set_comparator(SortMode::Size, SortDirection::Ascending, &mut reg);
        v.rebuild(&mut reg);

        assert!(v.set_column_visible(ColumnKind::Size, false, &mut reg));
        assert_eq!(v.comparator().mode, SortMode::Name);
        assert_eq!(names(&v, &reg), vec!["B", "A.txt", "c.txt"]);

        // Hiding an unrelated column leaves the sort alone
        assert!(!v.set_column_visible(ColumnKind::Type, false, &mut reg));
    }
}
