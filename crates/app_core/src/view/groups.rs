//! Grouping - key functions and the live group table

use crate::columns::type_text;
use crate::config::{GroupMode, SortDirection};
use crate::entry::{Entry, GroupId};
use app_fs::natural_cmp;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use indexmap::IndexMap;
use std::cmp::Ordering;

/// Label used for entries without a computable key. Always ordered last.
pub const UNSPECIFIED: &str = "Unspecified";

/// What a group key function maps an entry to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub label: String,
    pub rank: i64,
}

impl GroupKey {
    fn new(label: impl Into<String>, rank: i64) -> Self {
        Self {
            label: label.into(),
            rank,
        }
    }

    pub fn unspecified() -> Self {
        Self::new(UNSPECIFIED, i64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub label: String,
    pub relative_rank: i64,
    pub member_count: usize,
}

impl Group {
    pub fn is_unspecified(&self) -> bool {
        self.relative_rank == i64::MAX
    }
}

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Size bands, smallest first
const SIZE_GROUPS: [(u64, &str); 6] = [
    (16 * KB, "Tiny"),
    (MB, "Small"),
    (128 * MB, "Medium"),
    (GB, "Large"),
    (4 * GB, "Huge"),
    (u64::MAX, "Gigantic"),
];

/// Group key of `entry` under `mode`, with dates relative to `now`
pub fn group_key_at(mode: GroupMode, entry: &Entry, now: DateTime<Local>) -> Option<GroupKey> {
    let attrs = &entry.attributes;
    match mode {
        GroupMode::None => None,
        GroupMode::Name => Some(name_group(&entry.display_name)),
        GroupMode::Type => Some(GroupKey::new(type_text(attrs, &entry.extension()), 0)),
        GroupMode::Extension => Some(extension_group(entry)),
        GroupMode::Attributes => Some(GroupKey::new(attrs.flags(), 0)),
        GroupMode::Size => {
            if attrs.is_container {
                return Some(GroupKey::new("Folders", 0));
            }
            if !attrs.is_metadata_valid {
                return None;
            }
            Some(size_group(attrs.size))
        }
        GroupMode::DateModified => date_group(valid(entry, attrs.modified)?, now),
        GroupMode::DateCreated => date_group(valid(entry, attrs.created)?, now),
        GroupMode::DateAccessed => date_group(valid(entry, attrs.accessed)?, now),
    }
}

fn valid(entry: &Entry, date: Option<DateTime<Utc>>) -> Option<Option<DateTime<Utc>>> {
    entry.attributes.is_metadata_valid.then_some(date)
}

fn name_group(name: &str) -> GroupKey {
    match name.chars().next() {
        Some(c) if c.is_alphabetic() => GroupKey::new(c.to_uppercase().collect::<String>(), 0),
        _ => GroupKey::new("Other", 1),
    }
}

fn extension_group(entry: &Entry) -> GroupKey {
    if entry.is_container() {
        return GroupKey::new("Folder", 0);
    }
    match entry.extension() {
        ext if ext.is_empty() => GroupKey::new("No extension", 2),
        ext => GroupKey::new(format!(".{}", ext), 1),
    }
}

fn size_group(size: u64) -> GroupKey {
    if size == 0 {
        return GroupKey::new("Empty", 1);
    }
    let (i, (_, label)) = SIZE_GROUPS
        .iter()
        .enumerate()
        .find(|(_, (limit, _))| size < *limit)
        .unwrap_or((SIZE_GROUPS.len() - 1, &SIZE_GROUPS[SIZE_GROUPS.len() - 1]));
    GroupKey::new(*label, i as i64 + 2)
}

/// Calendar-relative date bands. Weeks start on Sunday.
fn date_group(date: Option<DateTime<Utc>>, now: DateTime<Local>) -> Option<GroupKey> {
    let day = date?.with_timezone(&Local).date_naive();
    let today = now.date_naive();
    let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
    let month_start = first_of_month(today);
    let last_month_start = first_of_month(month_start - Duration::days(1));

    let (label, rank) = if day > today {
        ("Future", 0)
    } else if day == today {
        ("Today", 1)
    } else if day == today - Duration::days(1) {
        ("Yesterday", 2)
    } else if day >= week_start {
        ("This week", 3)
    } else if day >= week_start - Duration::days(7) {
        ("Last week", 4)
    } else if day >= month_start {
        ("This month", 5)
    } else if day >= last_month_start {
        ("Last month", 6)
    } else if day.year() == today.year() {
        ("This year", 7)
    } else if day.year() == today.year() - 1 {
        ("Last year", 8)
    } else {
        ("A long time ago", 9)
    };
    Some(GroupKey::new(label, rank))
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// Live groups. Created on first member, destroyed at zero members.
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: IndexMap<GroupId, Group>,
    by_key: std::collections::HashMap<(String, i64), GroupId>,
    next_id: u64,
    direction: Option<SortDirection>,
    changed: bool,
}

impl GroupTable {
    pub fn new(direction: SortDirection) -> Self {
        Self {
            direction: Some(direction),
            ..Default::default()
        }
    }

    pub fn set_direction(&mut self, direction: SortDirection) {
        self.direction = Some(direction);
    }

    /// Count one member into the group for `key`, creating it if needed
    pub fn acquire(&mut self, key: Option<GroupKey>) -> (GroupId, i64) {
        let key = key.unwrap_or_else(GroupKey::unspecified);
        let lookup = (key.label.clone(), key.rank);
        if let Some(&id) = self.by_key.get(&lookup) {
            if let Some(group) = self.groups.get_mut(&id) {
                group.member_count += 1;
                return (id, group.relative_rank);
            }
        }

        self.next_id += 1;
        let id = GroupId(self.next_id);
        self.groups.insert(
            id,
            Group {
                id,
                label: key.label,
                relative_rank: key.rank,
                member_count: 1,
            },
        );
        self.by_key.insert(lookup, id);
        self.changed = true;
        (id, key.rank)
    }

    /// Count one member out; the group disappears at zero
    pub fn release(&mut self, id: GroupId) {
        let Some(group) = self.groups.get_mut(&id) else {
            return;
        };
        group.member_count = group.member_count.saturating_sub(1);
        if group.member_count == 0 {
            let key = (group.label.clone(), group.relative_rank);
            self.groups.shift_remove(&id);
            self.by_key.remove(&key);
            self.changed = true;
        }
    }

    /// Rank, then label, then direction. Unspecified is last either way.
    pub fn compare(&self, a: GroupId, b: GroupId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (Some(ga), Some(gb)) = (self.groups.get(&a), self.groups.get(&b)) else {
            return a.cmp(&b);
        };
        match (ga.is_unspecified(), gb.is_unspecified()) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        let ordering = ga
            .relative_rank
            .cmp(&gb.relative_rank)
            .then_with(|| natural_cmp(&ga.label, &gb.label))
            .then_with(|| ga.label.cmp(&gb.label));
        self.direction
            .unwrap_or(SortDirection::Ascending)
            .apply(ordering)
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Groups in display order
    pub fn sorted(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = self.groups.values().cloned().collect();
        groups.sort_by(|a, b| self.compare(a.id, b.id));
        groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.groups.is_empty() {
            self.changed = true;
        }
        self.groups.clear();
        self.by_key.clear();
    }

    /// Whether groups were created or destroyed since the last call
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Epoch, InternalId};
    use app_fs::{ItemAttributes, Locator, RawEntry};
    use chrono::TimeZone;

    fn entry(name: &str, attrs: ItemAttributes) -> Entry {
        let raw = RawEntry::new(Locator::new(format!("/d/{}", name)), attrs);
        Entry::new(InternalId(1), Epoch(1), raw)
    }

    fn now() -> DateTime<Local> {
        // Wednesday
        Local.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
    }

    fn modified_on(y: i32, m: u32, d: u32) -> Entry {
        let when = Local.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap().with_timezone(&Utc);
        entry("f", ItemAttributes::file(1).with_modified(when))
    }

    fn label(mode: GroupMode, e: &Entry) -> String {
        group_key_at(mode, e, now()).map(|k| k.label).unwrap_or_default()
    }

    #[test]
    fn test_size_groups_rank_by_band() {
        let empty = group_key_at(GroupMode::Size, &entry("z", ItemAttributes::file(0)), now()).unwrap();
        let small = group_key_at(GroupMode::Size, &entry("a", ItemAttributes::file(500 * KB)), now()).unwrap();
        let medium = group_key_at(GroupMode::Size, &entry("m", ItemAttributes::file(5 * MB)), now()).unwrap();

        assert_eq!(empty.label, "Empty");
        assert_eq!(small.label, "Small");
        assert_eq!(medium.label, "Medium");
        assert!(empty.rank < small.rank && small.rank < medium.rank);
        assert_eq!(label(GroupMode::Size, &entry("b", ItemAttributes::file(5 * GB))), "Gigantic");
        assert_eq!(label(GroupMode::Size, &entry("d", ItemAttributes::container())), "Folders");
    }

    #[test]
    fn test_date_groups() {
        assert_eq!(label(GroupMode::DateModified, &modified_on(2026, 10, 14)), "Today");
        assert_eq!(label(GroupMode::DateModified, &modified_on(2026, 10, 13)), "Yesterday");
        assert_eq!(label(GroupMode::DateModified, &modified_on(2026, 10, 11)), "This week");
        assert_eq!(label(GroupMode::DateModified, &modified_on(2026, 10, 5)), "Last week");
        assert_eq!(label(GroupMode::DateModified, &modified_on(2026, 10, 1)), "This month");
        assert_eq!(label(GroupMode::DateModified, &modified_on(2026, 9, 3)), "Last month");
        assert_eq!(label(GroupMode::DateModified, &modified_on(2026, 2, 3)), "This year");
        assert_eq!(label(GroupMode::DateModified, &modified_on(2025, 2, 3)), "Last year");
        assert_eq!(label(GroupMode::DateModified, &modified_on(2019, 2, 3)), "A long time ago");
        assert_eq!(label(GroupMode::DateModified, &modified_on(2027, 1, 1)), "Future");
        // No timestamp
        assert_eq!(group_key_at(GroupMode::DateModified, &entry("x", ItemAttributes::file(1)), now()), None);
    }

    #[test]
    fn test_name_and_extension_groups() {
        assert_eq!(label(GroupMode::Name, &entry("apple", ItemAttributes::file(1))), "A");
        assert_eq!(label(GroupMode::Name, &entry("1st", ItemAttributes::file(1))), "Other");
        assert_eq!(label(GroupMode::Extension, &entry("a.TXT", ItemAttributes::file(1))), ".txt");
        assert_eq!(label(GroupMode::Extension, &entry("Makefile", ItemAttributes::file(1))), "No extension");
        assert_eq!(label(GroupMode::Extension, &entry("src", ItemAttributes::container())), "Folder");
    }

    #[test]
    fn test_table_lifecycle() {
        let mut table = GroupTable::new(SortDirection::Ascending);
        let (a, _) = table.acquire(Some(GroupKey::new("Small", 3)));
        let (a2, _) = table.acquire(Some(GroupKey::new("Small", 3)));
        assert_eq!(a, a2);
        assert_eq!(table.get(a).unwrap().member_count, 2);
        assert!(table.take_changed());

        table.release(a);
        assert_eq!(table.len(), 1);
        assert!(!table.take_changed());
        table.release(a);
        assert!(table.is_empty());
        assert!(table.take_changed());
    }

    #[test]
    fn test_rank_beats_label_and_unspecified_last() {
        let mut table = GroupTable::new(SortDirection::Descending);
        let (today, _) = table.acquire(Some(GroupKey::new("Today", 1)));
        let (last_week, _) = table.acquire(Some(GroupKey::new("Last week", 4)));
        let (unspecified, _) = table.acquire(None);

        let labels: Vec<String> = table.sorted().into_iter().map(|g| g.label).collect();
        assert_eq!(labels, vec!["Last week", "Today", UNSPECIFIED]);

        table.set_direction(SortDirection::Ascending);
        assert_eq!(table.compare(today, last_week), Ordering::Less);
        assert_eq!(table.compare(unspecified, today), Ordering::Greater);
    }
}
