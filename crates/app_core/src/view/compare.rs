//! Item ordering

use crate::columns::type_text;
use crate::config::{ContainerPlacement, SortDirection, SortMode};
use crate::entry::Entry;
use app_fs::natural_cmp;
use std::cmp::Ordering;

/// Orders entries: container placement, then the mode key, then natural
/// case-insensitive display name, then id. The direction inverts the
/// whole result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparator {
    pub mode: SortMode,
    pub direction: SortDirection,
    pub placement: ContainerPlacement,
}

impl Default for Comparator {
    fn default() -> Self {
        Self {
            mode: SortMode::Name,
            direction: SortDirection::Ascending,
            placement: ContainerPlacement::First,
        }
    }
}

impl Comparator {
    pub fn compare(&self, a: &Entry, b: &Entry) -> Ordering {
        let ordering = self
            .placement_cmp(a, b)
            .then_with(|| self.mode_cmp(a, b))
            .then_with(|| natural_cmp(&a.display_name, &b.display_name))
            .then_with(|| a.id.cmp(&b.id));
        self.direction.apply(ordering)
    }

    fn placement_cmp(&self, a: &Entry, b: &Entry) -> Ordering {
        let (ac, bc) = (a.is_container(), b.is_container());
        match self.placement {
            ContainerPlacement::First => bc.cmp(&ac),
            ContainerPlacement::Last => ac.cmp(&bc),
            ContainerPlacement::Mixed => Ordering::Equal,
        }
    }

    fn mode_cmp(&self, a: &Entry, b: &Entry) -> Ordering {
        let (aa, ba) = (&a.attributes, &b.attributes);
        match self.mode {
            SortMode::Name => Ordering::Equal,
            SortMode::Type => {
                let ta = type_text(aa, &a.extension()).to_lowercase();
                let tb = type_text(ba, &b.extension()).to_lowercase();
                ta.cmp(&tb)
            }
            SortMode::Extension => a.extension().cmp(&b.extension()),
            SortMode::Attributes => aa.flags().cmp(&ba.flags()),
            // Items without metadata sort ahead of those with it
            SortMode::Size => metadata_cmp(a, b, |e| e.attributes.size),
            SortMode::DateModified => metadata_cmp(a, b, |e| e.attributes.modified),
            SortMode::DateCreated => metadata_cmp(a, b, |e| e.attributes.created),
            SortMode::DateAccessed => metadata_cmp(a, b, |e| e.attributes.accessed),
        }
    }
}

fn metadata_cmp<K: Ord>(a: &Entry, b: &Entry, key: impl Fn(&Entry) -> K) -> Ordering {
    let (av, bv) = (a.attributes.is_metadata_valid, b.attributes.is_metadata_valid);
    match (av, bv) {
        (true, true) => key(a).cmp(&key(b)),
        _ => av.cmp(&bv),
    }
}
