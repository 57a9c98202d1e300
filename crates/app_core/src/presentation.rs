//! Presentation surface - the consumer side of the listing
//!
//! The surface sees internal ids, display fields and deltas. It never sees
//! locators; anything it needs to act on goes back through the engine by id.

use crate::enrichment::{EnrichmentKind, Payload};
use crate::entry::{Entry, Epoch, GroupId, InternalId};
use crate::view::Group;
use app_fs::ItemAttributes;

/// What the surface may show for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFields {
    pub display_name: String,
    pub edit_name: String,
    pub attributes: ItemAttributes,
    pub group: Option<GroupId>,
}

impl From<&Entry> for DisplayFields {
    fn from(entry: &Entry) -> Self {
        Self {
            display_name: entry.display_name.clone(),
            edit_name: entry.edit_name.clone(),
            attributes: entry.attributes.clone(),
            group: entry.sort_group_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Complete listing of a freshly committed container, in display order
    Listing {
        epoch: Epoch,
        items: Vec<(InternalId, DisplayFields)>,
        groups: Vec<Group>,
    },
    Inserted {
        id: InternalId,
        index: usize,
        fields: DisplayFields,
    },
    Removed {
        id: InternalId,
    },
    /// Fields changed; the item stayed at its index
    Updated {
        id: InternalId,
        fields: DisplayFields,
    },
    /// Fields changed and the item moved
    Moved {
        id: InternalId,
        from: usize,
        to: usize,
        fields: DisplayFields,
    },
    /// Sort, group or filter settings changed; the new visible set in order
    Reordered {
        items: Vec<(InternalId, DisplayFields)>,
    },
    GroupsChanged {
        groups: Vec<Group>,
    },
    FieldReady {
        id: InternalId,
        kind: EnrichmentKind,
        payload: Payload,
    },
    /// Enumeration stopped early; the listing holds what was read
    EnumerationIncomplete {
        reason: String,
    },
    NavigationFailed {
        error: String,
    },
}

/// Receives model deltas on the model thread
pub trait PresentationSurface {
    fn deliver(&mut self, event: SurfaceEvent);
}

/// Surface that keeps every event and mirrors the visible order
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub events: Vec<SurfaceEvent>,
    visible: Vec<(InternalId, DisplayFields)>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visible display names, top to bottom
    pub fn names(&self) -> Vec<String> {
        self.visible.iter().map(|(_, f)| f.display_name.clone()).collect()
    }

    pub fn ids(&self) -> Vec<InternalId> {
        self.visible.iter().map(|(id, _)| *id).collect()
    }

    pub fn listings(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::Listing { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn position(&self, id: InternalId) -> Option<usize> {
        self.visible.iter().position(|(v, _)| *v == id)
    }
}

impl PresentationSurface for RecordingSurface {
    fn deliver(&mut self, event: SurfaceEvent) {
        match &event {
            SurfaceEvent::Listing { items, .. } | SurfaceEvent::Reordered { items } => {
                self.visible = items.clone()
            }
            SurfaceEvent::Inserted { id, index, fields } => {
                let index = (*index).min(self.visible.len());
                self.visible.insert(index, (*id, fields.clone()));
            }
            SurfaceEvent::Removed { id } => {
                if let Some(i) = self.position(*id) {
                    self.visible.remove(i);
                }
            }
            SurfaceEvent::Updated { id, fields } => {
                if let Some(i) = self.position(*id) {
                    self.visible[i].1 = fields.clone();
                }
            }
            SurfaceEvent::Moved { id, to, fields, .. } => {
                if let Some(i) = self.position(*id) {
                    self.visible.remove(i);
                }
                let to = (*to).min(self.visible.len());
                self.visible.insert(to, (*id, fields.clone()));
            }
            _ => {}
        }
        self.events.push(event);
    }
}
