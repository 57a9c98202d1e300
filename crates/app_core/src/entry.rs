//! Model records: identities, entries and enrichment fields

use crate::columns::ColumnKind;
use crate::enrichment::{EnrichmentKind, Icon, Payload, Thumbnail};
use app_fs::{ItemAttributes, Locator, RawEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;

/// Stable identity of an entry. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InternalId(pub u64);

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Navigation generation. Work tagged with another epoch is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u64);

/// State of one enrichment field
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    #[default]
    Pending,
    Ready(T),
    /// Lookup failed; not retried until requested again
    Unavailable,
}

impl<T> Field<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Field::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Field::Pending)
    }
}

/// One item of the displayed container.
///
/// The locator is kept parent-relative (`parsing_name`); the registry joins
/// it with the container locator on demand.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: InternalId,
    pub epoch: Epoch,
    pub display_name: String,
    pub parsing_name: OsString,
    pub edit_name: String,
    pub attributes: ItemAttributes,
    pub sort_group_key: Option<GroupId>,
    pub relative_sort_rank: Option<i64>,
    pub icon: Field<Icon>,
    pub thumbnail: Field<Thumbnail>,
    pub columns: HashMap<ColumnKind, Field<String>>,
    pub info_tip: Field<String>,
}

impl Entry {
    pub(crate) fn new(id: InternalId, epoch: Epoch, raw: RawEntry) -> Self {
        Self {
            id,
            epoch,
            display_name: raw.display_name,
            parsing_name: raw.parsing_name,
            edit_name: raw.edit_name,
            attributes: raw.attributes,
            sort_group_key: None,
            relative_sort_rank: None,
            icon: Field::Pending,
            thumbnail: Field::Pending,
            columns: HashMap::new(),
            info_tip: Field::Pending,
        }
    }

    /// Replace names and metadata after a rename. Enrichment is dropped since
    /// it may depend on the old name.
    pub(crate) fn rename_from(&mut self, raw: RawEntry) {
        self.display_name = raw.display_name;
        self.parsing_name = raw.parsing_name;
        self.edit_name = raw.edit_name;
        self.attributes = raw.attributes;
        self.clear_enrichment();
    }

    pub(crate) fn clear_enrichment(&mut self) {
        self.icon = Field::Pending;
        self.thumbnail = Field::Pending;
        self.columns.clear();
        self.info_tip = Field::Pending;
    }

    /// Store an enrichment payload in the field `kind` names
    pub(crate) fn apply_payload(&mut self, kind: EnrichmentKind, payload: Payload) {
        match (kind, payload) {
            (EnrichmentKind::Icon, Payload::Icon(icon)) => self.icon = Field::Ready(icon),
            (EnrichmentKind::Thumbnail, Payload::Thumbnail(t)) => self.thumbnail = Field::Ready(t),
            (EnrichmentKind::Column(c), Payload::Text(text)) => {
                self.columns.insert(c, Field::Ready(text));
            }
            (EnrichmentKind::InfoTip, Payload::Text(text)) => self.info_tip = Field::Ready(text),
            (kind, payload) => {
                if !matches!(payload, Payload::Unavailable) {
                    tracing::warn!(?kind, "Payload does not fit field; marking unavailable");
                }
                self.mark_unavailable(kind);
            }
        }
    }

    fn mark_unavailable(&mut self, kind: EnrichmentKind) {
        match kind {
            EnrichmentKind::Icon => self.icon = Field::Unavailable,
            EnrichmentKind::Thumbnail => self.thumbnail = Field::Unavailable,
            EnrichmentKind::Column(c) => {
                self.columns.insert(c, Field::Unavailable);
            }
            EnrichmentKind::InfoTip => self.info_tip = Field::Unavailable,
        }
    }

    pub fn column(&self, kind: ColumnKind) -> Option<&str> {
        self.columns.get(&kind).and_then(|f| f.ready()).map(String::as_str)
    }

    pub fn is_container(&self) -> bool {
        self.attributes.is_container
    }

    pub fn extension(&self) -> String {
        if self.attributes.is_container {
            String::new()
        } else {
            app_fs::extension_of(&self.parsing_name.to_string_lossy())
        }
    }
}

/// Immutable copy of what a worker needs to enrich one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub id: InternalId,
    pub locator: Locator,
    pub display_name: String,
    pub attributes: ItemAttributes,
}

impl ItemSnapshot {
    pub fn extension(&self) -> String {
        if self.attributes.is_container {
            String::new()
        } else {
            self.locator
                .as_path()
                .file_name()
                .map(|n| app_fs::extension_of(&n.to_string_lossy()))
                .unwrap_or_default()
        }
    }
}
