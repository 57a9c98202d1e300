//! Change notifications as seen by the listing engine

use crate::Locator;
use serde::{Deserialize, Serialize};

/// What happened to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Removed,
    /// `before` was renamed to `after`
    Renamed,
    /// Metadata or content of an existing item changed
    Modified,
    /// The container's contents changed in an unspecified way
    ContentsChanged,
}

/// A single change notification.
///
/// `after` is only set for `Renamed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub before: Locator,
    pub after: Option<Locator>,
}

impl ChangeEvent {
    pub fn created(locator: impl Into<Locator>) -> Self {
        Self::single(ChangeKind::Created, locator.into())
    }

    pub fn removed(locator: impl Into<Locator>) -> Self {
        Self::single(ChangeKind::Removed, locator.into())
    }

    pub fn modified(locator: impl Into<Locator>) -> Self {
        Self::single(ChangeKind::Modified, locator.into())
    }

    pub fn contents_changed(locator: impl Into<Locator>) -> Self {
        Self::single(ChangeKind::ContentsChanged, locator.into())
    }

    pub fn renamed(before: impl Into<Locator>, after: impl Into<Locator>) -> Self {
        Self {
            kind: ChangeKind::Renamed,
            before: before.into(),
            after: Some(after.into()),
        }
    }

    fn single(kind: ChangeKind, before: Locator) -> Self {
        Self {
            kind,
            before,
            after: None,
        }
    }
}
