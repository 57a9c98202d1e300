//! Columns - the attributes an item can be displayed and sorted by

use crate::config::SortMode;
use crate::entry::ItemSnapshot;
use app_fs::ItemAttributes;
use bytesize::ByteSize;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColumnKind {
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "size")]
    Size,
    #[serde(rename = "modified")]
    DateModified,
    #[serde(rename = "created")]
    DateCreated,
    #[serde(rename = "accessed")]
    DateAccessed,
    #[serde(rename = "attributes")]
    Attributes,
    #[serde(rename = "extension")]
    Extension,
}

impl ColumnKind {
    pub const ALL: [ColumnKind; 8] = [
        ColumnKind::Name,
        ColumnKind::Type,
        ColumnKind::Size,
        ColumnKind::DateModified,
        ColumnKind::DateCreated,
        ColumnKind::DateAccessed,
        ColumnKind::Attributes,
        ColumnKind::Extension,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ColumnKind::Name => "Name",
            ColumnKind::Type => "Type",
            ColumnKind::Size => "Size",
            ColumnKind::DateModified => "Date modified",
            ColumnKind::DateCreated => "Date created",
            ColumnKind::DateAccessed => "Date accessed",
            ColumnKind::Attributes => "Attributes",
            ColumnKind::Extension => "Extension",
        }
    }

    /// Sort mode backed by this column
    pub fn sort_mode(self) -> Option<SortMode> {
        Some(match self {
            ColumnKind::Name => SortMode::Name,
            ColumnKind::Type => SortMode::Type,
            ColumnKind::Size => SortMode::Size,
            ColumnKind::DateModified => SortMode::DateModified,
            ColumnKind::DateCreated => SortMode::DateCreated,
            ColumnKind::DateAccessed => SortMode::DateAccessed,
            ColumnKind::Attributes => SortMode::Attributes,
            ColumnKind::Extension => SortMode::Extension,
        })
    }
}

impl SortMode {
    /// Column that has to be visible for this sort mode to stay active
    pub fn column(self) -> ColumnKind {
        match self {
            SortMode::Name => ColumnKind::Name,
            SortMode::Type => ColumnKind::Type,
            SortMode::Size => ColumnKind::Size,
            SortMode::DateModified => ColumnKind::DateModified,
            SortMode::DateCreated => ColumnKind::DateCreated,
            SortMode::DateAccessed => ColumnKind::DateAccessed,
            SortMode::Attributes => ColumnKind::Attributes,
            SortMode::Extension => ColumnKind::Extension,
        }
    }
}

/// Ordered set of visible columns. The name column is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    visible: Vec<ColumnKind>,
}

impl ColumnSet {
    pub fn new(visible: &[ColumnKind]) -> Self {
        let mut set = Self {
            visible: vec![ColumnKind::Name],
        };
        for &column in visible {
            set.show(column);
        }
        set
    }

    pub fn show(&mut self, column: ColumnKind) -> bool {
        if self.visible.contains(&column) {
            return false;
        }
        self.visible.push(column);
        true
    }

    /// Hide a column. The name column cannot be hidden.
    pub fn hide(&mut self, column: ColumnKind) -> bool {
        if column == ColumnKind::Name {
            return false;
        }
        let before = self.visible.len();
        self.visible.retain(|&c| c != column);
        self.visible.len() != before
    }

    pub fn is_visible(&self, column: ColumnKind) -> bool {
        self.visible.contains(&column)
    }

    pub fn visible(&self) -> &[ColumnKind] {
        &self.visible
    }

    /// First visible column that can back a sort
    pub fn first_sortable(&self) -> SortMode {
        self.visible
            .iter()
            .find_map(|c| c.sort_mode())
            .unwrap_or(SortMode::Name)
    }
}

impl Default for ColumnSet {
    fn default() -> Self {
        Self::new(&crate::config::ColumnsConfig::default().visible)
    }
}

/// Human readable type, e.g. "File folder" or "TXT File"
pub fn type_text(attributes: &ItemAttributes, extension: &str) -> String {
    if attributes.is_container {
        "File folder".to_string()
    } else if extension.is_empty() {
        "File".to_string()
    } else {
        format!("{} File", extension.to_uppercase())
    }
}

pub fn size_text(attributes: &ItemAttributes) -> String {
    if attributes.is_container || !attributes.is_metadata_valid {
        String::new()
    } else {
        ByteSize::b(attributes.size).to_string()
    }
}

pub fn date_text(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Text of a column computed from metadata alone
pub fn column_text(item: &ItemSnapshot, column: ColumnKind) -> String {
    let attrs = &item.attributes;
    match column {
        ColumnKind::Name => item.display_name.clone(),
        ColumnKind::Type => type_text(attrs, &item.extension()),
        ColumnKind::Size => size_text(attrs),
        ColumnKind::DateModified => date_text(attrs.modified),
        ColumnKind::DateCreated => date_text(attrs.created),
        ColumnKind::DateAccessed => date_text(attrs.accessed),
        ColumnKind::Attributes => attrs.flags(),
        ColumnKind::Extension => item.extension(),
    }
}
