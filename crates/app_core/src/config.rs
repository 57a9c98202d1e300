//! Listing configuration

use crate::columns::ColumnKind;
use directories::ProjectDirs;
use serde::de::value::StrDeserializer;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub folder: FolderSettings,
    pub enrichment: EnrichmentConfig,
    pub columns: ColumnsConfig,
}

/// Per-folder view settings. Each option only affects the view engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderSettings {
    pub sort_mode: SortMode,
    pub sort_direction: SortDirection,
    pub group_mode: GroupMode,
    pub group_direction: SortDirection,
    /// Wildcard patterns separated by `:`
    pub filter_text: String,
    pub filter_case_sensitive: bool,
    pub filter_enabled: bool,
    pub show_hidden: bool,
    pub show_system: bool,
    pub container_placement: ContainerPlacement,
}

impl Default for FolderSettings {
    fn default() -> Self {
        Self {
            sort_mode: SortMode::Name,
            sort_direction: SortDirection::Ascending,
            group_mode: GroupMode::None,
            group_direction: SortDirection::Ascending,
            filter_text: String::new(),
            filter_case_sensitive: false,
            filter_enabled: false,
            show_hidden: true,
            show_system: true,
            container_placement: ContainerPlacement::First,
        }
    }
}

impl FolderSettings {
    /// The filter pattern to apply, if any
    pub fn active_filter(&self) -> Option<&str> {
        if self.filter_enabled && !self.filter_text.trim().is_empty() {
            Some(&self.filter_text)
        } else {
            None
        }
    }
}

/// Worker pool sizes and cache bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub icon_threads: usize,
    pub thumbnail_threads: usize,
    pub column_threads: usize,
    pub info_tip_threads: usize,
    /// Maximum cached enrichment results
    pub cache_capacity: usize,
    pub thumbnail_size: u32,
    /// Compute recursive sizes for the size column of folders
    pub show_folder_sizes: bool,
    /// Entries per enumeration message
    pub enumeration_batch: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            icon_threads: 2,
            thumbnail_threads: 2,
            column_threads: 2,
            info_tip_threads: 1,
            cache_capacity: 4096,
            thumbnail_size: 128,
            show_folder_sizes: false,
            enumeration_batch: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub visible: Vec<ColumnKind>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            visible: vec![
                ColumnKind::Name,
                ColumnKind::Type,
                ColumnKind::Size,
                ColumnKind::DateModified,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortMode {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupMode {
    #[serde(rename = "none")]
    None,
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
    #[serde(rename = "extension")]
    Extension,
    #[serde(rename = "attributes")]
    Attributes,
}

/// Where containers go relative to other items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerPlacement {
    #[serde(rename = "first")]
    First,
    #[serde(rename = "last")]
    Last,
    /// Containers and items sorted together (trash-like containers)
    #[serde(rename = "mixed")]
    Mixed,
}

/// Parse a serde-renamed unit variant from its config spelling
fn parse_variant<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    let de: StrDeserializer<'_, serde::de::value::Error> = s.into_deserializer();
    T::deserialize(de).map_err(|_| format!("unknown value '{}'", s))
}

macro_rules! impl_from_str {
    ($($t:ty),*) => {$(
        impl FromStr for $t {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_variant(&s.to_ascii_lowercase())
            }
        }
    )*};
}

impl_from_str!(SortMode, SortDirection, GroupMode, ContainerPlacement);

impl ListingConfig {
    /// Load configuration from the default location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a file, defaults when it does not exist
    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::info!("Configuration loaded from {:?}", config_path);
            Ok(config)
        } else {
            tracing::info!("Using default configuration");
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        tracing::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("com", "LiveLister", "LiveLister")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ListingConfig = toml::from_str(
            r#"
            [folder]
            sort_mode = "size"
            filter_text = "*.txt"
            filter_enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.folder.sort_mode, SortMode::Size);
        assert_eq!(config.folder.sort_direction, SortDirection::Ascending);
        assert_eq!(config.folder.active_filter(), Some("*.txt"));
        assert_eq!(config.enrichment, EnrichmentConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = ListingConfig::default();
        config.folder.group_mode = GroupMode::Size;
        config.enrichment.icon_threads = 4;
        config.save_to(&path).unwrap();

        let loaded = ListingConfig::load_from(&path).unwrap();
        assert_eq!(loaded.folder.group_mode, GroupMode::Size);
        assert_eq!(loaded.enrichment.icon_threads, 4);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Modified".parse::<SortMode>(), Ok(SortMode::DateModified));
        assert_eq!("desc".parse::<SortDirection>(), Ok(SortDirection::Descending));
        assert_eq!("size".parse::<GroupMode>(), Ok(GroupMode::Size));
        assert!("sideways".parse::<SortMode>().is_err());
    }

    #[test]
    fn test_filter_disabled_is_inactive() {
        let settings = FolderSettings {
            filter_text: "*.txt".into(),
            ..Default::default()
        };
        assert_eq!(settings.active_filter(), None);
    }
}
