//! Command-line arguments

use app_core::{GroupMode, ListingConfig, SortDirection, SortMode};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "live_lister")]
#[command(about = "List a directory and keep the listing up to date")]
#[command(version)]
pub struct Cli {
    /// Directory to list (defaults to the current directory)
    pub path: Option<PathBuf>,

    /// Sort by: name, type, size, modified, created, accessed, attributes, extension
    #[arg(short, long)]
    pub sort: Option<SortMode>,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,

    /// Group by: none, name, type, size, modified, created, accessed, extension, attributes
    #[arg(short, long)]
    pub group: Option<GroupMode>,

    /// Wildcard filter on display names, e.g. "*.rs:*.toml"
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Match the filter case-sensitively
    #[arg(long)]
    pub case_sensitive: bool,

    /// Hide hidden items
    #[arg(long)]
    pub no_hidden: bool,

    /// Hide system items
    #[arg(long)]
    pub no_system: bool,

    /// Compute folder sizes in the size column
    #[arg(long)]
    pub folder_sizes: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Print one JSON object per listing event
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Overlay the command line on the loaded configuration
    pub fn apply_to(&self, mut config: ListingConfig) -> ListingConfig {
        let folder = &mut config.folder;
        if let Some(sort) = self.sort {
            folder.sort_mode = sort;
        }
        if self.desc {
            folder.sort_direction = SortDirection::Descending;
        }
        if let Some(group) = self.group {
            folder.group_mode = group;
        }
        if let Some(filter) = &self.filter {
            folder.filter_text = filter.clone();
            folder.filter_enabled = true;
        }
        if self.case_sensitive {
            folder.filter_case_sensitive = true;
        }
        if self.no_hidden {
            folder.show_hidden = false;
        }
        if self.no_system {
            folder.show_system = false;
        }
        if self.folder_sizes {
            config.enrichment.show_folder_sizes = true;
        }
        config
    }
}
