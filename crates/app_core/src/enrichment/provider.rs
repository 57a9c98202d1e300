//! Enrichment providers

use super::{Icon, Thumbnail};
use crate::columns::{column_text, date_text, size_text, type_text, ColumnKind};
use crate::entry::ItemSnapshot;
use crate::error::EnrichError;
use bytesize::ByteSize;
use devicons::FileIcon;
use image::ImageReader;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Computes the expensive attributes of an item. Called on worker threads
/// with a snapshot; never sees the registry.
pub trait EnrichmentProvider: Send + Sync + 'static {
    fn icon(&self, item: &ItemSnapshot) -> Result<Icon, EnrichError>;
    fn thumbnail(&self, item: &ItemSnapshot) -> Result<Thumbnail, EnrichError>;
    fn column_text(&self, item: &ItemSnapshot, column: ColumnKind) -> Result<String, EnrichError>;
    fn info_tip(&self, item: &ItemSnapshot) -> Result<String, EnrichError>;

    /// Ask long-running lookups to stop early
    fn shutdown(&self) {}
}

const DIRECTORY_GLYPH: char = '\u{f024b}';
const DIRECTORY_COLOR: &str = "#7ebae4";
const GENERIC_FILE_GLYPH: char = '\u{f0214}';

/// Provider over the local filesystem
pub struct FsEnrichmentProvider {
    thumbnail_size: u32,
    show_folder_sizes: bool,
    stop: Arc<AtomicBool>,
}

impl FsEnrichmentProvider {
    pub fn new(thumbnail_size: u32, show_folder_sizes: bool) -> Self {
        Self {
            thumbnail_size: thumbnail_size.max(1),
            show_folder_sizes,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn folder_size_text(&self, item: &ItemSnapshot) -> Result<String, EnrichError> {
        let bytes = app_fs::folder_size(item.locator.as_path(), &self.stop)?;
        Ok(ByteSize::b(bytes).to_string())
    }
}

impl EnrichmentProvider for FsEnrichmentProvider {
    fn icon(&self, item: &ItemSnapshot) -> Result<Icon, EnrichError> {
        if item.attributes.is_container {
            return Ok(Icon {
                glyph: DIRECTORY_GLYPH,
                color: DIRECTORY_COLOR.to_string(),
            });
        }
        let icon = FileIcon::from(item.locator.as_path());
        let glyph = if icon.icon == '*' { GENERIC_FILE_GLYPH } else { icon.icon };
        Ok(Icon {
            glyph,
            color: icon.color.to_string(),
        })
    }

    fn thumbnail(&self, item: &ItemSnapshot) -> Result<Thumbnail, EnrichError> {
        if item.attributes.is_container || !is_supported_image(&item.extension()) {
            return Err(EnrichError::Unsupported(item.display_name.clone()));
        }
        let data = std::fs::read(item.locator.as_path())?;
        let img = ImageReader::new(Cursor::new(&data))
            .with_guessed_format()?
            .decode()?;

        let thumb = img.thumbnail(self.thumbnail_size, self.thumbnail_size);
        let rgba = thumb.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Thumbnail {
            width,
            height,
            rgba: Arc::new(rgba.into_raw()),
        })
    }

    fn column_text(&self, item: &ItemSnapshot, column: ColumnKind) -> Result<String, EnrichError> {
        if column == ColumnKind::Size && item.attributes.is_container && self.show_folder_sizes {
            return self.folder_size_text(item);
        }
        Ok(column_text(item, column))
    }

    fn info_tip(&self, item: &ItemSnapshot) -> Result<String, EnrichError> {
        let attrs = &item.attributes;
        let mut lines = vec![format!("Type: {}", type_text(attrs, &item.extension()))];
        if attrs.is_container {
            let count = app_fs::child_count(item.locator.as_path())?;
            lines.push(format!("Items: {}", count));
        } else if attrs.is_metadata_valid {
            lines.push(format!("Size: {}", size_text(attrs)));
        }
        if attrs.modified.is_some() {
            lines.push(format!("Date modified: {}", date_text(attrs.modified)));
        }
        Ok(lines.join("\n"))
    }

    fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn is_supported_image(extension: &str) -> bool {
    matches!(extension, "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp")
}
