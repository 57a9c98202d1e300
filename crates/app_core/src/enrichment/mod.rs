//! Asynchronous per-item enrichment
//!
//! Four kinds of expensive attributes are computed off the model thread,
//! each on its own pool. Results travel back as `EnrichmentResult` messages
//! and are applied only if they are still the latest request for their item.

mod cache;
mod pool;
mod provider;
mod scheduler;

pub use cache::{CacheKey, CacheStats, EnrichmentCache};
pub use pool::WorkerPool;
pub use provider::{EnrichmentProvider, FsEnrichmentProvider};
pub use scheduler::EnrichmentScheduler;

use crate::columns::ColumnKind;
use crate::entry::{Epoch, InternalId, ItemSnapshot};
use crate::error::EnrichError;
use std::sync::Arc;

/// Glyph icon with its display color (hex, e.g. "#e34c26")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub glyph: char,
    pub color: String,
}

/// Downscaled RGBA8 preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgba: Arc<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Icon(Icon),
    Thumbnail(Thumbnail),
    Text(String),
    /// The lookup failed; the field shows as unavailable
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentKind {
    Icon,
    Thumbnail,
    Column(ColumnKind),
    InfoTip,
}

impl EnrichmentKind {
    /// Compute this kind of attribute for `item`
    pub fn run<P>(self, provider: &P, item: &ItemSnapshot) -> Result<Payload, EnrichError>
    where
        P: EnrichmentProvider + ?Sized,
    {
        match self {
            EnrichmentKind::Icon => provider.icon(item).map(Payload::Icon),
            EnrichmentKind::Thumbnail => provider.thumbnail(item).map(Payload::Thumbnail),
            EnrichmentKind::Column(column) => provider.column_text(item, column).map(Payload::Text),
            EnrichmentKind::InfoTip => provider.info_tip(item).map(Payload::Text),
        }
    }

    pub(crate) fn pool(self) -> PoolKind {
        match self {
            EnrichmentKind::Icon => PoolKind::Icon,
            EnrichmentKind::Thumbnail => PoolKind::Thumbnail,
            EnrichmentKind::Column(_) => PoolKind::Column,
            EnrichmentKind::InfoTip => PoolKind::InfoTip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolKind {
    Icon,
    Thumbnail,
    Column,
    InfoTip,
}

/// Message from an enrichment worker to the model thread
#[derive(Debug, Clone)]
pub struct EnrichmentResult {
    pub target: InternalId,
    pub epoch: Epoch,
    pub kind: EnrichmentKind,
    pub generation: u64,
    pub payload: Payload,
}

/// What a request did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Served from the cache on the calling thread
    Resolved(Payload),
    /// Submitted to a worker under this generation
    Queued(u64),
    /// Unknown id
    Skipped,
}
