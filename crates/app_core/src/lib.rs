//! LiveLister core - the live directory listing engine
//!
//! This crate contains:
//! - The item registry (stable identities, staged enumeration)
//! - Asynchronous enrichment (icons, thumbnails, column text, info tips)
//! - Change reconciliation against live notifications
//! - Sort / group / filter views
//! - Navigation and the model loop tying it all together
//! - Configuration and error types

pub mod columns;
pub mod config;
pub mod enrichment;
pub mod entry;
pub mod error;
pub mod listing;
pub mod navigation;
pub mod presentation;
pub mod reconciler;
pub mod registry;
pub mod view;

#[cfg(test)]
mod test_support;

pub use columns::{ColumnKind, ColumnSet};
pub use config::{
    ColumnsConfig, ContainerPlacement, EnrichmentConfig, FolderSettings, GroupMode, ListingConfig,
    SortDirection, SortMode,
};
pub use enrichment::{
    CacheStats, EnrichmentKind, EnrichmentProvider, EnrichmentResult, FsEnrichmentProvider, Icon, Payload,
    RequestOutcome, Thumbnail,
};
pub use entry::{Entry, Epoch, Field, GroupId, InternalId, ItemSnapshot};
pub use error::{EngineError, EnrichError};
pub use listing::{Completion, ConsumerRequest, ListingEngine, NotificationSender};
pub use navigation::{NavigationController, NavigationKind, NavigationRequest};
pub use presentation::{DisplayFields, PresentationSurface, RecordingSurface, SurfaceEvent};
pub use reconciler::{ChangeReconciler, ModelOp, StampedChange};
pub use registry::ItemRegistry;
pub use view::{Group, Placement, ViewEngine, WildcardFilter};
