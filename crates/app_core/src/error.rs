//! Engine error types

use app_fs::FsError;
use thiserror::Error;

/// Container-level failures, propagated to the consumer
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== Recoverable (the previous container stays displayed) =====
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not a container: {0}")]
    NotAContainer(String),

    #[error("File I/O error: {0}")]
    Io(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidFilter(String),

    #[error("Nothing to navigate to")]
    NoTarget,

    #[error("Timed out: {0}")]
    Timeout(String),

    // ===== Fatal =====
    #[error("Worker pool could not start: {0}")]
    WorkerSpawn(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Is this error recoverable?
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::ContainerNotFound(_)
                | EngineError::AccessDenied(_)
                | EngineError::NotAContainer(_)
                | EngineError::Io(_)
                | EngineError::InvalidFilter(_)
                | EngineError::NoTarget
                | EngineError::Timeout(_)
        )
    }

    /// Is this a fatal error?
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Get a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            EngineError::ContainerNotFound(path) => format!("Folder not found: {}", path),
            EngineError::AccessDenied(path) => format!("Access denied: {}", path),
            EngineError::NotAContainer(path) => format!("Not a folder: {}", path),
            EngineError::InvalidFilter(p) => format!("Invalid filter: {}", p),
            _ => self.to_string(),
        }
    }
}

impl From<FsError> for EngineError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(p) => EngineError::ContainerNotFound(p),
            FsError::AccessDenied(p) => EngineError::AccessDenied(p),
            FsError::NotADirectory(p) => EngineError::NotAContainer(p),
            other => EngineError::Io(other.to_string()),
        }
    }
}

/// Per-item enrichment failures. Absorbed where they happen and surfaced as
/// an unavailable field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Not supported for this item: {0}")]
    Unsupported(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<FsError> for EnrichError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(p) => EnrichError::NotFound(p),
            other => EnrichError::Io(other.to_string()),
        }
    }
}

impl From<std::io::Error> for EnrichError {
    fn from(e: std::io::Error) -> Self {
        EnrichError::Io(e.to_string())
    }
}

impl From<image::ImageError> for EnrichError {
    fn from(e: image::ImageError) -> Self {
        EnrichError::ImageDecode(e.to_string())
    }
}
