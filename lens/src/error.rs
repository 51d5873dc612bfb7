//! Error types for the catalog lens.

use thiserror::Error;

/// Result type alias for lens operations.
pub type Result<T> = std::result::Result<T, LensError>;

/// Errors that can occur in the catalog lens.
#[derive(Error, Debug)]
pub enum LensError {
    /// Catalog error.
    #[error("catalog error: {0}")]
    Catalog(#[from] kedro_lens_catalog::CatalogError),

    /// Directory watcher error.
    #[error("watcher error: {0}")]
    Watcher(#[from] kedro_lens_directory_watcher::WatcherError),

    /// Matcher error.
    #[error("matcher error: {0}")]
    Matcher(#[from] kedro_lens_matcher::MatcherError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The project has been closed.
    #[error("project disposed")]
    Disposed,

    /// The sync worker is no longer accepting tasks.
    #[error("sync queue closed")]
    QueueClosed,
}
