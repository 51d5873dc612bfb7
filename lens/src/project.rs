//! Per-project state shared by synchronization and queries.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kedro_lens_catalog::{CatalogIndex, DatasetName};
use kedro_lens_directory_watcher::CatalogLayout;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::LensConfig;
use crate::sync::SyncReport;

/// A problem found in the project's catalog files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogDiagnostic {
    /// Two catalog files declare the same dataset.
    DuplicateDataset {
        name: DatasetName,
        /// File whose record is now indexed.
        kept: PathBuf,
        /// File whose record was replaced.
        shadowed: PathBuf,
    },

    /// A catalog file could not be read or parsed.
    MalformedFile { path: PathBuf, reason: String },
}

impl fmt::Display for CatalogDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateDataset {
                name,
                kept,
                shadowed,
            } => write!(
                f,
                "dataset '{name}' declared in {} is also declared in {}",
                kept.display(),
                shadowed.display()
            ),
            Self::MalformedFile { path, reason } => {
                write!(f, "malformed catalog file {}: {reason}", path.display())
            }
        }
    }
}

/// Notifications published by a project.
#[derive(Debug, Clone)]
pub enum LensEvent {
    /// A sync pass finished.
    IndexUpdated(SyncReport),

    /// A catalog problem was found.
    Diagnostic(CatalogDiagnostic),
}

/// State owned by one open project.
///
/// The index is the only mutable piece; readers take the read lock,
/// sync passes take the write lock.
pub struct ProjectContext {
    layout: CatalogLayout,
    config: LensConfig,
    index: RwLock<CatalogIndex>,
    cancel: CancellationToken,
    events: broadcast::Sender<LensEvent>,
}

impl ProjectContext {
    /// Create the context for a project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, config: LensConfig) -> Arc<Self> {
        let layout = CatalogLayout::new(root).with_convention(config.catalog.clone());
        let (events, _) = broadcast::channel(config.sync.event_channel_capacity.max(1));

        Arc::new(Self {
            layout,
            config,
            index: RwLock::new(CatalogIndex::new()),
            cancel: CancellationToken::new(),
            events,
        })
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    /// Catalog layout of the project.
    pub fn layout(&self) -> &CatalogLayout {
        &self.layout
    }

    /// Configuration the project was opened with.
    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    /// The dataset index.
    pub fn index(&self) -> &RwLock<CatalogIndex> {
        &self.index
    }

    /// Token cancelled when the project is disposed.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the project has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Dispose the project. Pending and future sync work becomes a no-op.
    pub fn dispose(&self) {
        if !self.cancel.is_cancelled() {
            info!("Disposing catalog lens for {}", self.layout.root.display());
            self.cancel.cancel();
        }
    }

    /// Subscribe to project notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LensEvent> {
        self.events.subscribe()
    }

    /// Publish a notification to current subscribers.
    pub fn publish(&self, event: LensEvent) {
        if self.events.send(event).is_err() {
            debug!("No subscribers for lens event");
        }
    }
}

impl fmt::Debug for ProjectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectContext")
            .field("root", &self.layout.root)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostic_display() {
        let duplicate = CatalogDiagnostic::DuplicateDataset {
            name: DatasetName::new("companies"),
            kept: PathBuf::from("conf/local/catalog.yml"),
            shadowed: PathBuf::from("conf/base/catalog.yml"),
        };
        assert_eq!(
            duplicate.to_string(),
            "dataset 'companies' declared in conf/local/catalog.yml is also declared in conf/base/catalog.yml"
        );
    }

    #[tokio::test]
    async fn test_dispose_cancels_token() {
        let project = ProjectContext::new("/tmp/project", LensConfig::default());
        let token = project.cancellation();
        let mut rx = project.subscribe();

        project.publish(LensEvent::Diagnostic(CatalogDiagnostic::MalformedFile {
            path: PathBuf::from("catalog.yml"),
            reason: "bad".to_string(),
        }));
        assert!(matches!(rx.recv().await.unwrap(), LensEvent::Diagnostic(_)));

        project.dispose();
        assert!(project.is_disposed());
        assert!(token.is_cancelled());
    }
}
