//! File change events and batches.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};

use crate::config::CatalogLayout;

/// A file system event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// The kind of event.
    pub kind: FileEventKind,

    /// Path to the affected file. For moves and copies this is the target.
    pub path: PathBuf,

    /// Source path of a move or copy.
    pub origin: Option<PathBuf>,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    /// Create a new file event.
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            origin: None,
            timestamp: Utc::now(),
        }
    }

    /// A move from `origin` to `path`.
    pub fn moved(origin: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Moved, path).with_origin(origin)
    }

    /// A copy from `origin` to `path`.
    pub fn copied(origin: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Copied, path).with_origin(origin)
    }

    /// Set the origin path.
    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Convert a `notify` event into file events, one per affected path.
    pub fn from_notify(event: notify::Event) -> Vec<Self> {
        use notify::EventKind;

        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                vec![Self::moved(event.paths[0].clone(), event.paths[1].clone())]
            }
            kind => {
                let kind = FileEventKind::from(kind);
                event
                    .paths
                    .into_iter()
                    .map(|path| Self::new(kind, path))
                    .collect()
            }
        }
    }

    /// Whether this event or its origin touches a catalog file.
    ///
    /// Directory-shaped paths count for structural changes, since removing
    /// or moving a directory removes or moves the catalog files inside it.
    pub fn touches_catalog(&self, layout: &CatalogLayout) -> bool {
        if layout.is_catalog_file(&self.path) {
            return true;
        }
        let origin_touches = self
            .origin
            .as_deref()
            .is_some_and(|origin| {
                layout.is_catalog_file(origin) || layout.may_contain_catalog_files(origin)
            });
        match self.kind {
            FileEventKind::Deleted | FileEventKind::Created => {
                layout.may_contain_catalog_files(&self.path)
            }
            FileEventKind::Moved => origin_touches || layout.may_contain_catalog_files(&self.path),
            _ => false,
        }
    }

    /// Target path followed by the origin, if any.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.path.as_path()).chain(self.origin.as_deref())
    }
}

/// Kind of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    /// File was created.
    Created,

    /// File was modified.
    Modified,

    /// File was deleted.
    Deleted,

    /// File was moved from `origin`.
    Moved,

    /// File was copied from `origin`.
    Copied,

    /// Metadata, access, or unknown change.
    Other,
}

impl From<notify::EventKind> for FileEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                ModifyKind::Name(RenameMode::From) => Self::Deleted,
                ModifyKind::Name(RenameMode::To) => Self::Created,
                ModifyKind::Metadata(_) => Self::Other,
                _ => Self::Modified,
            },
            notify::EventKind::Remove(_) => Self::Deleted,
            _ => Self::Other,
        }
    }
}

/// A batch of file events.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    /// Events in this batch.
    pub events: Vec<FileEvent>,

    /// When the batch was created.
    pub created_at: Option<DateTime<Utc>>,
}

impl EventBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            created_at: Some(Utc::now()),
        }
    }

    /// Create a batch from events.
    pub fn from_events(events: impl IntoIterator<Item = FileEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            created_at: Some(Utc::now()),
        }
    }

    /// Add an event to the batch.
    pub fn push(&mut self, event: FileEvent) {
        self.events.push(event);
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Deduplicate events, keeping the latest for each path.
    ///
    /// Surviving events keep the order of their last occurrence.
    pub fn deduplicate(&mut self) {
        let mut latest: HashMap<PathBuf, usize> = HashMap::new();
        for (position, event) in self.events.iter().enumerate() {
            latest.insert(event.path.clone(), position);
        }

        let mut position = 0;
        self.events.retain(|event| {
            let keep = latest.get(&event.path) == Some(&position);
            position += 1;
            keep
        });
    }

    /// Events that touch catalog files of `layout`, in batch order.
    pub fn catalog_events<'a>(
        &'a self,
        layout: &'a CatalogLayout,
    ) -> impl Iterator<Item = &'a FileEvent> {
        self.events
            .iter()
            .filter(move |event| event.touches_catalog(layout))
    }
}
