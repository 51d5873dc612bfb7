//! # Directory Watcher
//!
//! This crate locates the data-catalog files of a Kedro project and turns
//! file system activity into batches of catalog change events.
//!
//! ## Features
//!
//! - **Catalog Layout**: `conf/**/catalog*.yml` convention with exclusions
//! - **Discovery**: Full scans that reconcile the set of tracked files
//! - **Real-time Watching**: Optional `notify` feed for hosts without one
//! - **Event Batching**: Debounced, de-duplicated change batches
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  CatalogLayout ──► DirectoryWatcher ──► FileEvent              │
//! │       │                                     │                   │
//! │       ▼                                     ▼                   │
//! │  CatalogFileIndex                     EventBatcher ──► Batch   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod event;
pub mod watcher;

pub use config::{CatalogConvention, CatalogLayout};
pub use discovery::{
    CatalogFileIndex, ScanResult, TrackedFile, discover_catalog_files, discover_under,
};
pub use error::{Result, WatcherError};
pub use event::{EventBatch, FileEvent, FileEventKind};
pub use watcher::{DirectoryWatcher, EventBatcher};
