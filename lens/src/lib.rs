//! # Kedro Lens
//!
//! This crate links Python pipeline code to the Kedro data catalog:
//!
//! - **Catalog**: YAML catalog files parsed into dataset records
//! - **Directory Watcher**: catalog file discovery and change feed
//! - **Matcher**: recognition of dataset references in `node(...)` calls
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Kedro Lens                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐      ┌──────────────┐      ┌──────────────┐   │
//! │  │  Directory   │ ───► │     Sync     │ ───► │   Catalog    │   │
//! │  │   Watcher    │      │  Scheduler   │      │    Index     │   │
//! │  └──────────────┘      └──────────────┘      └──────────────┘   │
//! │                         (host gate)                 │           │
//! │                                                     ▼           │
//! │  ┌──────────────┐      ┌──────────────┐      ┌──────────────┐   │
//! │  │    Python    │ ───► │   Matcher    │ ───► │    Query     │   │
//! │  │    Source    │      │              │      │  annotate /  │   │
//! │  └──────────────┘      └──────────────┘      │  resolve /   │   │
//! │                                              │  suggest     │   │
//! │                                              └──────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kedro_lens::{KedroLens, PythonSource};
//!
//! let lens = KedroLens::builder("/path/to/project")
//!     .with_watch(true)
//!     .build()
//!     .await?;
//!
//! let source = PythonSource::parse(text)?;
//! if let Some(annotation) = lens.query().annotate(&source, offset).await {
//!     println!("{}", annotation.tooltip());
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod project;
pub mod query;
pub mod scheduler;
pub mod sync;

pub use config::{LensConfig, SyncConfig};
pub use engine::{KedroLens, KedroLensBuilder, LensStats};
pub use error::{LensError, Result};
pub use project::{CatalogDiagnostic, LensEvent, ProjectContext};
pub use query::{Annotation, CatalogQuery, Suggestion};
pub use scheduler::{AlwaysOpen, HostGate, SyncScheduler, SyncTask};
pub use sync::{CatalogSynchronizer, SyncReport};

// Re-export from dependencies for convenience
pub use kedro_lens_catalog::{DatasetName, DatasetRecord, DeclarationAnchor};
pub use kedro_lens_directory_watcher::{EventBatch, FileEvent, FileEventKind};
pub use kedro_lens_matcher::{MatchResult, PythonSource, ReferenceSite};
