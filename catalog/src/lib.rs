//! # Catalog
//!
//! This crate turns the YAML data-catalog files of a Kedro project into
//! dataset records and keeps them in a name-keyed index.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Catalog                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  CatalogDocument ──► CatalogExtractor ──► Extraction            │
//! │       │                    │                   │                │
//! │       ▼                    ▼                   ▼                │
//! │  DeclarationAnchor   placeholders/aliases   CatalogIndex        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Top-level keys starting with `_` are placeholders: templates that are
//! merged into datasets through YAML aliases and never indexed themselves.

pub mod document;
pub mod error;
pub mod extractor;
pub mod index;
pub mod record;

pub use document::CatalogDocument;
pub use error::{CatalogError, Result};
pub use extractor::{CatalogExtractor, Extraction, ExtractorConfig};
pub use index::{CatalogIndex, IndexStats};
pub use record::{DatasetName, DatasetRecord, DeclarationAnchor, UNKNOWN_TYPE, normalize_name};
