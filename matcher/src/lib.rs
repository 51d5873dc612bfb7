//! # Matcher
//!
//! This crate decides whether a position in Python source is a reference
//! to a data-catalog entry: a string in the `inputs`/`outputs` slot of a
//! Kedro `node(...)` call.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Matcher                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  PythonSource ──► ReferenceMatcher ──► ReferenceSite            │
//! │       │                  │                  │                   │
//! │       ▼                  ▼                  ▼                   │
//! │  import_statements   callable/import/   MatchResult             │
//! │                      slot gates                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let source = PythonSource::parse(text)?;
//! let site = ReferenceMatcher::default().site_at(&source, offset);
//! if site.result.is_confirmed() {
//!     // look up site.literal in the catalog index
//! }
//! ```

pub mod error;
pub mod matcher;
pub mod source;

pub use error::{MatcherError, Result};
pub use matcher::{ArgumentSlot, MatchResult, MatcherConfig, ReferenceMatcher, ReferenceSite};
pub use source::PythonSource;
