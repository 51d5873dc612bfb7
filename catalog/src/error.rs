//! Error types for catalog extraction.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur while reading catalog files.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The YAML grammar could not be loaded into the parser.
    #[error("failed to load yaml grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// The parser produced no tree.
    #[error("failed to parse catalog file: {}", .0.display())]
    Parse(PathBuf),

    /// The file is not valid YAML.
    #[error("malformed catalog file {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}
