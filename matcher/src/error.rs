//! Error types for the reference matcher.

use thiserror::Error;

/// Result type alias for matcher operations.
pub type Result<T> = std::result::Result<T, MatcherError>;

/// Errors that can occur while preparing Python sources.
#[derive(Error, Debug)]
pub enum MatcherError {
    /// The Python grammar could not be loaded into the parser.
    #[error("failed to load python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// The parser produced no tree.
    #[error("failed to parse python source")]
    Parse,
}
