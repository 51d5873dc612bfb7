//! Dataset records and their name-based identity.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Type recorded for entries that declare no `type`.
pub const UNKNOWN_TYPE: &str = "UNKNOWN_TYPE";

/// Strip surrounding whitespace and quote characters from a dataset name.
///
/// YAML keys arrive bare (`my_table`) while Python references arrive as
/// literals (`"my_table"`); both normalize to the same name.
pub fn normalize_name(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// Normalized dataset name, the identity of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetName(String);

impl DatasetName {
    /// Create a name, normalizing quotes and whitespace.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_name(raw.as_ref()).to_string())
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatasetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for DatasetName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DatasetName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DatasetName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl PartialEq<str> for DatasetName {
    fn eq(&self, other: &str) -> bool {
        self.0 == normalize_name(other)
    }
}

impl PartialEq<&str> for DatasetName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == normalize_name(other)
    }
}

/// Location of a dataset's top-level key inside its catalog file.
///
/// The anchor stays valid as a navigation target for as long as the file's
/// content is unchanged; `CatalogDocument::node_for` turns it back into a
/// syntax node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationAnchor {
    /// Catalog file holding the declaration.
    pub path: PathBuf,

    /// Byte offset where the key starts.
    pub start_byte: usize,

    /// Byte offset where the key ends.
    pub end_byte: usize,

    /// Zero-based line of the key.
    pub line: usize,

    /// Zero-based column of the key.
    pub column: usize,
}

/// One declared catalog entry.
///
/// Two records are the same dataset iff their names are equal; the other
/// fields do not take part in equality or hashing. A re-parsed file therefore
/// produces records that replace their predecessors in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Normalized dataset name.
    pub name: DatasetName,

    /// Dataset implementation type, e.g. `pandas.CSVDataSet`.
    pub dataset_type: String,

    /// Pipeline layer tag, if declared.
    pub layer: Option<String>,

    /// Catalog file the record was extracted from.
    pub source: PathBuf,

    /// Position of the top-level key in `source`.
    pub anchor: DeclarationAnchor,
}

impl DatasetRecord {
    /// Create a record without a layer.
    pub fn new(
        name: impl Into<DatasetName>,
        dataset_type: impl Into<String>,
        anchor: DeclarationAnchor,
    ) -> Self {
        Self {
            name: name.into(),
            dataset_type: dataset_type.into(),
            layer: None,
            source: anchor.path.clone(),
            anchor,
        }
    }

    /// Set the layer.
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Check whether a raw (possibly quoted) name refers to this dataset.
    pub fn name_matches(&self, raw: &str) -> bool {
        self.name == raw
    }

    /// Whether the entry declared no `type`.
    pub fn has_unknown_type(&self) -> bool {
        self.dataset_type == UNKNOWN_TYPE
    }

    /// Last dotted segment of the type, e.g. `CSVDataSet`.
    pub fn short_type(&self) -> &str {
        self.dataset_type
            .rsplit('.')
            .next()
            .unwrap_or(&self.dataset_type)
    }

    /// Whether the record was extracted from `path`.
    pub fn is_from(&self, path: &Path) -> bool {
        self.source == path
    }
}

impl PartialEq for DatasetRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DatasetRecord {}

impl Hash for DatasetRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
