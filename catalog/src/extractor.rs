//! Extraction of dataset records from a catalog document.
//!
//! Placeholders (`_`-prefixed top-level keys) are collected first in
//! document order. Each dataset entry is then resolved by merging the
//! templates it references through YAML aliases, followed by its own
//! attributes, so a dataset's explicit values always win.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;
use tree_sitter::Node;

use crate::document::{
    CatalogDocument, ValueShape, alias_name, anchor_name, collect_aliases, mapping_pairs,
    scalar_text,
};
use crate::error::{CatalogError, Result};
use crate::record::{DatasetName, DatasetRecord, UNKNOWN_TYPE};

/// Attribute holding the dataset type.
const TYPE_ATTRIBUTE: &str = "type";

/// Attribute holding the pipeline layer.
const LAYER_ATTRIBUTE: &str = "layer";

/// Configuration for catalog extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Attributes projected from each entry into its record.
    pub attributes: Vec<String>,

    /// Key prefix marking a placeholder entry.
    pub placeholder_prefix: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            attributes: vec![TYPE_ATTRIBUTE.to_string(), LAYER_ATTRIBUTE.to_string()],
            placeholder_prefix: "_".to_string(),
        }
    }
}

impl ExtractorConfig {
    /// Set the placeholder prefix.
    pub fn with_placeholder_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.placeholder_prefix = prefix.into();
        self
    }

    /// Set the projected attributes.
    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    fn projects(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

/// Output of extracting one catalog file.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Dataset records in document order.
    pub records: Vec<DatasetRecord>,

    /// Every top-level key of the file, placeholders included.
    pub keys: BTreeSet<DatasetName>,
}

impl Extraction {
    /// Whether the file declared `name` at the top level.
    pub fn declares(&self, name: &DatasetName) -> bool {
        self.keys.contains(name)
    }
}

type Template = HashMap<String, String>;

/// Turns parsed catalog documents into dataset records.
#[derive(Debug, Clone, Default)]
pub struct CatalogExtractor {
    config: ExtractorConfig,
}

impl CatalogExtractor {
    /// Create an extractor with the given configuration.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// The extractor configuration.
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Parse and extract in one step.
    pub fn extract_text(
        &self,
        path: impl Into<std::path::PathBuf>,
        text: impl Into<String>,
    ) -> Result<Extraction> {
        let doc = CatalogDocument::parse(path, text)?;
        self.extract(&doc)
    }

    /// Extract dataset records from a document.
    ///
    /// A document with syntax errors is rejected as a whole.
    pub fn extract(&self, doc: &CatalogDocument) -> Result<Extraction> {
        if doc.is_blank() {
            return Ok(Extraction::default());
        }
        if let Some(reason) = doc.first_error() {
            return Err(CatalogError::Malformed {
                path: doc.path().to_path_buf(),
                reason,
            });
        }

        let pairs: Vec<(Node<'_>, DatasetName, Option<Node<'_>>)> = doc
            .top_level_pairs()
            .into_iter()
            .filter_map(|pair| {
                let key = pair.child_by_field_name("key")?;
                let name = DatasetName::new(doc.node_text(key));
                Some((key, name, pair.child_by_field_name("value")))
            })
            .collect();

        let mut extraction = Extraction {
            records: Vec::new(),
            keys: pairs.iter().map(|(_, name, _)| name.clone()).collect(),
        };

        let mut templates: HashMap<String, Template> = HashMap::new();
        for (_, name, value) in &pairs {
            if !self.is_placeholder(name) {
                continue;
            }
            let Some(value) = value else {
                continue;
            };
            let shape = ValueShape::of(*value);
            let template = self.resolve(doc, *value, shape, &templates);
            if let Some(anchor) = shape.anchor {
                templates.insert(anchor_name(doc, anchor), template.clone());
            }
            templates.insert(name.to_string(), template);
        }

        for (key, name, value) in &pairs {
            if self.is_placeholder(name) {
                continue;
            }
            let Some(value) = value else {
                debug!("Skipping catalog entry {name} without a value");
                continue;
            };
            let shape = ValueShape::of(*value);
            if shape.mapping.is_none() && shape.alias.is_none() {
                debug!("Skipping catalog entry {name} that is not a mapping");
                continue;
            }

            let mut attributes = self.resolve(doc, *value, shape, &templates);
            let dataset_type = attributes
                .remove(TYPE_ATTRIBUTE)
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string());
            let mut record = DatasetRecord::new(name.clone(), dataset_type, doc.anchor_for(*key));
            if let Some(layer) = attributes.remove(LAYER_ATTRIBUTE) {
                record = record.with_layer(layer);
            }
            extraction.records.push(record);
        }

        debug!(
            "Extracted {} datasets from {}",
            extraction.records.len(),
            doc.path().display()
        );
        Ok(extraction)
    }

    fn is_placeholder(&self, name: &DatasetName) -> bool {
        name.starts_with(self.config.placeholder_prefix.as_str())
    }

    /// Merge alias templates, then the value's own attributes.
    fn resolve(
        &self,
        doc: &CatalogDocument,
        value: Node<'_>,
        shape: ValueShape<'_>,
        templates: &HashMap<String, Template>,
    ) -> Template {
        let mut merged = Template::new();

        for alias in collect_aliases(value) {
            if let Some(template) = self.lookup(&alias_name(doc, alias), templates) {
                merged.extend(template.clone());
            } else {
                debug!("Unresolved alias *{}", alias_name(doc, alias));
            }
        }

        if let Some(mapping) = shape.mapping {
            merged.extend(self.own_attributes(doc, mapping));
        }

        merged
    }

    /// Find a template by anchor name, falling back to the placeholder key.
    fn lookup<'a>(
        &self,
        alias: &str,
        templates: &'a HashMap<String, Template>,
    ) -> Option<&'a Template> {
        let prefix = &self.config.placeholder_prefix;
        templates
            .get(alias)
            .or_else(|| templates.get(&format!("{prefix}{alias}")))
    }

    fn own_attributes(&self, doc: &CatalogDocument, mapping: Node<'_>) -> Template {
        mapping_pairs(mapping)
            .into_iter()
            .filter_map(|pair| {
                let key = scalar_text(doc, pair.child_by_field_name("key")?);
                if !self.config.projects(&key) {
                    return None;
                }
                let value = ValueShape::of(pair.child_by_field_name("value")?);
                let scalar = value.scalar?;
                Some((key, scalar_text(doc, scalar)))
            })
            .collect()
    }
}
