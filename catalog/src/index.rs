//! Name-keyed dataset index.
//!
//! The `CatalogIndex` holds at most one record per dataset name and keeps a
//! secondary map from catalog file to the names it currently contributes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::{DatasetName, DatasetRecord, normalize_name};

/// Dataset records of a project, keyed by normalized name.
#[derive(Debug, Default, Clone)]
pub struct CatalogIndex {
    /// All known datasets.
    datasets: HashMap<DatasetName, DatasetRecord>,

    /// Mapping from catalog file to the dataset names it holds.
    files: HashMap<PathBuf, BTreeSet<DatasetName>>,
}

impl CatalogIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same name.
    ///
    /// Returns the replaced record.
    pub fn upsert(&mut self, record: DatasetRecord) -> Option<DatasetRecord> {
        let name = record.name.clone();
        let source = record.source.clone();

        let replaced = self.datasets.insert(name.clone(), record);
        if let Some(old) = &replaced
            && old.source != source
        {
            self.unlink(&old.source, &name);
        }
        self.files.entry(source).or_default().insert(name);
        replaced
    }

    /// Remove a dataset by name. Quotes around `name` are ignored.
    pub fn remove(&mut self, name: &str) -> Option<DatasetRecord> {
        let name = DatasetName::new(name);
        let removed = self.datasets.remove(&name)?;
        self.unlink(&removed.source, &name);
        debug!("Removed dataset from index: {name}");
        Some(removed)
    }

    /// Remove `name` only if its current record came from `source`.
    pub fn remove_from(&mut self, name: &DatasetName, source: &Path) -> Option<DatasetRecord> {
        if self.datasets.get(name)?.is_from(source) {
            self.remove(name.as_str())
        } else {
            None
        }
    }

    /// Remove every record contributed by `source`.
    pub fn remove_file(&mut self, source: &Path) -> Vec<DatasetRecord> {
        let names = self.files.remove(source).unwrap_or_default();
        names
            .into_iter()
            .filter_map(|name| self.datasets.remove(&name))
            .collect()
    }

    /// Look up a dataset by (possibly quoted) name.
    pub fn by_name(&self, name: &str) -> Option<&DatasetRecord> {
        self.datasets.get(normalize_name(name))
    }

    /// Records contributed by `source`, sorted by name.
    pub fn by_file(&self, source: &Path) -> Vec<&DatasetRecord> {
        self.files
            .get(source)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.datasets.get(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All records sorted by name.
    pub fn all(&self) -> Vec<&DatasetRecord> {
        let mut records: Vec<&DatasetRecord> = self.datasets.values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Owned copy of all records sorted by name.
    pub fn snapshot(&self) -> Vec<DatasetRecord> {
        self.all().into_iter().cloned().collect()
    }

    /// All dataset names, sorted.
    pub fn names(&self) -> Vec<&DatasetName> {
        let mut names: Vec<&DatasetName> = self.datasets.keys().collect();
        names.sort();
        names
    }

    /// Catalog files that currently contribute records.
    pub fn files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = self.files.keys().map(PathBuf::as_path).collect();
        files.sort();
        files
    }

    /// Check if a dataset exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name(name).is_some()
    }

    /// Number of datasets.
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Whether the index holds no datasets.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.datasets.clear();
        self.files.clear();
    }

    /// Get statistics about the index.
    pub fn stats(&self) -> IndexStats {
        let mut by_layer = BTreeMap::new();
        for record in self.datasets.values() {
            let layer = record.layer.clone().unwrap_or_default();
            *by_layer.entry(layer).or_insert(0) += 1;
        }

        IndexStats {
            dataset_count: self.datasets.len(),
            file_count: self.files.len(),
            by_layer,
        }
    }

    fn unlink(&mut self, source: &Path, name: &DatasetName) {
        if let Some(names) = self.files.get_mut(source) {
            names.remove(name);
            if names.is_empty() {
                self.files.remove(source);
            }
        }
    }
}

/// Statistics about the catalog index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub dataset_count: usize,
    pub file_count: usize,
    /// Dataset count per layer; datasets without a layer count under `""`.
    pub by_layer: BTreeMap<String, usize>,
}
