//! Catalog file discovery and tracking.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::CatalogLayout;
use crate::error::{Result, WatcherError};

/// List every catalog file under the layout root, sorted.
pub fn discover_catalog_files(layout: &CatalogLayout) -> Result<Vec<PathBuf>> {
    discover_under(layout, &layout.root)
}

/// List catalog files below `dir`, which must be inside the layout root.
pub fn discover_under(layout: &CatalogLayout, dir: &Path) -> Result<Vec<PathBuf>> {
    if !layout.root.is_dir() {
        return Err(WatcherError::RootNotFound(layout.root.display().to_string()));
    }
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let convention = &layout.convention;
    let walker = WalkDir::new(dir)
        .follow_links(convention.follow_symlinks)
        .max_depth(convention.max_depth.unwrap_or(usize::MAX));

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_entry(|entry| !layout.should_exclude(entry.path()))
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && layout.is_catalog_file(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();

    debug!("Discovered {} catalog files under {}", files.len(), dir.display());
    Ok(files)
}

/// A tracked catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    /// Full path to the file.
    pub path: PathBuf,

    /// When the file was last modified.
    pub modified: Option<DateTime<Utc>>,
}

impl TrackedFile {
    /// Create a tracked file from a path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let modified = path
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        Self { path, modified }
    }
}

/// The set of catalog files a project currently knows about.
///
/// Files stay tracked after a failed parse so a later fix is picked up by
/// the next scan.
#[derive(Debug, Clone)]
pub struct CatalogFileIndex {
    /// Tracked files by path.
    files: HashMap<PathBuf, TrackedFile>,

    /// Layout the files were discovered with.
    layout: CatalogLayout,
}

impl CatalogFileIndex {
    /// Create an empty index for a layout.
    pub fn new(layout: CatalogLayout) -> Self {
        Self {
            files: HashMap::new(),
            layout,
        }
    }

    /// The layout this index scans.
    pub fn layout(&self) -> &CatalogLayout {
        &self.layout
    }

    /// Rescan the project and reconcile the tracked set.
    pub fn scan(&mut self) -> Result<ScanResult> {
        let start = std::time::Instant::now();
        let mut result = ScanResult::default();

        let current: HashSet<PathBuf> = discover_catalog_files(&self.layout)?
            .into_iter()
            .collect();

        for path in &current {
            let tracked = TrackedFile::from_path(path);
            match self.files.get(path) {
                Some(existing) if existing.modified == tracked.modified => {}
                Some(_) => {
                    result.updated.push(path.clone());
                    self.files.insert(path.clone(), tracked);
                }
                None => {
                    result.added.push(path.clone());
                    self.files.insert(path.clone(), tracked);
                }
            }
        }

        let removed: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|path| !current.contains(*path))
            .cloned()
            .collect();
        for path in removed {
            self.files.remove(&path);
            result.removed.push(path);
        }

        result.added.sort();
        result.updated.sort();
        result.removed.sort();
        result.total_files = self.files.len();
        result.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            "Scanned {} catalog files in {}ms (new: {}, updated: {}, removed: {})",
            result.total_files,
            result.duration_ms,
            result.added.len(),
            result.updated.len(),
            result.removed.len()
        );
        Ok(result)
    }

    /// Start tracking a file. Returns `false` if it was already tracked.
    pub fn track(&mut self, path: &Path) -> bool {
        self.files
            .insert(path.to_path_buf(), TrackedFile::from_path(path))
            .is_none()
    }

    /// Stop tracking a file.
    pub fn forget(&mut self, path: &Path) -> Option<TrackedFile> {
        self.files.remove(path)
    }

    /// Stop tracking every file below `dir`, returning their paths.
    pub fn forget_under(&mut self, dir: &Path) -> Vec<PathBuf> {
        let mut forgotten: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|path| path.starts_with(dir) && path.as_path() != dir)
            .cloned()
            .collect();
        for path in &forgotten {
            self.files.remove(path);
        }
        forgotten.sort();
        forgotten
    }

    /// Check if a file is tracked.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Get a tracked file by path.
    pub fn get(&self, path: &Path) -> Option<&TrackedFile> {
        self.files.get(path)
    }

    /// All tracked paths, sorted.
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.files.keys().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files are tracked.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Clear the index.
    pub fn clear(&mut self) {
        self.files.clear();
        debug!("Cleared catalog file index");
    }
}

/// Result of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Total files tracked after the scan.
    pub total_files: usize,

    /// Newly discovered files.
    pub added: Vec<PathBuf>,

    /// Files whose modification time changed.
    pub updated: Vec<PathBuf>,

    /// Files that disappeared.
    pub removed: Vec<PathBuf>,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("conf/base");
        fs::create_dir_all(base.join("catalog")).unwrap();
        fs::write(base.join("catalog.yml"), "a: {type: x}\n").unwrap();
        fs::write(base.join("catalog/raw.yaml"), "b: {type: x}\n").unwrap();
        fs::write(base.join("parameters.yml"), "c: 1\n").unwrap();
        fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        fs::write(temp_dir.path().join("src/catalog.yml"), "d: {type: x}\n").unwrap();
        temp_dir
    }

    #[test]
    fn test_discover_catalog_files() {
        let temp_dir = project();
        let layout = CatalogLayout::new(temp_dir.path());

        let files = discover_catalog_files(&layout).unwrap();
        assert_eq!(
            files,
            vec![
                temp_dir.path().join("conf/base/catalog/raw.yaml"),
                temp_dir.path().join("conf/base/catalog.yml"),
            ]
        );
    }

    #[test]
    fn test_missing_root() {
        let layout = CatalogLayout::new("/nonexistent/project/12345");
        assert!(matches!(
            discover_catalog_files(&layout),
            Err(WatcherError::RootNotFound(_))
        ));
    }

    #[test]
    fn test_scan_reports_added_and_removed() {
        let temp_dir = project();
        let mut index = CatalogFileIndex::new(CatalogLayout::new(temp_dir.path()));

        let first = index.scan().unwrap();
        assert_eq!(first.added.len(), 2);
        assert_eq!(first.total_files, 2);

        let removed = temp_dir.path().join("conf/base/catalog.yml");
        fs::remove_file(&removed).unwrap();

        let second = index.scan().unwrap();
        assert!(second.added.is_empty());
        assert_eq!(second.removed, vec![removed]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_forget_under_directory() {
        let temp_dir = project();
        let mut index = CatalogFileIndex::new(CatalogLayout::new(temp_dir.path()));
        index.scan().unwrap();

        let forgotten = index.forget_under(&temp_dir.path().join("conf/base/catalog"));
        assert_eq!(forgotten, vec![temp_dir.path().join("conf/base/catalog/raw.yaml")]);
        assert!(index.contains(&temp_dir.path().join("conf/base/catalog.yml")));
    }
}
