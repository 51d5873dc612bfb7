//! Catalog file layout of a project.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

/// Naming convention that identifies catalog files inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConvention {
    /// Path segment of the configuration directory.
    pub conf_segment: String,

    /// Path segment (or file stem prefix) of catalog files.
    pub catalog_segment: String,

    /// Recognized file extensions, without the dot.
    pub extensions: Vec<String>,

    /// Patterns to exclude (glob patterns).
    pub exclude_patterns: Vec<String>,

    /// Maximum depth to recurse (None = unlimited).
    pub max_depth: Option<usize>,

    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,
}

impl Default for CatalogConvention {
    fn default() -> Self {
        Self {
            conf_segment: "conf".to_string(),
            catalog_segment: "catalog".to_string(),
            extensions: vec!["yml".to_string(), "yaml".to_string()],
            exclude_patterns: Self::default_excludes(),
            max_depth: None,
            follow_symlinks: false,
        }
    }
}

impl CatalogConvention {
    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Set the configuration directory segment.
    pub fn with_conf_segment(mut self, segment: impl Into<String>) -> Self {
        self.conf_segment = segment.into();
        self
    }

    /// Set the catalog segment.
    pub fn with_catalog_segment(mut self, segment: impl Into<String>) -> Self {
        self.catalog_segment = segment.into();
        self
    }

    /// Set the maximum depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Check that every exclude pattern is a valid glob.
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.exclude_patterns {
            glob::Pattern::new(pattern)
                .map_err(|e| WatcherError::InvalidPattern(format!("{pattern}: {e}")))?;
        }
        Ok(())
    }

    fn default_excludes() -> Vec<String> {
        vec![
            "**/.git/**".to_string(),
            "**/.venv/**".to_string(),
            "**/.ipynb_checkpoints/**".to_string(),
            "**/*~".to_string(),
        ]
    }
}

/// A project root combined with its catalog convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogLayout {
    /// Project root directory.
    pub root: PathBuf,

    /// Catalog naming convention.
    #[serde(default)]
    pub convention: CatalogConvention,
}

impl CatalogLayout {
    /// Create a layout with the default convention.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            convention: CatalogConvention::default(),
        }
    }

    /// Set the convention.
    pub fn with_convention(mut self, convention: CatalogConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Whether `path` lies inside the project root.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Check if a path should be excluded.
    pub fn should_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        self.convention.exclude_patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern).is_ok_and(|glob| glob.matches(&path_str))
        })
    }

    /// Whether `path` names a catalog file.
    ///
    /// All of these must hold: the path is inside the root, one of its
    /// directories is the configuration segment, either a directory is the
    /// catalog segment or the file stem starts with it, and the extension is
    /// recognized. The file does not need to exist.
    pub fn is_catalog_file(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if !self.has_catalog_extension(path) || self.should_exclude(path) {
            return false;
        }

        let directories: Vec<&str> = relative
            .parent()
            .map(|parent| {
                parent
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(segment) => segment.to_str(),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let convention = &self.convention;
        let in_conf = directories.contains(&convention.conf_segment.as_str());
        let in_catalog_dir = directories.contains(&convention.catalog_segment.as_str());
        let catalog_stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.starts_with(convention.catalog_segment.as_str()));

        in_conf && (in_catalog_dir || catalog_stem)
    }

    /// Whether `path` is a directory path that could hold catalog files.
    ///
    /// Used for deletions, where the path no longer exists on disk and only
    /// its shape is known.
    pub fn may_contain_catalog_files(&self, path: &Path) -> bool {
        self.contains(path) && !self.should_exclude(path) && path.extension().is_none()
    }

    fn has_catalog_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.convention
                    .extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_catalog_file_convention() {
        let layout = CatalogLayout::new("/project");

        assert!(layout.is_catalog_file(Path::new("/project/conf/base/catalog.yml")));
        assert!(layout.is_catalog_file(Path::new("/project/conf/local/catalog_dev.yaml")));
        assert!(layout.is_catalog_file(Path::new("/project/conf/base/catalog/raw.yml")));

        assert!(!layout.is_catalog_file(Path::new("/project/conf/base/parameters.yml")));
        assert!(!layout.is_catalog_file(Path::new("/project/src/catalog.yml")));
        assert!(!layout.is_catalog_file(Path::new("/project/conf/base/catalog.json")));
        assert!(!layout.is_catalog_file(Path::new("/other/conf/base/catalog.yml")));
    }

    #[test]
    fn test_exclude_patterns() {
        let layout = CatalogLayout::new("/project")
            .with_convention(CatalogConvention::default().exclude("**/conf/local/**"));

        assert!(layout.should_exclude(Path::new("/project/.git/conf/catalog.yml")));
        assert!(!layout.is_catalog_file(Path::new("/project/conf/local/catalog.yml")));
        assert!(layout.is_catalog_file(Path::new("/project/conf/base/catalog.yml")));
    }

    #[test]
    fn test_validate_rejects_bad_glob() {
        let convention = CatalogConvention::default().exclude("**/[");
        assert!(matches!(
            convention.validate(),
            Err(WatcherError::InvalidPattern(_))
        ));
        assert!(CatalogConvention::default().validate().is_ok());
    }

    #[test]
    fn test_custom_segments() {
        let layout = CatalogLayout::new("/project").with_convention(
            CatalogConvention::default()
                .with_conf_segment("settings")
                .with_catalog_segment("datasets"),
        );

        assert!(layout.is_catalog_file(Path::new("/project/settings/base/datasets.yml")));
        assert!(!layout.is_catalog_file(Path::new("/project/conf/base/catalog.yml")));
        assert_eq!(layout.convention.extensions, vec!["yml", "yaml"]);
    }
}
