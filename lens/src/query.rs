//! Editor-facing queries over the dataset index.
//!
//! Queries never fail: positions that are not references, unknown names and
//! disposed projects all yield `None` or an empty list.

use std::ops::Range;
use std::sync::Arc;

use kedro_lens_catalog::{DatasetName, DatasetRecord, DeclarationAnchor};
use kedro_lens_matcher::{MatchResult, PythonSource, ReferenceMatcher, ReferenceSite};
use serde::{Deserialize, Serialize};
use tracing::trace;
use tree_sitter::Node;

use crate::project::ProjectContext;

/// Inline annotation for a confirmed reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Referenced dataset.
    pub name: DatasetName,

    /// Fully qualified dataset type.
    pub dataset_type: String,

    /// Layer, when the entry declares one.
    pub layer: Option<String>,

    /// Byte range of the literal content in the Python source.
    pub range: Range<usize>,
}

impl Annotation {
    /// Hover text, e.g. `pandas.CSVDataSet (raw)`.
    pub fn tooltip(&self) -> String {
        match &self.layer {
            Some(layer) => format!("{} ({layer})", self.dataset_type),
            None => self.dataset_type.clone(),
        }
    }
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: DatasetName,
    pub dataset_type: String,
    pub layer: Option<String>,

    /// Library name, the lookup tag of entries without a layer.
    pub library: String,
}

impl Suggestion {
    fn from_record(record: &DatasetRecord, library: &str) -> Self {
        Self {
            name: record.name.clone(),
            dataset_type: record.dataset_type.clone(),
            layer: record.layer.clone(),
            library: library.to_string(),
        }
    }

    /// Strings a completion popup matches typed text against.
    pub fn lookup_strings(&self) -> Vec<String> {
        let tag = self.layer.as_deref().unwrap_or(&self.library);
        vec![self.name.to_string(), tag.to_string()]
    }

    /// Text inserted by the completion, quoted as a string literal.
    pub fn insert_text(&self) -> String {
        format!("\"{}\"", self.name)
    }

    /// Short type shown next to the completion, e.g. `CSVDataSet (raw)`.
    pub fn type_text(&self) -> String {
        let short = self
            .dataset_type
            .rsplit('.')
            .next()
            .unwrap_or(&self.dataset_type);
        match &self.layer {
            Some(layer) => format!("{short} ({layer})"),
            None => short.to_string(),
        }
    }
}

/// Answers annotation, navigation and completion requests for one project.
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    project: Arc<ProjectContext>,
    matcher: ReferenceMatcher,
}

impl CatalogQuery {
    /// Create a query surface for a project.
    pub fn new(project: Arc<ProjectContext>) -> Self {
        let matcher = ReferenceMatcher::new(project.config().matcher.clone());
        Self { project, matcher }
    }

    /// The matcher used to classify positions.
    pub fn matcher(&self) -> &ReferenceMatcher {
        &self.matcher
    }

    /// Classify a syntax node.
    pub fn classify(&self, source: &PythonSource, node: Node<'_>) -> MatchResult {
        self.matcher.classify(source, node)
    }

    /// Classify the position at `offset`.
    pub fn site_at(&self, source: &PythonSource, offset: usize) -> ReferenceSite {
        self.matcher.site_at(source, offset)
    }

    /// Annotation for the string literal at `offset`.
    pub async fn annotate(&self, source: &PythonSource, offset: usize) -> Option<Annotation> {
        let site = self.matcher.site_at(source, offset);
        self.annotate_site(&site).await
    }

    /// Annotation for an already classified site.
    pub async fn annotate_site(&self, site: &ReferenceSite) -> Option<Annotation> {
        let (literal, range) = confirmed_literal(site)?;
        if self.project.is_disposed() {
            return None;
        }

        let index = self.project.index().read().await;
        let record = index.by_name(literal)?;
        Some(Annotation {
            name: record.name.clone(),
            dataset_type: record.dataset_type.clone(),
            layer: record.layer.clone(),
            range: range.clone(),
        })
    }

    /// Declaration of the dataset referenced at `offset`.
    pub async fn resolve(&self, source: &PythonSource, offset: usize) -> Option<DeclarationAnchor> {
        let site = self.matcher.site_at(source, offset);
        self.resolve_site(&site).await
    }

    /// Declaration of the dataset referenced by an already classified site.
    pub async fn resolve_site(&self, site: &ReferenceSite) -> Option<DeclarationAnchor> {
        let (literal, _) = confirmed_literal(site)?;
        if self.project.is_disposed() {
            return None;
        }

        let index = self.project.index().read().await;
        let anchor = index.by_name(literal).map(|record| record.anchor.clone());
        if anchor.is_none() {
            trace!("No catalog entry for reference '{literal}'");
        }
        anchor
    }

    /// Completion candidates for the position at `offset`, sorted by name.
    pub async fn suggest(&self, source: &PythonSource, offset: usize) -> Vec<Suggestion> {
        let site = self.matcher.site_at(source, offset);
        self.suggest_site(&site).await
    }

    /// Completion candidates for an already classified site.
    pub async fn suggest_site(&self, site: &ReferenceSite) -> Vec<Suggestion> {
        if !site.result.is_candidate() || self.project.is_disposed() {
            return Vec::new();
        }

        let library = &self.matcher.config().library;
        let index = self.project.index().read().await;
        index
            .all()
            .into_iter()
            .map(|record| Suggestion::from_record(record, library))
            .collect()
    }
}

fn confirmed_literal(site: &ReferenceSite) -> Option<(&str, &Range<usize>)> {
    if !site.result.is_confirmed() {
        return None;
    }
    Some((site.literal.as_deref()?, site.literal_range.as_ref()?))
}
