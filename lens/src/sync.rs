//! Keeps the dataset index in step with catalog files on disk.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kedro_lens_catalog::{
    CatalogError, CatalogExtractor, CatalogIndex, DatasetName, DatasetRecord, Extraction,
};
use kedro_lens_directory_watcher::{CatalogFileIndex, EventBatch, FileEventKind, discover_under};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::project::{CatalogDiagnostic, LensEvent, ProjectContext};

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Catalog files read and applied.
    pub files_synced: usize,

    /// Records inserted or replaced.
    pub upserted: usize,

    /// Records dropped from the index.
    pub removed: usize,

    /// Files that could not be read or parsed.
    pub failed: usize,

    /// Newly detected duplicate declarations across files.
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileAction {
    Resync,
    Remove,
}

struct SyncState {
    files: CatalogFileIndex,

    /// Last successful extraction of each tracked file, used to fall back to
    /// a shadowed declaration when the winning one goes away.
    declared: HashMap<PathBuf, Vec<DatasetRecord>>,

    /// Duplicate declarations already reported, as (name, file, file) with
    /// the files in sorted order.
    clashes: HashSet<(DatasetName, PathBuf, PathBuf)>,
}

impl SyncState {
    /// Record a clash, returning whether it is new.
    fn note_clash(&mut self, name: &DatasetName, a: &Path, b: &Path) -> bool {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        self.clashes.insert((name.clone(), first.to_path_buf(), second.to_path_buf()))
    }

    /// Forget clashes of `path` that `still_declared` no longer holds.
    fn settle_clashes(&mut self, path: &Path, still_declared: impl Fn(&DatasetName) -> bool) {
        self.clashes.retain(|(name, first, second)| {
            (first != path && second != path) || still_declared(name)
        });
    }
}

/// Applies catalog file contents to a project's index.
///
/// Sync passes are serialized; each file's upserts and deletions are applied
/// under a single write lock so readers never observe half a file.
pub struct CatalogSynchronizer {
    project: Arc<ProjectContext>,
    extractor: CatalogExtractor,
    state: Mutex<SyncState>,
}

impl CatalogSynchronizer {
    /// Create a synchronizer for a project.
    pub fn new(project: Arc<ProjectContext>) -> Self {
        let extractor = CatalogExtractor::new(project.config().extractor.clone());
        let files = CatalogFileIndex::new(project.layout().clone());

        Self {
            project,
            extractor,
            state: Mutex::new(SyncState {
                files,
                declared: HashMap::new(),
                clashes: HashSet::new(),
            }),
        }
    }

    /// The project this synchronizer writes to.
    pub fn project(&self) -> &Arc<ProjectContext> {
        &self.project
    }

    /// Catalog files currently tracked, sorted.
    pub async fn tracked_files(&self) -> Vec<PathBuf> {
        let state = self.state.lock().await;
        state
            .files
            .paths()
            .into_iter()
            .map(Path::to_path_buf)
            .collect()
    }

    /// Scan the whole project and sync every catalog file.
    ///
    /// Safe to run repeatedly: unchanged files produce the same records, and
    /// records of files that disappeared are dropped.
    pub async fn initialize(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        if self.project.is_disposed() {
            return Ok(report);
        }

        let mut state = self.state.lock().await;
        let scan = state.files.scan()?;

        for path in &scan.removed {
            self.remove_file(&mut state, path, &mut report).await;
        }

        let untracked: Vec<PathBuf> = {
            let index = self.project.index().read().await;
            index
                .files()
                .into_iter()
                .filter(|path| !state.files.contains(path))
                .map(Path::to_path_buf)
                .collect()
        };
        for path in &untracked {
            self.remove_file(&mut state, path, &mut report).await;
        }

        let tracked: Vec<PathBuf> = state
            .files
            .paths()
            .into_iter()
            .map(Path::to_path_buf)
            .collect();
        for path in &tracked {
            if self.project.is_disposed() {
                return Ok(report);
            }
            self.sync_file(&mut state, path, &mut report).await;
        }

        let dataset_count = self.project.index().read().await.len();
        info!(
            "Initialized catalog index from {} files ({dataset_count} datasets)",
            tracked.len()
        );
        Ok(self.finish(report))
    }

    /// Apply a batch of file system changes.
    ///
    /// Removals run before re-syncs so that a renamed file does not report
    /// its own datasets as duplicates.
    pub async fn on_files_changed(&self, batch: &EventBatch) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        if self.project.is_disposed() || batch.is_empty() {
            return Ok(report);
        }

        let layout = self.project.layout();
        let mut plan: BTreeMap<PathBuf, FileAction> = BTreeMap::new();
        for event in batch.catalog_events(layout) {
            match event.kind {
                FileEventKind::Deleted => {
                    plan.insert(event.path.clone(), FileAction::Remove);
                }
                FileEventKind::Moved => {
                    if let Some(origin) = &event.origin {
                        plan.insert(origin.clone(), FileAction::Remove);
                    }
                    plan.insert(event.path.clone(), FileAction::Resync);
                }
                _ => {
                    plan.insert(event.path.clone(), FileAction::Resync);
                }
            }
        }
        if plan.is_empty() {
            debug!("No catalog changes in batch of {} events", batch.len());
            return Ok(report);
        }

        let mut state = self.state.lock().await;
        for (path, _) in plan.iter().filter(|(_, a)| **a == FileAction::Remove) {
            if self.project.is_disposed() {
                return Ok(report);
            }
            self.remove_path(&mut state, path, &mut report).await;
        }
        for (path, _) in plan.iter().filter(|(_, a)| **a == FileAction::Resync) {
            if self.project.is_disposed() {
                return Ok(report);
            }
            self.resync_path(&mut state, path, &mut report).await;
        }

        debug!(
            "Applied {} catalog changes: {} upserted, {} removed",
            plan.len(),
            report.upserted,
            report.removed
        );
        Ok(self.finish(report))
    }

    async fn remove_path(&self, state: &mut SyncState, path: &Path, report: &mut SyncReport) {
        for file in state.files.forget_under(path) {
            self.remove_file(state, &file, report).await;
        }
        if state.files.forget(path).is_some() || self.project.layout().is_catalog_file(path) {
            self.remove_file(state, path, report).await;
        }
    }

    async fn resync_path(&self, state: &mut SyncState, path: &Path, report: &mut SyncReport) {
        let layout = self.project.layout();
        if path.is_dir() {
            match discover_under(layout, path) {
                Ok(files) => {
                    for file in &files {
                        self.sync_file(state, file, report).await;
                    }
                }
                Err(e) => warn!("Failed to scan {}: {e}", path.display()),
            }
        } else if layout.is_catalog_file(path) {
            self.sync_file(state, path, report).await;
        }
    }

    async fn sync_file(&self, state: &mut SyncState, path: &Path, report: &mut SyncReport) {
        let extraction = match tokio::fs::read_to_string(path).await {
            Ok(text) => match self.extractor.extract_text(path, text) {
                Ok(extraction) => extraction,
                Err(e) => {
                    let reason = match e {
                        CatalogError::Malformed { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    self.report_malformed(path, reason, report);
                    Extraction::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Catalog file vanished before sync: {}", path.display());
                state.files.forget(path);
                self.remove_file(state, path, report).await;
                return;
            }
            Err(e) => {
                self.report_malformed(path, e.to_string(), report);
                Extraction::default()
            }
        };

        state.files.track(path);
        report.files_synced += 1;
        self.apply(state, path, extraction, report).await;
    }

    async fn apply(
        &self,
        state: &mut SyncState,
        path: &Path,
        extraction: Extraction,
        report: &mut SyncReport,
    ) {
        let mut diagnostics = Vec::new();
        {
            let mut index = self.project.index().write().await;
            if self.project.is_disposed() {
                return;
            }

            state.settle_clashes(path, |name| extraction.declares(name));
            for record in &extraction.records {
                if let Some(old) = index.upsert(record.clone())
                    && !old.is_from(path)
                    && state.note_clash(&record.name, path, &old.source)
                {
                    warn!(
                        "Dataset '{}' in {} replaces the declaration in {}",
                        record.name,
                        path.display(),
                        old.source.display()
                    );
                    report.duplicates += 1;
                    diagnostics.push(CatalogDiagnostic::DuplicateDataset {
                        name: record.name.clone(),
                        kept: path.to_path_buf(),
                        shadowed: old.source,
                    });
                }
                report.upserted += 1;
            }

            let stale: Vec<DatasetName> = index
                .by_file(path)
                .into_iter()
                .filter(|record| !extraction.declares(&record.name))
                .map(|record| record.name.clone())
                .collect();
            for name in stale {
                if index.remove_from(&name, path).is_some() {
                    report.removed += 1;
                    restore_shadowed(&mut index, &state.declared, path, &name);
                }
            }
        }

        state.declared.insert(path.to_path_buf(), extraction.records);
        for diagnostic in diagnostics {
            self.project.publish(LensEvent::Diagnostic(diagnostic));
        }
    }

    async fn remove_file(&self, state: &mut SyncState, path: &Path, report: &mut SyncReport) {
        state.declared.remove(path);
        state.settle_clashes(path, |_| false);

        let mut index = self.project.index().write().await;
        if self.project.is_disposed() {
            return;
        }
        let removed = index.remove_file(path);
        for record in &removed {
            restore_shadowed(&mut index, &state.declared, path, &record.name);
        }
        if !removed.is_empty() {
            debug!("Dropped {} datasets of {}", removed.len(), path.display());
        }
        report.removed += removed.len();
    }

    fn report_malformed(&self, path: &Path, reason: String, report: &mut SyncReport) {
        warn!("Skipping catalog file {}: {reason}", path.display());
        report.failed += 1;
        self.project
            .publish(LensEvent::Diagnostic(CatalogDiagnostic::MalformedFile {
                path: path.to_path_buf(),
                reason,
            }));
    }

    fn finish(&self, report: SyncReport) -> SyncReport {
        if !self.project.is_disposed() {
            self.project.publish(LensEvent::IndexUpdated(report.clone()));
        }
        report
    }
}

/// Re-insert another file's declaration of `name`, if one exists.
fn restore_shadowed(
    index: &mut CatalogIndex,
    declared: &HashMap<PathBuf, Vec<DatasetRecord>>,
    removed_from: &Path,
    name: &DatasetName,
) {
    let fallback = declared
        .iter()
        .filter(|(path, _)| path.as_path() != removed_from)
        .filter_map(|(_, records)| records.iter().find(|record| record.name == *name))
        .min_by(|a, b| a.source.cmp(&b.source))
        .cloned();

    if let Some(record) = fallback {
        debug!(
            "Restoring dataset '{name}' from {}",
            record.source.display()
        );
        index.upsert(record);
    }
}
