//! The catalog lens facade.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kedro_lens_directory_watcher::{DirectoryWatcher, EventBatch, EventBatcher, WatcherError};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::LensConfig;
use crate::error::Result;
use crate::project::{LensEvent, ProjectContext};
use crate::query::CatalogQuery;
use crate::scheduler::{AlwaysOpen, HostGate, SyncScheduler};
use crate::sync::{CatalogSynchronizer, SyncReport};

/// Catalog lens for one open Kedro project.
///
/// Owns the dataset index, the background sync worker, and optionally a
/// live file watcher. Opening the lens schedules the initial scan; closing
/// it disposes the project so that outstanding work becomes a no-op.
pub struct KedroLens {
    /// Shared project state.
    project: Arc<ProjectContext>,

    /// Applies catalog files to the index.
    synchronizer: Arc<CatalogSynchronizer>,

    /// Queue in front of the sync worker.
    scheduler: SyncScheduler,

    /// Query surface.
    query: CatalogQuery,

    /// Live watcher, when enabled.
    watcher: Mutex<Option<DirectoryWatcher>>,

    /// Background tasks owned by the lens.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl KedroLens {
    /// Create a lens builder for a project root.
    pub fn builder(root: impl Into<PathBuf>) -> KedroLensBuilder {
        KedroLensBuilder::new(root)
    }

    /// Open a project and schedule its initial scan.
    pub async fn open(
        root: impl Into<PathBuf>,
        config: LensConfig,
        gate: Arc<dyn HostGate>,
    ) -> Result<Self> {
        let root = root.into();
        info!("Opening catalog lens for {}", root.display());

        config.catalog.validate()?;
        if !tokio::fs::metadata(&root)
            .await
            .is_ok_and(|metadata| metadata.is_dir())
        {
            return Err(WatcherError::RootNotFound(root.display().to_string()).into());
        }

        let project = ProjectContext::new(root, config);
        let synchronizer = Arc::new(CatalogSynchronizer::new(project.clone()));
        let (scheduler, worker) = SyncScheduler::spawn(synchronizer.clone(), gate);
        let query = CatalogQuery::new(project.clone());

        scheduler.schedule_initialize()?;

        Ok(Self {
            project,
            synchronizer,
            scheduler,
            query,
            watcher: Mutex::new(None),
            tasks: Mutex::new(vec![worker]),
        })
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        self.project.root()
    }

    /// Shared project state.
    pub fn project(&self) -> &Arc<ProjectContext> {
        &self.project
    }

    /// Query surface.
    pub fn query(&self) -> &CatalogQuery {
        &self.query
    }

    /// Sync queue.
    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Subscribe to index updates and diagnostics.
    pub fn subscribe(&self) -> broadcast::Receiver<LensEvent> {
        self.project.subscribe()
    }

    /// Run a full sync on the calling task.
    ///
    /// Unlike scheduled work this does not consult the host gate.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        self.synchronizer.initialize().await
    }

    /// Queue a batch of file changes reported by the host.
    pub fn notify_changes(&self, batch: EventBatch) -> Result<()> {
        self.scheduler.schedule_changes(batch)
    }

    /// Start watching the project root for catalog changes.
    pub async fn watch(&self) -> Result<()> {
        let mut slot = self.watcher.lock().await;
        if slot.is_some() {
            debug!("Catalog watcher already running");
            return Ok(());
        }

        let sync_config = &self.project.config().sync;
        let mut watcher =
            DirectoryWatcher::new(self.project.layout().clone(), sync_config.event_channel_capacity);
        watcher.start()?;

        if let Some(rx) = watcher.take_events() {
            let batcher = EventBatcher::new(rx, sync_config.debounce());
            let forwarder = self.scheduler.spawn_event_forwarder(batcher);
            self.tasks.lock().await.push(forwarder);
        }
        *slot = Some(watcher);
        Ok(())
    }

    /// Whether the live watcher is running.
    pub async fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .await
            .as_ref()
            .is_some_and(DirectoryWatcher::is_running)
    }

    /// Whether the lens has been closed.
    pub fn is_closed(&self) -> bool {
        self.project.is_disposed()
    }

    /// Close the project and wait for background tasks to finish.
    pub async fn close(&self) {
        self.project.dispose();

        if let Some(mut watcher) = self.watcher.lock().await.take() {
            watcher.stop();
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                debug!("Background task ended abnormally: {e}");
            }
        }
    }

    /// Index statistics.
    pub async fn stats(&self) -> LensStats {
        let index_stats = self.project.index().read().await.stats();
        let catalog_files = self.synchronizer.tracked_files().await.len();

        LensStats {
            datasets: index_stats.dataset_count,
            catalog_files,
            by_layer: index_stats.by_layer,
            watching: self.is_watching().await,
            closed: self.is_closed(),
        }
    }
}

impl Drop for KedroLens {
    fn drop(&mut self) {
        self.project.dispose();
    }
}

/// Builder for a catalog lens.
pub struct KedroLensBuilder {
    root: PathBuf,
    config: LensConfig,
    gate: Arc<dyn HostGate>,
    watch: bool,
}

impl KedroLensBuilder {
    /// Create a builder for a project root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: LensConfig::default(),
            gate: Arc::new(AlwaysOpen),
            watch: false,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: LensConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the host gate.
    pub fn with_gate(mut self, gate: impl HostGate) -> Self {
        self.gate = Arc::new(gate);
        self
    }

    /// Enable or disable live file watching.
    pub fn with_watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    /// Open the lens.
    pub async fn build(self) -> Result<KedroLens> {
        let lens = KedroLens::open(self.root, self.config, self.gate).await?;
        if self.watch {
            lens.watch().await?;
        }
        Ok(lens)
    }
}

/// Statistics about an open lens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LensStats {
    /// Number of indexed datasets.
    pub datasets: usize,

    /// Number of tracked catalog files.
    pub catalog_files: usize,

    /// Dataset count per layer; entries without a layer count under `""`.
    pub by_layer: BTreeMap<String, usize>,

    /// Whether the live watcher is running.
    pub watching: bool,

    /// Whether the lens has been closed.
    pub closed: bool,
}
