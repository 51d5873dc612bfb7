//! Background scheduling of sync work.
//!
//! Sync tasks are queued to a single worker. Before running a task the worker
//! asks the host whether index mutation is currently allowed; while it is
//! not, the task is held back and the check is retried after a short delay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kedro_lens_directory_watcher::{EventBatch, EventBatcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{LensError, Result};
use crate::sync::CatalogSynchronizer;

/// Host-side switch that can hold back index mutation.
///
/// Editors typically restrict mutation while their own indexes are being
/// rebuilt.
pub trait HostGate: Send + Sync + 'static {
    /// Whether index mutation must wait.
    fn is_restricted(&self) -> bool;
}

/// A gate that never restricts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl HostGate for AlwaysOpen {
    fn is_restricted(&self) -> bool {
        false
    }
}

impl<F> HostGate for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn is_restricted(&self) -> bool {
        self()
    }
}

/// A unit of sync work.
#[derive(Debug, Clone)]
pub enum SyncTask {
    /// Full scan of the project.
    Initialize,

    /// Apply a batch of file changes.
    FilesChanged(EventBatch),
}

impl fmt::Display for SyncTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialize => f.write_str("initialize"),
            Self::FilesChanged(batch) => write!(f, "{} file changes", batch.len()),
        }
    }
}

/// Handle for queueing sync work onto the background worker.
#[derive(Clone)]
pub struct SyncScheduler {
    tx: mpsc::UnboundedSender<SyncTask>,
    cancel: CancellationToken,
}

impl SyncScheduler {
    /// Spawn the worker for `synchronizer`.
    ///
    /// The worker stops when the project is disposed or every scheduler
    /// handle is dropped.
    pub fn spawn(
        synchronizer: Arc<CatalogSynchronizer>,
        gate: Arc<dyn HostGate>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = synchronizer.project().cancellation();
        let retry = synchronizer.project().config().sync.retry_interval();

        let worker = tokio::spawn(run_worker(synchronizer, gate, rx, cancel.clone(), retry));
        (Self { tx, cancel }, worker)
    }

    /// Queue a full project scan.
    pub fn schedule_initialize(&self) -> Result<()> {
        self.schedule(SyncTask::Initialize)
    }

    /// Queue a batch of file changes. Empty batches are ignored.
    pub fn schedule_changes(&self, batch: EventBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.schedule(SyncTask::FilesChanged(batch))
    }

    /// Queue a task.
    pub fn schedule(&self, task: SyncTask) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(LensError::Disposed);
        }
        debug!("Scheduling sync task: {task}");
        self.tx.send(task).map_err(|_| LensError::QueueClosed)
    }

    /// Forward debounced watcher batches into the queue until disposal.
    pub fn spawn_event_forwarder(&self, mut batcher: EventBatcher) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                let batch = tokio::select! {
                    _ = scheduler.cancel.cancelled() => break,
                    batch = batcher.next_batch() => match batch {
                        Some(batch) => batch,
                        None => break,
                    },
                };
                if let Err(e) = scheduler.schedule_changes(batch) {
                    debug!("Stopping event forwarder: {e}");
                    break;
                }
            }
        })
    }
}

impl fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

async fn run_worker(
    synchronizer: Arc<CatalogSynchronizer>,
    gate: Arc<dyn HostGate>,
    mut rx: mpsc::UnboundedReceiver<SyncTask>,
    cancel: CancellationToken,
    retry: Duration,
) {
    loop {
        let task = tokio::select! {
            _ = cancel.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        while gate.is_restricted() {
            debug!("Host restricts index updates, deferring {task}");
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(retry) => {}
            }
        }

        let result = match &task {
            SyncTask::Initialize => synchronizer.initialize().await,
            SyncTask::FilesChanged(batch) => synchronizer.on_files_changed(batch).await,
        };
        if let Err(e) = result {
            warn!("Sync task '{task}' failed: {e}");
        }
    }
    info!("Sync worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LensConfig;
    use crate::project::{LensEvent, ProjectContext};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_closure_gate() {
        let restricted = Arc::new(AtomicBool::new(true));
        let flag = restricted.clone();
        let gate = move || flag.load(Ordering::SeqCst);

        assert!(gate.is_restricted());
        restricted.store(false, Ordering::SeqCst);
        assert!(!gate.is_restricted());
        assert!(!AlwaysOpen.is_restricted());
    }

    #[tokio::test]
    async fn test_schedule_after_dispose_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let project = ProjectContext::new(temp_dir.path(), LensConfig::default());
        let synchronizer = Arc::new(CatalogSynchronizer::new(project.clone()));
        let (scheduler, worker) = SyncScheduler::spawn(synchronizer, Arc::new(AlwaysOpen));

        let mut rx = project.subscribe();
        scheduler.schedule_initialize().unwrap();
        assert!(matches!(rx.recv().await.unwrap(), LensEvent::IndexUpdated(_)));

        project.dispose();
        assert!(matches!(
            scheduler.schedule_initialize(),
            Err(LensError::Disposed)
        ));
        worker.await.unwrap();
    }
}
