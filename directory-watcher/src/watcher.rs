//! Live catalog change feed backed by `notify`.

use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::CatalogLayout;
use crate::error::{Result, WatcherError};
use crate::event::{EventBatch, FileEvent};

/// Watches a project root and forwards catalog file events.
pub struct DirectoryWatcher {
    /// Layout used to filter events.
    layout: Arc<CatalogLayout>,

    /// Internal notify watcher.
    watcher: Option<RecommendedWatcher>,

    /// Event sender.
    event_tx: mpsc::Sender<FileEvent>,

    /// Event receiver, handed out once.
    event_rx: Option<mpsc::Receiver<FileEvent>>,
}

impl DirectoryWatcher {
    /// Create a watcher for a layout with the given channel capacity.
    pub fn new(layout: CatalogLayout, capacity: usize) -> Self {
        let (event_tx, event_rx) = mpsc::channel(capacity.max(1));

        Self {
            layout: Arc::new(layout),
            watcher: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<FileEvent>> {
        self.event_rx.take()
    }

    /// The watched layout.
    pub fn layout(&self) -> &CatalogLayout {
        &self.layout
    }

    /// Start watching the project root recursively.
    pub fn start(&mut self) -> Result<()> {
        let root = self.layout.root.clone();
        if self.watcher.is_some() {
            return Err(WatcherError::AlreadyWatching(root.display().to_string()));
        }
        if !root.exists() {
            return Err(WatcherError::RootNotFound(root.display().to_string()));
        }
        if !root.is_dir() {
            return Err(WatcherError::Config(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }
        self.layout.convention.validate()?;

        let event_tx = self.event_tx.clone();
        let layout = self.layout.clone();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for file_event in FileEvent::from_notify(event) {
                        if !file_event.touches_catalog(&layout) {
                            continue;
                        }
                        if let Err(e) = event_tx.blocking_send(file_event) {
                            error!("Failed to send file event: {e}");
                        }
                    }
                }
                Err(e) => {
                    error!("Watch error: {e}");
                }
            },
        )?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);

        info!("Watching catalog files under {}", root.display());
        Ok(())
    }

    /// Stop watching.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.layout.root) {
                debug!("Failed to unwatch {}: {e}", self.layout.root.display());
            }
            info!("Directory watcher stopped");
        }
    }

    /// Check if the watcher is running.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Groups a stream of file events into debounced batches.
pub struct EventBatcher {
    /// Incoming events.
    rx: mpsc::Receiver<FileEvent>,

    /// How long to keep collecting after the first event of a batch.
    window: Duration,
}

impl EventBatcher {
    /// Create a batcher over a receiver.
    pub fn new(rx: mpsc::Receiver<FileEvent>, window: Duration) -> Self {
        Self { rx, window }
    }

    /// Wait for the next batch.
    ///
    /// Returns `None` once the sender side is closed and drained.
    pub async fn next_batch(&mut self) -> Option<EventBatch> {
        let first = self.rx.recv().await?;
        let mut batch = EventBatch::new();
        batch.push(first);

        let deadline = Instant::now() + self.window;
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(event)) => batch.push(event),
                Ok(None) | Err(_) => break,
            }
        }

        batch.deduplicate();
        debug!("Collected batch of {} file events", batch.len());
        Some(batch)
    }
}
