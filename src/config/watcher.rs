//! Repository watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Why a reload was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTrigger {
    /// A file under the repository changed.
    Changed(Vec<PathBuf>),
    /// SIGHUP.
    Signal,
}

/// A watcher that monitors the webapp repository for changes.
pub struct RepositoryWatcher {
    path: PathBuf,
    trigger_tx: mpsc::UnboundedSender<ReloadTrigger>,
}

impl RepositoryWatcher {
    /// Create a new RepositoryWatcher feeding `trigger_tx`.
    pub fn new(path: &Path, trigger_tx: mpsc::UnboundedSender<ReloadTrigger>) -> Self {
        Self {
            path: path.to_path_buf(),
            trigger_tx,
        }
    }

    /// Start watching in a background thread. Dropping the returned
    /// watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.trigger_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::debug!(paths = ?event.paths, "Repository change detected");
                        let _ = tx.send(ReloadTrigger::Changed(event.paths));
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::Recursive)?;

        tracing::info!(path = ?self.path, "Repository watcher started");
        Ok(watcher)
    }
}

/// Wait for the next trigger, then swallow the burst that follows it.
pub async fn next_batch(
    rx: &mut mpsc::UnboundedReceiver<ReloadTrigger>,
    settle: Duration,
) -> Option<Vec<ReloadTrigger>> {
    let first = rx.recv().await?;
    let mut batch = vec![first];
    while let Ok(Some(next)) = tokio::time::timeout(settle, rx.recv()).await {
        batch.push(next);
    }
    Some(batch)
}
