//! Shutdown coordination between the server and background tasks.

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Background tasks (reload loop, watcher) hold a `ShutdownListener` and stop
/// once `trigger` is called. Late subscribers observe an earlier trigger.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    /// Resolves once shutdown has been triggered.
    pub async fn wait(&mut self) {
        // An error means the coordinator is gone, which is a shutdown too.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
