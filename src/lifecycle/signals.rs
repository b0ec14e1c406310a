//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT/SIGTERM and report a shutdown
//! - Translate SIGHUP into a repository reload trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers a webapp reload, not shutdown
//! - On non-Unix targets only Ctrl+C is observed

use tokio::sync::mpsc;

use crate::config::watcher::ReloadTrigger;

/// Resolves when the process is asked to stop.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Forward every SIGHUP to `tx` until the receiver is gone.
#[cfg(unix)]
pub async fn forward_reload_signals(tx: mpsc::UnboundedSender<ReloadTrigger>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGHUP handler");
            return;
        }
    };
    while hangup.recv().await.is_some() {
        tracing::info!("SIGHUP received, reloading webapps");
        if tx.send(ReloadTrigger::Signal).is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
pub async fn forward_reload_signals(_tx: mpsc::UnboundedSender<ReloadTrigger>) {}
