//! webapp-router
//!
//! Serves a repository of XML webapps, each described by a `webapp.toml`.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request
//!   ──────────────▶ http::server (axum, request id, trace, limits)
//!                        │
//!                        ▼
//!                   registry (Arc<Application> snapshot for /{app})
//!                        │
//!                        ▼
//!                   routing::Dispatcher (blocking worker)
//!                        │  match path → handler
//!                        │  filters in → component → filters out
//!                        │  component error → ErrorRouter
//!                        ▼
//!   Client Response ◀── response::ResponseEncoder (web:response → HTTP)
//!
//!   Cross-cutting: config, observability (tracing, Prometheus),
//!   lifecycle (SIGINT/SIGTERM shutdown, SIGHUP reload), admin API
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use webapp_router::admin::setup_admin_router;
use webapp_router::config::schema::ObservabilityConfig;
use webapp_router::config::watcher::next_batch;
use webapp_router::config::{load_config, RepositoryWatcher, ServerConfig};
use webapp_router::http::{AppState, HttpServer};
use webapp_router::lifecycle::{forward_reload_signals, shutdown_signal, Shutdown};
use webapp_router::model::ComponentRegistry;
use webapp_router::observability::{logging, metrics};
use webapp_router::registry::{compile_dir, Registry};

#[derive(Parser)]
#[command(name = "webapp-router", version, about = "Routing engine for XML webapps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve every webapp in the repository.
    Serve {
        /// Server configuration file (TOML). Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Compile webapp directories and report descriptor errors.
    Check {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Descriptor file name inside each directory.
        #[arg(long, default_value = "webapp.toml")]
        descriptor: String,

        /// Print one JSON object per webapp instead of text lines.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Serve { config } => serve(config.as_deref()).await,
        Command::Check {
            dirs,
            descriptor,
            json,
        } => check(&dirs, &descriptor, json),
    }
}

fn check(dirs: &[PathBuf], descriptor: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&ObservabilityConfig {
        log_level: "warn".to_string(),
        metrics_enabled: false,
        ..ObservabilityConfig::default()
    });

    // Components are bound at deploy time; checking validates structure only.
    let factory = ComponentRegistry::new().with_unbound_fallback();
    let mut failed = 0;
    for dir in dirs {
        let result = compile_dir(&factory, dir, descriptor);
        if result.is_err() {
            failed += 1;
        }
        if json {
            let line = match &result {
                Ok(app) => serde_json::json!({
                    "dir": dir.display().to_string(),
                    "name": app.name(),
                    "handlers": app.handlers().len(),
                    "wrappers": app.wrapper_names().count(),
                }),
                Err(e) => serde_json::json!({
                    "dir": dir.display().to_string(),
                    "error": e.to_string(),
                }),
            };
            println!("{}", line);
            continue;
        }
        match result {
            Ok(app) => println!(
                "ok     {} ({} handlers, {} wrappers)",
                app.name(),
                app.handlers().len(),
                app.wrapper_names().count()
            ),
            Err(e) => println!("error  {}: {}", dir.display(), e),
        }
    }
    if failed > 0 {
        return Err(format!("{} of {} webapps failed to compile", failed, dirs.len()).into());
    }
    Ok(())
}

async fn serve(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webapp-router starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        repository = %config.repository.path.display(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let factory = Arc::new(ComponentRegistry::new().with_unbound_fallback());
    let registry = Arc::new(Registry::new(
        factory,
        &config.repository.path,
        &config.repository.descriptor_file,
    ));
    let report = registry.reload()?;
    for failure in &report.failed {
        tracing::warn!(app = %failure.name, error = %failure.error, "Webapp not installed");
    }

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), registry.clone());
    let shutdown = Arc::new(Shutdown::new());

    // Reload loop: repository changes and SIGHUP.
    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    let _watcher = if config.repository.watch {
        Some(RepositoryWatcher::new(&config.repository.path, reload_tx.clone()).run()?)
    } else {
        None
    };
    tokio::spawn(forward_reload_signals(reload_tx));
    {
        let registry = registry.clone();
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                let batch = tokio::select! {
                    _ = stop.wait() => break,
                    batch = next_batch(&mut reload_rx, Duration::from_millis(500)) => batch,
                };
                let Some(batch) = batch else { break };
                tracing::info!(triggers = batch.len(), "Reloading webapps");
                let registry = registry.clone();
                match tokio::task::spawn_blocking(move || registry.reload()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "Reload failed"),
                    Err(e) => tracing::error!(error = %e, "Reload worker failed"),
                }
            }
        });
    }

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(state.clone());
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, router)
                .with_graceful_shutdown(async move { stop.wait().await })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let signal = {
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger();
        }
    };
    let mut server = tokio::spawn(HttpServer::new(state).run(listener, signal));

    let grace = Duration::from_secs(config.timeouts.shutdown_secs);
    let mut stop = shutdown.subscribe();
    tokio::select! {
        result = &mut server => result??,
        _ = async {
            stop.wait().await;
            tokio::time::sleep(grace).await;
        } => tracing::warn!(grace_secs = grace.as_secs(), "Shutdown deadline exceeded"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
