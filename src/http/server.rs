//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Bind server to listener
//! - Hand each request to the dispatcher on a blocking worker
//! - Render the welcome page

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::error::{DispatchError, TechnicalError};
use crate::http::request::{
    propagate_request_id_layer, request_id, set_request_id_layer, split_mount, to_http_request,
};
use crate::registry::Registry;
use crate::routing::Dispatcher;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<ServerConfig>,
    /// Bounds requests being dispatched at once.
    pub workers: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>, registry: Arc<Registry>) -> Self {
        let dispatcher =
            Dispatcher::new().expose_error_details(config.security.expose_error_details);
        Self {
            registry,
            dispatcher: Arc::new(dispatcher),
            workers: Arc::new(Semaphore::new(config.listener.max_connections)),
            config,
        }
    }
}

/// HTTP server for installed webapps.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(state: AppState) -> Self {
        let router = Self::build_router(state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let timeout = Duration::from_secs(state.config.timeouts.request_secs);
        let body_limit = state.config.security.max_body_size;
        Router::new()
            .route("/", get(welcome_handler))
            .route("/{app}", any(dispatch_handler))
            .route("/{app}/", any(dispatch_handler))
            .route("/{app}/{*path}", any(dispatch_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn welcome_handler(State(state): State<AppState>) -> Html<String> {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html><head><title>Webapps</title></head><body>\n<h1>Installed webapps</h1>\n",
    );
    let apps = state.registry.list();
    if apps.is_empty() {
        page.push_str("<p>No webapp is installed.</p>\n");
    } else {
        page.push_str("<ul>\n");
        for app in apps {
            let name = escape_html(app.name());
            let title = app.title().map(escape_html).unwrap_or_else(|| name.clone());
            page.push_str(&format!("<li><a href=\"/{name}/\">{title}</a></li>\n"));
        }
        page.push_str("</ul>\n");
    }
    page.push_str("</body></html>\n");
    Html(page)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Dispatch `/{app}/{path}` to the installed application.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts);

    let Some((app_name, path)) = split_mount(parts.uri.path()) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };
    let Some(app) = state.registry.get(app_name) else {
        tracing::debug!(request_id = %request_id, app = app_name, "No such webapp");
        return (StatusCode::NOT_FOUND, format!("No webapp named {}", app_name)).into_response();
    };

    let body = match axum::body::to_bytes(body, state.config.security.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Request body rejected");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };
    let http_request = to_http_request(&parts, app.name(), path, body);

    let Ok(permit) = state.workers.clone().acquire_owned().await else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
    };
    let dispatcher = state.dispatcher.clone();
    let worker_id = request_id.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        dispatcher.dispatch(app, http_request, &worker_id)
    })
    .await;

    match outcome {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Dispatch worker failed");
            DispatchError::from(TechnicalError::Worker(e.to_string()))
                .into_response(state.config.security.expose_error_details)
                .into_response()
        }
    }
}
