use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::model::handler::AddressHandler;
use crate::registry::ReloadReport;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub webapps: usize,
}

#[derive(Serialize)]
pub struct WebappSummary {
    pub name: String,
    pub title: Option<String>,
    pub servlets: usize,
    pub resources: usize,
    pub wrappers: Vec<String>,
}

#[derive(Serialize)]
pub struct AdminError {
    pub error: String,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        webapps: state.registry.len(),
    })
}

pub async fn list_webapps(State(state): State<AppState>) -> Json<Vec<WebappSummary>> {
    let summaries = state
        .registry
        .list()
        .iter()
        .map(|app| {
            let servlets = app
                .handlers()
                .iter()
                .filter(|h| matches!(h, AddressHandler::Servlet(_)))
                .count();
            let mut wrappers: Vec<String> = app.wrapper_names().map(String::from).collect();
            wrappers.sort();
            WebappSummary {
                name: app.name().to_string(),
                title: app.title().map(String::from),
                servlets,
                resources: app.handlers().len() - servlets,
                wrappers,
            }
        })
        .collect();
    Json(summaries)
}

pub async fn reload_webapps(State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    match tokio::task::spawn_blocking(move || registry.reload()).await {
        Ok(Ok(report)) => Json::<ReloadReport>(report).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Admin reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AdminError { error: e.to_string() }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Admin reload worker failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn delete_webapp(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.remove(&name) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(AdminError {
                error: format!("No webapp named {}", name),
            }),
        )
            .into_response(),
    }
}
