//! Admin API.
//!
//! Served on its own listener (`admin.bind_address`), every route behind
//! bearer authentication.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/webapps", get(list_webapps))
        .route("/admin/webapps/reload", post(reload_webapps))
        .route("/admin/webapps/{name}", delete(delete_webapp))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
