//! Request dispatch.
//!
//! # Responsibilities
//! - Select the first address handler whose pattern matches the path
//! - Bind named groups and build the request view
//! - Run the handler's middleware plan around its target
//! - Route component errors to error handlers
//! - Turn every outcome, success or failure, into an `HttpResponse`
//!
//! # Design Decisions
//! - Synchronous: one worker owns a request from match to encoding
//! - Handlers are tried in declaration order; first match wins
//! - Resources answer GET only and never leave the application directory

use std::path::{Component as PathComponent, Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use crate::error::{DispatchError, TransportError};
use crate::model::application::Application;
use crate::model::handler::{AddressHandler, Resource, Servlet};
use crate::model::wrapper::MiddlewarePlan;
use crate::observability::metrics;
use crate::response::{HttpResponse, ResponseEncoder};
use crate::routing::matcher::PathMatch;
use crate::runtime::connector::{Connector, StaticResource};
use crate::runtime::context::RequestContext;
use crate::runtime::error_router::ErrorRouter;
use crate::runtime::pipeline::run_layers;
use crate::runtime::request::{HttpRequest, PathPart, RequestView};

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    encoder: ResponseEncoder,
    expose_errors: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include unhandled error details in 500 bodies.
    pub fn expose_error_details(mut self, expose: bool) -> Self {
        self.expose_errors = expose;
        self
    }

    /// First handler, in declaration order, matching `path`.
    pub fn find_handler<'a>(
        app: &'a Application,
        path: &'a str,
    ) -> Option<(&'a AddressHandler, PathMatch<'a>)> {
        app.handlers()
            .iter()
            .find_map(|h| h.pattern().match_path(path).map(|m| (h, m)))
    }

    /// Dispatch one request. Never fails: errors become error responses.
    pub fn dispatch(
        &self,
        app: Arc<Application>,
        request: HttpRequest,
        request_id: &str,
    ) -> HttpResponse {
        let start = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();
        let app_name = app.name().to_string();

        let response = match self.try_dispatch(app, request, request_id) {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    DispatchError::Transport(t) if t.status < 500 => tracing::debug!(
                        request_id,
                        app = %app_name,
                        path = %path,
                        status = t.status,
                        reason = %t.message,
                        "Request rejected"
                    ),
                    DispatchError::Component(c) => tracing::error!(
                        request_id,
                        app = %app_name,
                        path = %path,
                        error = %c,
                        "Unhandled component error"
                    ),
                    other => tracing::error!(
                        request_id,
                        app = %app_name,
                        path = %path,
                        error = %other,
                        "Request failed"
                    ),
                }
                e.into_response(self.expose_errors)
            }
        };

        metrics::record_request(&app_name, &method, response.status, start);
        tracing::info!(
            request_id,
            app = %app_name,
            method = %method,
            path = %path,
            status = response.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request dispatched"
        );
        response
    }

    pub fn try_dispatch(
        &self,
        app: Arc<Application>,
        request: HttpRequest,
        request_id: &str,
    ) -> Result<HttpResponse, DispatchError> {
        let mut ctx = RequestContext::new(request_id, app.clone());
        let path = request.path.clone();

        let (handler, matched) = Self::find_handler(&app, &path).ok_or_else(|| {
            TransportError::not_found(format!("No handler matches {}", path))
        })?;
        tracing::debug!(
            request_id,
            handler = handler.label(),
            kind = handler.kind_label(),
            "Handler matched"
        );

        ctx.bind_params(
            matched
                .named()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        );
        let parts = PathPart::collect(&matched);

        match handler {
            AddressHandler::Servlet(servlet) => {
                self.run_servlet(&app, servlet, request, parts, &mut ctx)
            }
            AddressHandler::Resource(resource) => {
                self.run_resource(&app, resource, request, &matched, parts, &mut ctx)
            }
        }
    }

    fn run_servlet(
        &self,
        app: &Application,
        servlet: &Servlet,
        request: HttpRequest,
        parts: Vec<PathPart>,
        ctx: &mut RequestContext,
    ) -> Result<HttpResponse, DispatchError> {
        let view = Rc::new(RequestView::new(request, Some(servlet.name.clone()), parts));
        let plan = MiddlewarePlan::of(servlet.wrapper.as_deref());
        let output = Self::run_plan(app, &plan, view, ctx, |conn, ctx| {
            conn.invoke(servlet.component.as_ref(), ctx)
        })?;
        output.into_response(&self.encoder, app.base_dir())
    }

    fn run_resource(
        &self,
        app: &Application,
        resource: &Resource,
        request: HttpRequest,
        matched: &PathMatch<'_>,
        parts: Vec<PathPart>,
        ctx: &mut RequestContext,
    ) -> Result<HttpResponse, DispatchError> {
        if request.method != "GET" {
            return Err(TransportError::method_not_allowed("GET").into());
        }
        let target = match &resource.rewrite {
            Some(rewrite) => rewrite.apply(&resource.pattern, matched.path()).ok_or_else(|| {
                TransportError::internal(format!("Rewrite did not apply to {}", matched.path()))
            })?,
            None => matched.path().to_string(),
        };
        let file = resolve_resource(app.base_dir(), &target)?;

        let view = Rc::new(RequestView::new(request, None, parts));
        let plan = MiddlewarePlan::of(resource.wrapper.as_deref());
        let output = Self::run_plan(app, &plan, view, ctx, |_discarded, ctx| {
            tracing::debug!(
                request_id = ctx.request_id(),
                file = %file.display(),
                "Serving resource"
            );
            Ok(Connector::from_resource(read_resource(file, &resource.media_type)?))
        })?;
        output.into_response(&self.encoder, app.base_dir())
    }

    fn run_plan<F>(
        app: &Application,
        plan: &MiddlewarePlan<'_>,
        view: Rc<RequestView>,
        ctx: &mut RequestContext,
        target: F,
    ) -> Result<Connector, DispatchError>
    where
        F: FnOnce(Connector, &mut RequestContext) -> Result<Connector, DispatchError>,
    {
        let source = Connector::from_request(view.clone());
        run_layers(&plan.layers, source, ctx, target, |candidates, error, ctx| {
            metrics::record_component_error(app.name(), &error.name);
            ErrorRouter::recover(candidates, error, view.clone(), ctx)
        })
    }
}

/// Map a rewritten resource path to a file below `base_dir`.
fn resolve_resource(base_dir: Option<&Path>, target: &str) -> Result<PathBuf, TransportError> {
    let not_found = || TransportError::not_found(format!("Resource not found: {}", target));
    let base = base_dir.ok_or_else(not_found)?;
    let relative = Path::new(target.trim_start_matches('/'));
    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, PathComponent::Normal(_)))
    {
        return Err(not_found());
    }
    Ok(base.join(relative))
}

fn read_resource(path: PathBuf, media_type: &str) -> Result<StaticResource, TransportError> {
    if !path.is_file() {
        return Err(TransportError::not_found(format!(
            "Resource not found: {}",
            path.display()
        )));
    }
    let body = std::fs::read(&path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Failed to read resource");
        TransportError::internal("Cannot read resource")
    })?;
    Ok(StaticResource {
        path,
        media_type: media_type.to_string(),
        body: Bytes::from(body),
    })
}
