//! Error routing.
//!
//! # Responsibilities
//! - Pick the most specific error handler for a component error
//! - Re-invoke through the connector contract with an error source
//! - Report which handler recovered so unwinding resumes outside it
//!
//! # Design Decisions
//! - Specificity: exact name, then namespace wildcard, then local-name
//!   wildcard, then catch-all; ties go to the handler declared first
//! - One attempt only: a failing handler becomes a 500, never a second lookup
//! - No match propagates the original error as an unhandled failure

use std::rc::Rc;

use crate::error::{ComponentError, DispatchError, TransportError};
use crate::model::qname::QName;
use crate::model::wrapper::ErrorHandler;
use crate::observability::metrics;
use crate::runtime::connector::Connector;
use crate::runtime::context::RequestContext;
use crate::runtime::request::RequestView;

pub struct ErrorRouter;

impl ErrorRouter {
    pub fn select<'a>(candidates: &[&'a ErrorHandler], name: &QName) -> Option<&'a ErrorHandler> {
        candidates
            .iter()
            .copied()
            .filter(|h| h.catch.matches(name))
            .min_by_key(|h| (h.catch.specificity(), h.ordinal))
    }

    /// `candidates` are the guards enclosing the failure point. The handler's
    /// own filters sit outside its guard and are not re-run here.
    pub fn recover<'a>(
        candidates: &[&'a ErrorHandler],
        error: ComponentError,
        request: Rc<RequestView>,
        ctx: &mut RequestContext,
    ) -> Result<(&'a ErrorHandler, Connector), DispatchError> {
        let Some(handler) = Self::select(candidates, &error.name) else {
            tracing::warn!(
                request_id = ctx.request_id(),
                error = %error,
                candidates = candidates.len(),
                "No error handler matched"
            );
            return Err(DispatchError::Component(error));
        };

        let handler_name = handler.name.as_deref().unwrap_or("<anonymous>");
        tracing::info!(
            request_id = ctx.request_id(),
            handler = handler_name,
            catch = %handler.catch,
            error = %error.name,
            "Routing component error"
        );
        metrics::record_error_routed(handler_name);

        Connector::from_error(error, request)
            .invoke(handler.component.as_ref(), ctx)
            .map(|recovered| (handler, recovered))
            .map_err(|e| {
                tracing::error!(
                    request_id = ctx.request_id(),
                    handler = handler_name,
                    error = %e,
                    "Error in an error handler"
                );
                TransportError::internal("error in an error handler").into()
            })
    }
}
