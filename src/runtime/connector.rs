//! Connectors: the single source of one invocation step.
//!
//! # Responsibilities
//! - Wrap exactly one source: request, error, computed sequence or static
//!   resource
//! - Connect that source to a component kind or to the response sink
//! - Refuse incompatible connections with a descriptive `TransportError`
//!
//! # Design Decisions
//! - Connecting borrows; invoking consumes and yields the next connector
//! - Request and error sources share one memoized `RequestView`

use std::path::{Path, PathBuf};
use std::rc::Rc;

use bytes::Bytes;

use crate::error::{ComponentError, DispatchError, TransportError};
use crate::model::component::{Component, ComponentInput, ComponentKind, ErrorInput};
use crate::model::item::Sequence;
use crate::response::{HttpResponse, ResponseEncoder};
use crate::runtime::context::RequestContext;
use crate::runtime::request::RequestView;

/// A file resolved by a resource handler.
#[derive(Debug, Clone)]
pub struct StaticResource {
    pub path: PathBuf,
    pub media_type: String,
    pub body: Bytes,
}

#[derive(Debug)]
enum Source {
    Request(Rc<RequestView>),
    Error {
        error: ComponentError,
        request: Rc<RequestView>,
    },
    Sequence(Sequence),
    Resource(StaticResource),
}

#[derive(Debug)]
pub struct Connector {
    source: Source,
}

impl Connector {
    pub fn from_request(view: Rc<RequestView>) -> Self {
        Self {
            source: Source::Request(view),
        }
    }

    pub fn from_error(error: ComponentError, request: Rc<RequestView>) -> Self {
        Self {
            source: Source::Error { error, request },
        }
    }

    pub fn from_sequence(sequence: Sequence) -> Self {
        Self {
            source: Source::Sequence(sequence),
        }
    }

    pub fn from_resource(resource: StaticResource) -> Self {
        Self {
            source: Source::Resource(resource),
        }
    }

    pub fn source_label(&self) -> &'static str {
        match self.source {
            Source::Request(_) => "request",
            Source::Error { .. } => "error",
            Source::Sequence(_) => "sequence",
            Source::Resource(_) => "resource",
        }
    }

    /// Build the input a component of `kind` receives from this source.
    pub fn connect(&self, kind: ComponentKind) -> Result<ComponentInput, TransportError> {
        let (input, error) = match &self.source {
            Source::Request(view) => (view.sequence()?.clone(), None),
            Source::Error { error, request } => (
                request.sequence()?.clone(),
                Some(ErrorInput {
                    name: error.name.clone(),
                    message: error.message.clone(),
                    data: error.data.clone(),
                }),
            ),
            Source::Sequence(sequence) => (sequence.clone(), None),
            Source::Resource(_) => {
                return Err(TransportError::internal(format!(
                    "Cannot connect a resource to a {} component",
                    kind
                )))
            }
        };

        let context = if kind.is_stylesheet() {
            match input.first() {
                Some(item) if item.is_document_or_element() => Some(item.clone()),
                _ => {
                    return Err(TransportError::internal(format!(
                        "The first item of a {} input must be a document or element node",
                        kind
                    )))
                }
            }
        } else {
            None
        };

        Ok(ComponentInput {
            kind,
            context,
            input,
            error,
        })
    }

    /// Run `component` on this source and return its output as the next source.
    pub fn invoke(
        self,
        component: &dyn Component,
        ctx: &mut RequestContext,
    ) -> Result<Connector, DispatchError> {
        let input = self.connect(component.kind())?;
        tracing::trace!(
            request_id = ctx.request_id(),
            source = self.source_label(),
            kind = %component.kind(),
            "Invoking component"
        );
        let output = component.invoke(input, ctx)?;
        Ok(Connector::from_sequence(output))
    }

    /// Connect to the response sink.
    pub fn into_response(
        self,
        encoder: &ResponseEncoder,
        base_dir: Option<&Path>,
    ) -> Result<HttpResponse, DispatchError> {
        match self.source {
            Source::Request(_) => Err(TransportError::internal(
                "A request cannot be connected to the response",
            )
            .into()),
            Source::Error { .. } => Err(TransportError::internal(
                "An error cannot be connected to the response",
            )
            .into()),
            Source::Sequence(sequence) => Ok(encoder.encode(sequence, base_dir)?),
            Source::Resource(resource) => {
                let mut response = HttpResponse::new(200);
                response
                    .headers
                    .push(("Content-Type".to_string(), resource.media_type));
                response.body = resource.body;
                Ok(response)
            }
        }
    }
}
