//! Error taxonomy for the routing engine.
//!
//! # Kinds
//! - `CompileError`: malformed descriptor, aborts the whole load
//! - `ComponentError`: typed failure raised by a component, routed once
//! - `TransportError`: surfaced to the client as status + message
//! - `TechnicalError`: I/O or invariant failure, detail hidden from clients
//!
//! `DispatchError` is the union the dispatcher works with; it always turns
//! into an `HttpResponse` and never escapes as a panic.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::item::Sequence;
use crate::model::qname::QName;
use crate::response::HttpResponse;

/// Result alias used by the compiler and descriptor loader.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors raised while turning a descriptor into an `Application`.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("undefined wrapper reference: {0}")]
    UndefinedName(String),

    #[error("wrapper '{0}' refers to itself")]
    Cycle(String),

    #[error("filter '{0}' has neither an in nor an out component")]
    EmptyFilter(String),

    #[error("unknown declaration element: {0}")]
    UnknownElement(String),

    #[error("missing identifying field on {language} component: {field}")]
    MissingField { language: String, field: &'static str },

    #[error("conflicting fields on {language} component: {detail}")]
    ConflictingFields { language: String, detail: String },

    #[error("no component bound to {0}")]
    UnknownComponent(String),

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("unbalanced group declarations")]
    UnbalancedGroup,

    #[error("{0}")]
    Invalid(String),

    #[error("cannot read descriptor {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse descriptor: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A typed failure raised by a component.
#[derive(Debug, Clone)]
pub struct ComponentError {
    pub name: QName,
    pub message: String,
    pub data: Sequence,
}

impl ComponentError {
    pub fn new(name: QName, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
            data: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: Sequence) -> Self {
        self.data = data;
        self
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ComponentError {}

/// A failure that maps directly onto an HTTP status.
#[derive(Debug, Clone, Error)]
#[error("{status} {message}")]
pub struct TransportError {
    pub status: u16,
    pub message: String,
    pub headers: Vec<(String, String)>,
}

impl TransportError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            headers: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn method_not_allowed(allow: &str) -> Self {
        let mut err = Self::new(405, "Method not allowed");
        err.headers.push(("Allow".to_string(), allow.to_string()));
        err
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(501, message)
    }
}

/// Internal failures whose details never reach the client.
#[derive(Debug, Error)]
pub enum TechnicalError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("dispatch worker failed: {0}")]
    Worker(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Everything that can end a dispatch without a normal response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unhandled component error: {0}")]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Technical(#[from] TechnicalError),
}

impl DispatchError {
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::Transport(e) => e.status,
            DispatchError::Component(_) | DispatchError::Technical(_) => 500,
        }
    }

    /// Render as a plain-text response. Component and technical details are
    /// only included when `expose_details` is set.
    pub fn into_response(self, expose_details: bool) -> HttpResponse {
        match self {
            DispatchError::Transport(e) => {
                let mut response = HttpResponse::text(e.status, &e.message);
                response.message = Some(e.message);
                response.headers.extend(e.headers);
                response
            }
            DispatchError::Component(e) => {
                let body = if expose_details {
                    format!("Unhandled error {}: {}", e.name, e.message)
                } else {
                    "Internal error".to_string()
                };
                HttpResponse::text(500, &body)
            }
            DispatchError::Technical(e) => {
                let body = if expose_details {
                    e.to_string()
                } else {
                    "Internal error".to_string()
                };
                HttpResponse::text(500, &body)
            }
        }
    }
}
