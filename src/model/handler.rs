//! Address handlers: what a matched path is routed to.

use std::sync::Arc;

use crate::model::component::Component;
use crate::model::wrapper::Wrapper;
use crate::routing::matcher::PathPattern;
use crate::routing::rewrite::Replacement;

#[derive(Debug)]
pub enum AddressHandler {
    Servlet(Servlet),
    Resource(Resource),
}

#[derive(Debug)]
pub struct Servlet {
    pub name: String,
    pub pattern: PathPattern,
    /// Filter names declared on the servlet itself.
    pub filters: Vec<String>,
    /// Effective wrapper: application, group and own filters combined.
    pub wrapper: Option<Arc<Wrapper>>,
    pub component: Arc<dyn Component>,
}

#[derive(Debug)]
pub struct Resource {
    pub pattern: PathPattern,
    pub filters: Vec<String>,
    pub wrapper: Option<Arc<Wrapper>>,
    pub rewrite: Option<Replacement>,
    pub media_type: String,
}

impl AddressHandler {
    pub fn pattern(&self) -> &PathPattern {
        match self {
            AddressHandler::Servlet(s) => &s.pattern,
            AddressHandler::Resource(r) => &r.pattern,
        }
    }

    pub fn wrapper(&self) -> Option<&Wrapper> {
        match self {
            AddressHandler::Servlet(s) => s.wrapper.as_deref(),
            AddressHandler::Resource(r) => r.wrapper.as_deref(),
        }
    }

    /// Servlet name, or the resource pattern.
    pub fn label(&self) -> &str {
        match self {
            AddressHandler::Servlet(s) => &s.name,
            AddressHandler::Resource(r) => r.pattern.source(),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            AddressHandler::Servlet(_) => "servlet",
            AddressHandler::Resource(_) => "resource",
        }
    }
}
