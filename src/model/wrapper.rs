//! Wrappers: filters, chains and error handlers.
//!
//! # Responsibilities
//! - Closed sum type over the three wrapper variants
//! - Flatten a wrapper into an explicit stage plan for the onion runner
//! - Error-match specificity ranking
//!
//! # Design Decisions
//! - Wrappers are shared as `Arc<Wrapper>`; the compiler hands out the same
//!   instance for every reference to a name
//! - Flattening replaces recursive wrapping: a chain contributes its members'
//!   layers in order; an error handler contributes its own filters, then a
//!   guard marking the region it protects (everything after it)

use std::fmt;
use std::sync::Arc;

use crate::error::CompileError;
use crate::model::component::Component;
use crate::model::qname::QName;

#[derive(Debug)]
pub enum Wrapper {
    Filter(Filter),
    Chain(Chain),
    ErrorHandler(ErrorHandler),
}

#[derive(Debug)]
pub struct Filter {
    pub name: Option<String>,
    pub input: Option<Arc<dyn Component>>,
    pub output: Option<Arc<dyn Component>>,
}

impl Filter {
    pub fn new(
        name: Option<String>,
        input: Option<Arc<dyn Component>>,
        output: Option<Arc<dyn Component>>,
    ) -> Result<Self, CompileError> {
        if input.is_none() && output.is_none() {
            return Err(CompileError::EmptyFilter(
                name.unwrap_or_else(|| "<anonymous>".to_string()),
            ));
        }
        Ok(Self { name, input, output })
    }
}

#[derive(Debug)]
pub struct Chain {
    pub name: Option<String>,
    pub members: Vec<Arc<Wrapper>>,
}

#[derive(Debug)]
pub struct ErrorHandler {
    pub name: Option<String>,
    pub catch: ErrorMatch,
    pub component: Arc<dyn Component>,
    /// Built from the handler's own filter references; wraps the guard on
    /// the normal path.
    pub wrapper: Option<Arc<Wrapper>>,
    /// Declaration position, used to break specificity ties.
    pub ordinal: usize,
}

/// Which error names an error handler catches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorMatch {
    Exact(QName),
    /// `prefix:*`
    Namespace(String),
    /// `*:local`
    Local(String),
    /// `*`
    Any,
}

impl ErrorMatch {
    pub fn matches(&self, name: &QName) -> bool {
        match self {
            ErrorMatch::Exact(q) => q == name,
            ErrorMatch::Namespace(ns) => &name.namespace == ns,
            ErrorMatch::Local(local) => &name.local == local,
            ErrorMatch::Any => true,
        }
    }

    /// Lower is more specific.
    pub fn specificity(&self) -> u8 {
        match self {
            ErrorMatch::Exact(_) => 0,
            ErrorMatch::Namespace(_) => 1,
            ErrorMatch::Local(_) => 2,
            ErrorMatch::Any => 3,
        }
    }
}

impl fmt::Display for ErrorMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMatch::Exact(q) => write!(f, "{}", q.eqname()),
            ErrorMatch::Namespace(ns) => write!(f, "Q{{{}}}*", ns),
            ErrorMatch::Local(local) => write!(f, "*:{}", local),
            ErrorMatch::Any => f.write_str("*"),
        }
    }
}

/// One (pre, post) pair of the onion.
#[derive(Debug, Clone, Copy)]
pub struct Stage<'a> {
    pub filter: &'a Filter,
}

impl<'a> Stage<'a> {
    pub fn label(&self) -> &'a str {
        self.filter.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// One level of the flattened onion, outermost first.
#[derive(Debug, Clone, Copy)]
pub enum Layer<'a> {
    Stage(Stage<'a>),
    /// Catches component errors raised by any later layer or the target.
    Guard(&'a ErrorHandler),
}

/// A wrapper flattened for execution.
#[derive(Debug, Default)]
pub struct MiddlewarePlan<'a> {
    /// Outermost first.
    pub layers: Vec<Layer<'a>>,
}

impl<'a> MiddlewarePlan<'a> {
    pub fn of(wrapper: Option<&'a Wrapper>) -> Self {
        let mut plan = Self::default();
        if let Some(w) = wrapper {
            w.flatten_into(&mut plan);
        }
        plan
    }

    pub fn stages(&self) -> impl Iterator<Item = &Stage<'a>> + '_ {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Stage(stage) => Some(stage),
            Layer::Guard(_) => None,
        })
    }

    /// Error handlers in declaration order.
    pub fn error_handlers(&self) -> impl Iterator<Item = &'a ErrorHandler> + '_ {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Guard(handler) => Some(*handler),
            Layer::Stage(_) => None,
        })
    }
}

impl Wrapper {
    pub fn name(&self) -> Option<&str> {
        match self {
            Wrapper::Filter(f) => f.name.as_deref(),
            Wrapper::Chain(c) => c.name.as_deref(),
            Wrapper::ErrorHandler(e) => e.name.as_deref(),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Wrapper::Filter(_) => "filter",
            Wrapper::Chain(_) => "chain",
            Wrapper::ErrorHandler(_) => "error",
        }
    }

    pub fn plan(&self) -> MiddlewarePlan<'_> {
        MiddlewarePlan::of(Some(self))
    }

    fn flatten_into<'a>(&'a self, plan: &mut MiddlewarePlan<'a>) {
        match self {
            Wrapper::Filter(filter) => plan.layers.push(Layer::Stage(Stage { filter })),
            Wrapper::Chain(chain) => {
                for member in &chain.members {
                    member.flatten_into(plan);
                }
            }
            Wrapper::ErrorHandler(handler) => {
                if let Some(own) = &handler.wrapper {
                    own.flatten_into(plan);
                }
                plan.layers.push(Layer::Guard(handler));
            }
        }
    }
}
