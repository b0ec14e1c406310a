//! Compiled application model.
//!
//! # Data Flow
//! ```text
//! descriptor declarations
//!     → compiler (resolve names, build patterns, bind components)
//!     → Application { handlers, wrappers, config params }
//!     → shared as Arc<Application> by the registry
//!     → read concurrently by dispatch workers
//! ```
//!
//! # Design Decisions
//! - Wrapper and handler hierarchies are closed enums
//! - Nothing in the model is mutated after compilation
//! - Items are a small owned tree so components can be plain Rust closures

pub mod application;
pub mod component;
pub mod handler;
pub mod item;
pub mod qname;
pub mod wrapper;

pub use application::{Application, ConfigParam};
pub use component::{
    Component, ComponentFactory, ComponentInput, ComponentKind, ComponentRef, ComponentRegistry,
    ErrorInput, FnComponent,
};
pub use handler::{AddressHandler, Resource, Servlet};
pub use item::{Attribute, Element, Item, Node, Sequence};
pub use qname::QName;
pub use wrapper::{Chain, ErrorHandler, ErrorMatch, Filter, Layer, MiddlewarePlan, Stage, Wrapper};

/// Namespace of request and response descriptor elements.
pub const WEB_NS: &str = "http://expath.org/ns/webapp";
