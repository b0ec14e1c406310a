//! Declarative routing and middleware composition for XML webapps.
//!
//! A webapp descriptor declares servlets, static resources, filters, chains
//! and error handlers. The compiler turns it into an immutable
//! `Application`; the dispatcher matches request paths against it, runs the
//! middleware onion around the selected component, routes component errors,
//! and encodes the component's `web:response` into HTTP.

pub mod admin;
pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod registry;
pub mod response;
pub mod routing;
pub mod runtime;

pub use compiler::GraphCompiler;
pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use model::{Application, ComponentRegistry};
pub use registry::Registry;
pub use routing::Dispatcher;
