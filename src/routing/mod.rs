//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! HttpRequest (application-relative path)
//!     → dispatcher.rs (scan handlers in declaration order)
//!     → matcher.rs (anchored regex match, numbered/named groups)
//!     → rewrite.rs (resource target from replacement string)
//!     → runtime (stages, component, error routing)
//!     → HttpResponse
//! ```
//!
//! # Design Decisions
//! - Patterns compiled once with the application, immutable at runtime
//! - Patterns match the whole path, never a prefix
//! - First match wins; no match is an explicit 404

pub mod dispatcher;
pub mod matcher;
pub mod rewrite;

pub use dispatcher::Dispatcher;
pub use matcher::{PathMatch, PathPattern, Segment};
pub use rewrite::Replacement;
