//! Per-request execution.
//!
//! # Data Flow
//! ```text
//! HttpRequest
//!     → RequestView (lazy web:request + body items)
//!     → Connector::from_request
//!     → pipeline.rs (pre stages → target → post stages)
//!     → Connector (computed sequence)
//!     → ResponseEncoder
//!
//! On ComponentError:
//!     → error_router.rs (select handler)
//!     → Connector::from_error → handler component
//!     → ResponseEncoder
//! ```
//!
//! # Design Decisions
//! - Everything here is synchronous and owned by one worker
//! - Request-scoped state lives in `RequestContext`, passed explicitly

pub mod connector;
pub mod context;
pub mod error_router;
pub mod pipeline;
pub mod request;

pub use connector::{Connector, StaticResource};
pub use context::RequestContext;
pub use error_router::ErrorRouter;
pub use request::{HttpRequest, PathPart, RequestView};
