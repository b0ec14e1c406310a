//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers: request id, trace, body limit, timeout)
//!     → request.rs (split /{app}/{path}, build HttpRequest)
//!     → Registry::get(app) → Dispatcher::dispatch on a blocking worker
//!     → response.rs (HttpResponse → axum Response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
