//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, ErrorRouter, Registry produce:
//!     → tracing events (request_id, app, path, handler fields)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, plain or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every event of a request
//! - Metrics recording is cheap and safe without an installed recorder

pub mod logging;
pub mod metrics;
