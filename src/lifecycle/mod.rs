//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight requests →
//!     stop reload loop → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → ReloadTrigger::Signal → Registry::reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config, logging, repository load, then listeners
//! - Shutdown has timeout: forced exit after `timeouts.shutdown_secs`

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::{forward_reload_signals, shutdown_signal};
