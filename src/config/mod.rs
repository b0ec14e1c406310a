//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On repository change or SIGHUP:
//!     watcher.rs emits ReloadTrigger
//!     → Registry::reload (recompile webapps)
//!     → atomic swap of the application map
//! ```
//!
//! # Design Decisions
//! - Server config is immutable once loaded; webapps reload independently
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, ListenerConfig, ObservabilityConfig, RepositoryConfig, SecurityConfig,
    ServerConfig, TimeoutConfig,
};
pub use watcher::{ReloadTrigger, RepositoryWatcher};
