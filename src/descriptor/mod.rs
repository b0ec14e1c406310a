//! Application descriptors.
//!
//! # Data Flow
//! ```text
//! webapp.toml
//!     → file.rs (deserialize, flatten groups)
//!     → Vec<Declaration> (ordered stream)
//!     → compiler
//! ```
//!
//! # Design Decisions
//! - The compiler only sees the declaration stream, never the file format
//! - Lexical QNames resolve through explicit `[namespaces]` bindings
//! - Unknown item kinds travel as `Declaration::Unknown` so rejection happens
//!   in one place, during compilation

pub mod file;
pub mod model;
pub mod names;

pub use file::{load_descriptor, parse_descriptor, DescriptorFile};
pub use model::{ComponentDecl, ConfigParamDecl, Declaration, MatchGroup};
pub use names::Namespaces;
