//! Qualified names.
//!
//! Equality and hashing consider the namespace URI and local part only; the
//! prefix is carried for serialization and display.

use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct QName {
    pub namespace: String,
    pub local: String,
    pub prefix: Option<String>,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
            prefix: None,
        }
    }

    /// A name in no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new("", local)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn has_namespace(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Clark-style `Q{uri}local` form.
    pub fn eqname(&self) -> String {
        format!("Q{{{}}}{}", self.namespace, self.local)
    }

    /// `prefix:local` when a prefix is known, otherwise the local part.
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(p) if !p.is_empty() => format!("{}:{}", p, self.local),
            _ => self.local.clone(),
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) if !p.is_empty() => write!(f, "{}:{}", p, self.local),
            _ if self.has_namespace() => write!(f, "{}", self.eqname()),
            _ => write!(f, "{}", self.local),
        }
    }
}
