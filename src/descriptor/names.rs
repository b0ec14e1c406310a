//! Namespace bindings and lexical name parsing.

use std::collections::HashMap;

use crate::error::CompileError;
use crate::model::wrapper::ErrorMatch;
use crate::model::{QName, WEB_NS};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix → namespace URI bindings in effect for a descriptor.
#[derive(Debug, Clone)]
pub struct Namespaces {
    bindings: HashMap<String, String>,
}

impl Default for Namespaces {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert("web".to_string(), WEB_NS.to_string());
        bindings.insert("xml".to_string(), XML_NS.to_string());
        Self { bindings }
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn check_ncname(lexical: &str, part: &str) -> Result<(), CompileError> {
    let valid = !part.is_empty()
        && !part.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.')
        && part
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}'));
    if valid {
        Ok(())
    } else {
        Err(invalid(lexical, format!("{:?} is not a valid name part", part)))
    }
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, prefix: &str, uri: &str) -> Result<(), CompileError> {
        check_ncname(prefix, prefix)?;
        if prefix == "xml" || prefix == "xmlns" {
            return Err(invalid(prefix, "reserved prefix"));
        }
        self.bindings.insert(prefix.to_string(), uri.to_string());
        Ok(())
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    /// Parse `local`, `prefix:local` or `Q{uri}local`.
    pub fn parse_qname(&self, lexical: &str) -> Result<QName, CompileError> {
        let lexical = lexical.trim();
        if let Some(rest) = lexical.strip_prefix("Q{") {
            let (uri, local) = rest
                .split_once('}')
                .ok_or_else(|| invalid(lexical, "unterminated Q{...}"))?;
            check_ncname(lexical, local)?;
            return Ok(QName::new(uri, local));
        }
        match lexical.split_once(':') {
            Some((prefix, local)) => {
                check_ncname(lexical, prefix)?;
                check_ncname(lexical, local)?;
                let uri = self
                    .resolve(prefix)
                    .ok_or_else(|| invalid(lexical, format!("undeclared prefix '{}'", prefix)))?;
                Ok(QName::new(uri, local).with_prefix(prefix))
            }
            None => {
                check_ncname(lexical, lexical)?;
                Ok(QName::local(lexical))
            }
        }
    }

    /// Parse an error handler `catch` expression.
    pub fn parse_catch(&self, catch: &str) -> Result<ErrorMatch, CompileError> {
        let catch = catch.trim();
        if catch == "*" {
            return Ok(ErrorMatch::Any);
        }
        if let Some(local) = catch.strip_prefix("*:") {
            check_ncname(catch, local)?;
            return Ok(ErrorMatch::Local(local.to_string()));
        }
        if let Some(uri) = catch
            .strip_prefix("Q{")
            .and_then(|rest| rest.strip_suffix("}*"))
        {
            return Ok(ErrorMatch::Namespace(uri.to_string()));
        }
        if let Some(prefix) = catch.strip_suffix(":*") {
            let uri = self
                .resolve(prefix)
                .ok_or_else(|| invalid(catch, format!("undeclared prefix '{}'", prefix)))?;
            return Ok(ErrorMatch::Namespace(uri.to_string()));
        }
        self.parse_qname(catch).map(ErrorMatch::Exact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespaces() -> Namespaces {
        let mut ns = Namespaces::new();
        ns.bind("app", "urn:app").unwrap();
        ns
    }

    #[test]
    fn test_parse_prefixed_and_eqname() {
        let ns = namespaces();
        assert_eq!(ns.parse_qname("app:main").unwrap(), QName::new("urn:app", "main"));
        assert_eq!(ns.parse_qname("Q{urn:x}f").unwrap(), QName::new("urn:x", "f"));
        assert_eq!(ns.parse_qname("plain").unwrap(), QName::local("plain"));
    }

    #[test]
    fn test_undeclared_prefix() {
        assert!(matches!(
            namespaces().parse_qname("nope:f"),
            Err(CompileError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_parse_catch_forms() {
        let ns = namespaces();
        assert_eq!(ns.parse_catch("*").unwrap(), ErrorMatch::Any);
        assert_eq!(ns.parse_catch("*:oops").unwrap(), ErrorMatch::Local("oops".into()));
        assert_eq!(ns.parse_catch("app:*").unwrap(), ErrorMatch::Namespace("urn:app".into()));
        assert_eq!(
            ns.parse_catch("app:oops").unwrap(),
            ErrorMatch::Exact(QName::new("urn:app", "oops"))
        );
    }

    #[test]
    fn test_reserved_prefix() {
        assert!(Namespaces::new().bind("xml", "urn:x").is_err());
    }
}
