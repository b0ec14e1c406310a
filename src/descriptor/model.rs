//! Declarations produced by descriptor loaders.

use crate::descriptor::names::Namespaces;
use crate::error::CompileError;
use crate::model::component::ComponentRef;

/// One element of the ordered declaration stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Namespace {
        prefix: String,
        uri: String,
    },
    Title(String),
    ApplicationFilters(Vec<String>),
    ConfigParam(ConfigParamDecl),
    GroupOpen {
        filters: Vec<String>,
    },
    GroupClose,
    Filter {
        name: String,
        input: Option<ComponentDecl>,
        output: Option<ComponentDecl>,
    },
    Chain {
        name: String,
        filters: Vec<String>,
    },
    Error {
        name: String,
        catch: String,
        component: ComponentDecl,
        filters: Vec<String>,
    },
    Servlet {
        name: String,
        filters: Vec<String>,
        component: ComponentDecl,
        pattern: String,
        groups: Vec<MatchGroup>,
    },
    Resource {
        pattern: String,
        rewrite: Option<String>,
        media_type: String,
        filters: Vec<String>,
    },
    /// An element no loader rule knows; rejected by the compiler.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroup {
    pub number: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigParamDecl {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub value: Option<String>,
    pub uri: Option<String>,
}

/// Implementation descriptor of a component, as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentDecl {
    pub language: String,
    pub uri: Option<String>,
    pub function: Option<String>,
    pub template: Option<String>,
    pub step: Option<String>,
}

impl ComponentDecl {
    pub fn new(language: &str, uri: &str) -> Self {
        Self {
            language: language.to_string(),
            uri: Some(uri.to_string()),
            ..Self::default()
        }
    }

    pub fn function(mut self, name: &str) -> Self {
        self.function = Some(name.to_string());
        self
    }

    pub fn template(mut self, name: &str) -> Self {
        self.template = Some(name.to_string());
        self
    }

    pub fn step(mut self, name: &str) -> Self {
        self.step = Some(name.to_string());
        self
    }

    /// Validate the shape and produce the component identity.
    pub fn to_ref(&self, namespaces: &Namespaces) -> Result<ComponentRef, CompileError> {
        let allowed: &[&str] = match self.language.as_str() {
            "xquery" => &["function"],
            "xslt" => &["function", "template"],
            "xproc" => &["step"],
            other => {
                return Err(CompileError::UnknownElement(format!(
                    "component language '{}'",
                    other
                )))
            }
        };

        let names: Vec<(&str, &str)> = [
            ("function", &self.function),
            ("template", &self.template),
            ("step", &self.step),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect();

        let conflict = |detail: String| CompileError::ConflictingFields {
            language: self.language.clone(),
            detail,
        };
        if names.len() > 1 {
            let fields: Vec<_> = names.iter().map(|(f, _)| *f).collect();
            return Err(conflict(format!("{} cannot be combined", fields.join(" and "))));
        }
        if let Some((field, _)) = names.first() {
            if !allowed.contains(field) {
                return Err(conflict(format!("{} is not valid here", field)));
            }
        }

        let uri = self
            .uri
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| CompileError::MissingField {
                language: self.language.clone(),
                field: "uri",
            })?;
        let name = names
            .first()
            .map(|(_, lexical)| namespaces.parse_qname(lexical))
            .transpose()?;

        Ok(match (self.language.as_str(), name) {
            ("xquery", Some(f)) => ComponentRef::query_function(uri, f),
            ("xquery", None) => ComponentRef::query_module(uri),
            ("xslt", Some(t)) => ComponentRef::transform_component(uri, t),
            ("xslt", None) => ComponentRef::transform_document(uri),
            (_, step) => ComponentRef::pipeline(uri, step),
        })
    }
}
