//! TOML descriptor loading.
//!
//! # Format
//! ```toml
//! name = "hello"
//! title = "Hello World"
//! filters = ["log"]
//!
//! [namespaces]
//! app = "urn:example:app"
//!
//! [[config-param]]
//! id = "greeting"
//! value = "Hi"
//!
//! [[items]]
//! kind = "filter"
//! name = "log"
//! in = { language = "xquery", uri = "log.xq", function = "app:log" }
//!
//! [[items]]
//! kind = "group"
//! filters = ["auth"]
//!
//!   [[items.items]]
//!   kind = "servlet"
//!   name = "item"
//!   pattern = "/items/([0-9]+)"
//!   component = { language = "xquery", uri = "items.xq", function = "app:get" }
//!   match = [{ group = 1, name = "id" }]
//! ```
//!
//! Item order is significant: handlers are matched in declaration order and
//! nested groups scope their filters over the items they contain.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::descriptor::model::{ComponentDecl, ConfigParamDecl, Declaration, MatchGroup};
use crate::error::CompileError;

/// A loaded descriptor: optional declared name plus the declaration stream.
#[derive(Debug, Clone)]
pub struct DescriptorFile {
    pub name: Option<String>,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct RawDescriptor {
    name: Option<String>,
    title: Option<String>,
    filters: Vec<String>,
    namespaces: BTreeMap<String, String>,
    config_param: Vec<RawConfigParam>,
    items: Vec<RawItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfigParam {
    id: String,
    name: Option<String>,
    description: Option<String>,
    value: Option<String>,
    uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct RawItem {
    kind: String,
    name: Option<String>,
    filters: Vec<String>,
    #[serde(rename = "in")]
    input: Option<RawComponent>,
    #[serde(rename = "out")]
    output: Option<RawComponent>,
    catch: Option<String>,
    component: Option<RawComponent>,
    pattern: Option<String>,
    #[serde(rename = "match")]
    matches: Vec<RawMatch>,
    rewrite: Option<String>,
    media_type: Option<String>,
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawComponent {
    language: String,
    uri: Option<String>,
    function: Option<String>,
    template: Option<String>,
    step: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMatch {
    group: usize,
    name: String,
}

impl From<RawComponent> for ComponentDecl {
    fn from(raw: RawComponent) -> Self {
        ComponentDecl {
            language: raw.language,
            uri: raw.uri,
            function: raw.function,
            template: raw.template,
            step: raw.step,
        }
    }
}

/// Load a descriptor from disk.
pub fn load_descriptor(path: &Path) -> Result<DescriptorFile, CompileError> {
    let content = fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_descriptor(&content)
}

/// Parse descriptor text into a declaration stream.
pub fn parse_descriptor(content: &str) -> Result<DescriptorFile, CompileError> {
    let raw: RawDescriptor = toml::from_str(content)?;

    let mut declarations = Vec::new();
    for (prefix, uri) in raw.namespaces {
        declarations.push(Declaration::Namespace { prefix, uri });
    }
    if let Some(title) = raw.title {
        declarations.push(Declaration::Title(title));
    }
    if !raw.filters.is_empty() {
        declarations.push(Declaration::ApplicationFilters(raw.filters));
    }
    for param in raw.config_param {
        declarations.push(Declaration::ConfigParam(ConfigParamDecl {
            id: param.id,
            name: param.name,
            description: param.description,
            value: param.value,
            uri: param.uri,
        }));
    }
    flatten_items(raw.items, &mut declarations)?;

    Ok(DescriptorFile {
        name: raw.name,
        declarations,
    })
}

fn required<T>(value: Option<T>, kind: &str, field: &str) -> Result<T, CompileError> {
    value.ok_or_else(|| CompileError::Invalid(format!("{} is missing '{}'", kind, field)))
}

fn flatten_items(items: Vec<RawItem>, out: &mut Vec<Declaration>) -> Result<(), CompileError> {
    for item in items {
        if item.kind != "group" && !item.items.is_empty() {
            return Err(CompileError::Invalid(format!(
                "only groups can contain items, found nested items in {}",
                item.kind
            )));
        }

        let declaration = match item.kind.as_str() {
            "group" => {
                out.push(Declaration::GroupOpen {
                    filters: item.filters,
                });
                flatten_items(item.items, out)?;
                Declaration::GroupClose
            }
            "filter" => Declaration::Filter {
                name: required(item.name, "filter", "name")?,
                input: item.input.map(ComponentDecl::from),
                output: item.output.map(ComponentDecl::from),
            },
            "chain" => Declaration::Chain {
                name: required(item.name, "chain", "name")?,
                filters: item.filters,
            },
            "error" => Declaration::Error {
                name: required(item.name, "error", "name")?,
                catch: required(item.catch, "error", "catch")?,
                component: required(item.component, "error", "component")?.into(),
                filters: item.filters,
            },
            "servlet" => Declaration::Servlet {
                name: required(item.name, "servlet", "name")?,
                filters: item.filters,
                component: required(item.component, "servlet", "component")?.into(),
                pattern: required(item.pattern, "servlet", "pattern")?,
                groups: item
                    .matches
                    .into_iter()
                    .map(|m| MatchGroup {
                        number: m.group,
                        name: m.name,
                    })
                    .collect(),
            },
            "resource" => Declaration::Resource {
                pattern: required(item.pattern, "resource", "pattern")?,
                rewrite: item.rewrite,
                media_type: required(item.media_type, "resource", "media-type")?,
                filters: item.filters,
            },
            other => Declaration::Unknown(other.to_string()),
        };
        out.push(declaration);
    }
    Ok(())
}
