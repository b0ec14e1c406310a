//! Body serialization.
//!
//! # Responsibilities
//! - Hold the serialization parameters of a `web:body`
//! - Infer the output method from the media type when not explicit
//! - Write items as xml, xhtml, html, text or raw binary
//! - Encode to UTF-8, US-ASCII or ISO-8859-1
//!
//! # Design Decisions
//! - Unencodable characters become character references in markup and are an
//!   error in text output
//! - Binary output writes binary items as-is and base64-decodes anything else
//! - Unicode normalization and character maps are reported as not implemented

use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::TransportError;
use crate::model::item::{Element, Item, Node};
use crate::model::QName;
use crate::response::content_type::{media_kind, MediaKind};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: [&str; 16] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr", "basefont", "frame",
];

const URI_ATTRIBUTES: [&str; 10] = [
    "href", "src", "action", "cite", "longdesc", "usemap", "codebase", "background",
    "formaction", "poster",
];

fn internal(message: impl Into<String>) -> TransportError {
    TransportError::internal(message)
}

/// Parameters carried by `web:body` attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerializationParams {
    /// From `content-type`.
    pub media_type: Option<String>,
    pub method: Option<String>,
    pub encoding: Option<String>,
    pub byte_order_mark: Option<bool>,
    pub cdata_section_elements: Vec<String>,
    pub doctype_public: Option<String>,
    pub doctype_system: Option<String>,
    pub escape_uri_attributes: Option<bool>,
    pub include_content_type: Option<bool>,
    pub indent: Option<bool>,
    pub normalization_form: Option<String>,
    pub omit_xml_declaration: Option<bool>,
    pub standalone: Option<String>,
    pub undeclare_prefixes: Option<bool>,
    pub use_character_maps: Option<String>,
    pub version: Option<String>,
}

fn parse_bool(name: &str, value: &str) -> Result<bool, TransportError> {
    match value.trim() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(internal(format!("Invalid value for {}: {:?}", name, value))),
    }
}

impl SerializationParams {
    /// Set the parameter named by a `web:body` attribute.
    /// Returns `Ok(false)` when `name` is not a serialization parameter.
    pub fn set(&mut self, name: &str, value: &str) -> Result<bool, TransportError> {
        let text = Some(value.to_string());
        match name {
            "content-type" => self.media_type = text,
            "method" => self.method = Some(value.trim().to_string()),
            "encoding" => self.encoding = Some(value.trim().to_string()),
            "byte-order-mark" => self.byte_order_mark = Some(parse_bool(name, value)?),
            "cdata-section-elements" => {
                self.cdata_section_elements =
                    value.split_whitespace().map(String::from).collect()
            }
            "doctype-public" => self.doctype_public = text,
            "doctype-system" => self.doctype_system = text,
            "escape-uri-attributes" => {
                self.escape_uri_attributes = Some(parse_bool(name, value)?)
            }
            "include-content-type" => self.include_content_type = Some(parse_bool(name, value)?),
            "indent" => self.indent = Some(parse_bool(name, value)?),
            "normalization-form" => self.normalization_form = Some(value.trim().to_string()),
            "omit-xml-declaration" => self.omit_xml_declaration = Some(parse_bool(name, value)?),
            "standalone" => match value.trim() {
                v @ ("yes" | "no" | "omit") => self.standalone = Some(v.to_string()),
                _ => return Err(internal(format!("Invalid value for standalone: {:?}", value))),
            },
            "undeclare-prefixes" => self.undeclare_prefixes = Some(parse_bool(name, value)?),
            "use-character-maps" => self.use_character_maps = text,
            "version" => self.version = Some(value.trim().to_string()),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Xml,
    Xhtml,
    Html,
    Text,
    Binary,
}

impl Method {
    pub fn parse(value: &str) -> Result<Self, TransportError> {
        match value {
            "xml" => Ok(Method::Xml),
            "xhtml" => Ok(Method::Xhtml),
            "html" => Ok(Method::Html),
            "text" => Ok(Method::Text),
            "binary" => Ok(Method::Binary),
            other => Err(internal(format!("Unknown serialization method: {}", other))),
        }
    }

    /// Method implied by a media type.
    pub fn infer(media_type: Option<&str>) -> Self {
        match media_type.map(media_kind) {
            Some(MediaKind::Html) => Method::Html,
            Some(MediaKind::Xml) => Method::Xml,
            Some(MediaKind::Text) => Method::Text,
            _ => Method::Binary,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Method::Xml => "xml",
            Method::Xhtml => "xhtml",
            Method::Html => "html",
            Method::Text => "text",
            Method::Binary => "binary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    pub fn parse(label: &str) -> Result<Self, TransportError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "us-ascii" | "ascii" => Ok(Encoding::Ascii),
            "iso-8859-1" | "latin1" | "iso_8859-1" => Ok(Encoding::Latin1),
            _ => Err(internal(format!("Unsupported output encoding: {}", label))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Ascii => "US-ASCII",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    fn max_char(self) -> u32 {
        match self {
            Encoding::Utf8 => u32::MAX,
            Encoding::Ascii => 0x7F,
            Encoding::Latin1 => 0xFF,
        }
    }

    fn encode(self, text: String, char_refs: bool) -> Result<Vec<u8>, TransportError> {
        if self == Encoding::Utf8 {
            return Ok(text.into_bytes());
        }
        let mut bytes = Vec::with_capacity(text.len());
        for c in text.chars() {
            let code = c as u32;
            if code <= self.max_char() {
                bytes.push(code as u8);
            } else if char_refs {
                bytes.extend_from_slice(format!("&#x{:X};", code).as_bytes());
            } else {
                return Err(internal(format!(
                    "Character U+{:04X} cannot be encoded in {}",
                    code,
                    self.label()
                )));
            }
        }
        Ok(bytes)
    }
}

/// Serialize `items` according to `params`.
pub fn serialize(params: &SerializationParams, items: &[Item]) -> Result<Vec<u8>, TransportError> {
    if let Some(form) = params.normalization_form.as_deref() {
        if !form.is_empty() && !form.eq_ignore_ascii_case("none") {
            return Err(TransportError::not_implemented(format!(
                "normalization-form {} is not supported",
                form
            )));
        }
    }
    if params
        .use_character_maps
        .as_deref()
        .is_some_and(|m| !m.trim().is_empty())
    {
        return Err(TransportError::not_implemented(
            "use-character-maps is not supported",
        ));
    }
    if params.undeclare_prefixes == Some(true) && params.version.as_deref() != Some("1.1") {
        return Err(internal("undeclare-prefixes=yes requires version 1.1"));
    }

    let method = match params.method.as_deref() {
        Some(m) => Method::parse(m)?,
        None => Method::infer(params.media_type.as_deref()),
    };
    let encoding = Encoding::parse(params.encoding.as_deref().unwrap_or("UTF-8"))?;

    let mut bytes = match method {
        Method::Binary => binary(items)?,
        Method::Text => encoding.encode(text(items), false)?,
        Method::Xml | Method::Xhtml | Method::Html => {
            let mut writer = MarkupWriter::new(method, params, encoding);
            writer.write_items(items)?;
            encoding.encode(writer.out, true)?
        }
    };

    if params.byte_order_mark == Some(true) && encoding == Encoding::Utf8 && method != Method::Binary {
        bytes.splice(0..0, [0xEF, 0xBB, 0xBF]);
    }
    Ok(bytes)
}

fn binary(items: &[Item]) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Item::Binary(bytes) => out.extend_from_slice(bytes),
            other => {
                let encoded: String = other
                    .string_value()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let decoded = STANDARD.decode(encoded).map_err(|e| {
                    internal(format!("Invalid base64 content for binary output: {}", e))
                })?;
                out.extend_from_slice(&decoded);
            }
        }
    }
    Ok(out)
}

fn text(items: &[Item]) -> String {
    let mut out = String::new();
    let mut previous_atomic = false;
    for item in items {
        let atomic = matches!(item, Item::Atomic(_));
        if atomic && previous_atomic {
            out.push(' ');
        }
        out.push_str(&item.string_value());
        previous_atomic = atomic;
    }
    out
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            _ => out.push(c),
        }
    }
}

fn escape_uri(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{:02X}", b);
            }
        }
    }
    out
}

struct MarkupWriter<'p> {
    out: String,
    method: Method,
    params: &'p SerializationParams,
    encoding: Encoding,
    indent: bool,
    /// Namespace declarations per open element.
    scopes: Vec<Vec<(String, String)>>,
    generated: usize,
    seen_element: bool,
}

impl<'p> MarkupWriter<'p> {
    fn new(method: Method, params: &'p SerializationParams, encoding: Encoding) -> Self {
        Self {
            out: String::new(),
            method,
            params,
            encoding,
            indent: params.indent.unwrap_or(false),
            scopes: Vec::new(),
            generated: 0,
            seen_element: false,
        }
    }

    fn write_items(&mut self, items: &[Item]) -> Result<(), TransportError> {
        if self.method != Method::Html && self.params.omit_xml_declaration != Some(true) {
            self.declaration();
        }
        let mut previous_atomic = false;
        for item in items {
            match item {
                Item::Document(nodes) => {
                    for node in nodes {
                        self.node(node, 0)?;
                    }
                }
                Item::Node(node) => self.node(node, 0)?,
                Item::Atomic(value) => {
                    if previous_atomic {
                        self.out.push(' ');
                    }
                    escape_text(&mut self.out, value);
                }
                Item::Binary(_) => {
                    return Err(internal(format!(
                        "A binary item cannot be serialized with method {}",
                        self.method.label()
                    )))
                }
            }
            previous_atomic = matches!(item, Item::Atomic(_));
        }
        Ok(())
    }

    fn declaration(&mut self) {
        let version = self.params.version.as_deref().unwrap_or("1.0");
        let _ = write!(
            self.out,
            "<?xml version=\"{}\" encoding=\"{}\"",
            version,
            self.encoding.label()
        );
        match self.params.standalone.as_deref() {
            Some("yes") => self.out.push_str(" standalone=\"yes\""),
            Some("no") => self.out.push_str(" standalone=\"no\""),
            _ => {}
        }
        self.out.push_str("?>");
        if self.indent {
            self.out.push('\n');
        }
    }

    fn doctype(&mut self, root: &Element) {
        let name = if self.method == Method::Html {
            "html".to_string()
        } else {
            root.name.lexical()
        };
        let public = self.params.doctype_public.as_deref();
        let system = self.params.doctype_system.as_deref();
        let _ = match (public, system) {
            (Some(p), Some(s)) => write!(self.out, "<!DOCTYPE {} PUBLIC \"{}\" \"{}\">", name, p, s),
            (None, Some(s)) => write!(self.out, "<!DOCTYPE {} SYSTEM \"{}\">", name, s),
            (Some(p), None) if self.method == Method::Html => {
                write!(self.out, "<!DOCTYPE {} PUBLIC \"{}\">", name, p)
            }
            _ => return,
        };
        self.out.push('\n');
    }

    fn node(&mut self, node: &Node, depth: usize) -> Result<(), TransportError> {
        match node {
            Node::Element(element) => {
                if !self.seen_element {
                    self.seen_element = true;
                    self.doctype(element);
                }
                self.element(element, depth)
            }
            Node::Text(text) => {
                escape_text(&mut self.out, text);
                Ok(())
            }
            Node::Comment(comment) => {
                let _ = write!(self.out, "<!--{}-->", comment);
                Ok(())
            }
        }
    }

    fn lookup<'s>(&'s self, prefix: &str, pending: &'s [(String, String)]) -> Option<&'s str> {
        pending
            .iter()
            .rev()
            .chain(self.scopes.iter().rev().flat_map(|s| s.iter().rev()))
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .or(match prefix {
                "" => Some(""),
                "xml" => Some(XML_NS),
                _ => None,
            })
    }

    fn is_html_element(&self, element: &Element) -> bool {
        matches!(self.method, Method::Html | Method::Xhtml)
            && (element.name.namespace.is_empty() || element.name.namespace == XHTML_NS)
    }

    fn element_name(&mut self, name: &QName, pending: &mut Vec<(String, String)>) -> String {
        let prefix = if name.has_namespace() {
            name.prefix.clone().unwrap_or_default()
        } else {
            String::new()
        };
        if self.lookup(&prefix, pending) != Some(name.namespace.as_str()) {
            pending.push((prefix.clone(), name.namespace.clone()));
        }
        if prefix.is_empty() {
            name.local.clone()
        } else {
            format!("{}:{}", prefix, name.local)
        }
    }

    fn attribute_name(&mut self, name: &QName, pending: &mut Vec<(String, String)>) -> String {
        if !name.has_namespace() {
            return name.local.clone();
        }
        if name.namespace == XML_NS {
            return format!("xml:{}", name.local);
        }
        let wanted = name.prefix.clone().filter(|p| !p.is_empty());
        let prefix = match wanted {
            Some(p) => match self.lookup(&p, pending) {
                Some(uri) if uri == name.namespace => Some(p),
                None => {
                    pending.push((p.clone(), name.namespace.clone()));
                    Some(p)
                }
                Some(_) => None,
            },
            None => None,
        };
        let prefix = prefix.unwrap_or_else(|| {
            self.generated += 1;
            let p = format!("ns{}", self.generated);
            pending.push((p.clone(), name.namespace.clone()));
            p
        });
        format!("{}:{}", prefix, name.local)
    }

    fn is_cdata_element(&self, element: &Element) -> bool {
        self.params.cdata_section_elements.iter().any(|n| {
            *n == element.name.eqname()
                || *n == element.name.lexical()
                || (!element.name.has_namespace() && *n == element.name.local)
        })
    }

    fn newline(&mut self, depth: usize) {
        self.out.push('\n');
        for _ in 0..depth {
            self.out.push_str("  ");
        }
    }

    fn element(&mut self, element: &Element, depth: usize) -> Result<(), TransportError> {
        let html = self.is_html_element(element);
        let local = element.name.local.to_ascii_lowercase();
        let mut pending = Vec::new();

        let name = self.element_name(&element.name, &mut pending);
        let mut attributes = Vec::with_capacity(element.attributes.len());
        for attr in &element.attributes {
            let qname = self.attribute_name(&attr.name, &mut pending);
            let escape = html
                && self.params.escape_uri_attributes.unwrap_or(true)
                && !attr.name.has_namespace()
                && URI_ATTRIBUTES.contains(&attr.name.local.as_str());
            let value = if escape {
                escape_uri(&attr.value)
            } else {
                attr.value.clone()
            };
            attributes.push((qname, value));
        }

        self.out.push('<');
        self.out.push_str(&name);
        for (prefix, uri) in &pending {
            if prefix.is_empty() {
                self.out.push_str(" xmlns=\"");
            } else {
                let _ = write!(self.out, " xmlns:{}=\"", prefix);
            }
            escape_attribute(&mut self.out, uri);
            self.out.push('"');
        }
        for (qname, value) in &attributes {
            let _ = write!(self.out, " {}=\"", qname);
            escape_attribute(&mut self.out, value);
            self.out.push('"');
        }
        self.scopes.push(pending);

        let meta = html && local == "head" && self.params.include_content_type.unwrap_or(true);
        let void = html && VOID_ELEMENTS.contains(&local.as_str());
        if element.children.is_empty() && !meta {
            match (html, self.method) {
                (true, Method::Html) if void => self.out.push('>'),
                (true, Method::Xhtml) if void => self.out.push_str(" />"),
                (true, _) => {
                    let _ = write!(self.out, "></{}>", name);
                }
                _ => self.out.push_str("/>"),
            }
            self.scopes.pop();
            return Ok(());
        }
        self.out.push('>');

        let pretty = self.indent
            && element
                .children
                .iter()
                .all(|c| !matches!(c, Node::Text(t) if !t.trim().is_empty()));
        if meta {
            if pretty {
                self.newline(depth + 1);
            }
            let media = self.params.media_type.as_deref().unwrap_or("text/html");
            let close = if self.method == Method::Xhtml { " />" } else { ">" };
            let _ = write!(
                self.out,
                "<meta http-equiv=\"Content-Type\" content=\"{}; charset={}\"{}",
                media,
                self.encoding.label(),
                close
            );
        }

        let raw = html && self.method == Method::Html && (local == "script" || local == "style");
        let cdata = !html && self.is_cdata_element(element);
        for child in &element.children {
            match child {
                Node::Text(_) if pretty => continue,
                Node::Text(t) if raw => self.out.push_str(t),
                Node::Text(t) if cdata => {
                    let _ = write!(self.out, "<![CDATA[{}]]>", t.replace("]]>", "]]]]><![CDATA[>"));
                }
                _ => {
                    if pretty {
                        self.newline(depth + 1);
                    }
                    self.node(child, depth + 1)?;
                }
            }
        }
        if pretty {
            self.newline(depth);
        }
        let _ = write!(self.out, "</{}>", name);
        self.scopes.pop();
        Ok(())
    }
}
