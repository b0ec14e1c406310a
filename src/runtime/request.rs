//! Transport-independent requests and their canonical item view.
//!
//! # Responsibilities
//! - `HttpRequest`: what the transport hands to the dispatcher
//! - `RequestView`: the request as a `web:request` element followed by its
//!   body items, parsed at most once per request
//!
//! # Design Decisions
//! - The view memoizes in a `OnceCell` and is shared through `Rc`, so it is
//!   reusable by every stage of one request and cannot cross threads
//! - A request without a Content-Type carries no body items

use std::cell::OnceCell;

use bytes::Bytes;
use url::Url;

use crate::error::TransportError;
use crate::model::item::{Element, Item, Sequence};
use crate::model::{QName, WEB_NS};
use crate::response::content_type::{MediaKind, MediaType};
use crate::routing::matcher::{PathMatch, Segment};

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    /// Application-relative path, always starting with `/`.
    pub path: String,
    /// Full request URI as received.
    pub uri: String,
    /// Mount point of the application, e.g. `/shop`.
    pub context_root: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            uri: path.to_string(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(self, content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut request = self.with_header("Content-Type", content_type);
        request.body = body.into();
        request
    }

    /// First header named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn authority(&self) -> Option<String> {
        if let Some(host) = self.header("Host") {
            return Some(host.to_string());
        }
        let url = Url::parse(&self.uri).ok()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }
}

/// A matched path, decoupled from the borrow of the pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart {
    Literal(String),
    Group { name: Option<String>, value: String },
}

impl PathPart {
    pub fn collect(matched: &PathMatch<'_>) -> Vec<PathPart> {
        matched
            .segments()
            .map(|segment| match segment {
                Segment::Literal(text) => PathPart::Literal(text.to_string()),
                Segment::Group { name, value, .. } => PathPart::Group {
                    name: name.map(String::from),
                    value: value.to_string(),
                },
            })
            .collect()
    }
}

fn web(local: &str) -> QName {
    QName::new(WEB_NS, local).with_prefix("web")
}

#[derive(Debug)]
pub struct RequestView {
    request: HttpRequest,
    servlet: Option<String>,
    path: Vec<PathPart>,
    parsed: OnceCell<Result<Sequence, TransportError>>,
}

impl RequestView {
    pub fn new(request: HttpRequest, servlet: Option<String>, path: Vec<PathPart>) -> Self {
        Self {
            request,
            servlet,
            path,
            parsed: OnceCell::new(),
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// The canonical representation. Parsed on first call, then reused.
    pub fn sequence(&self) -> Result<&Sequence, TransportError> {
        self.parsed
            .get_or_init(|| self.parse())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn parse(&self) -> Result<Sequence, TransportError> {
        let req = &self.request;
        let mut root = Element::new(web("request"));
        if let Some(servlet) = &self.servlet {
            root = root.with_attr("servlet", servlet.as_str());
        }
        root = root
            .with_attr("path", req.path.as_str())
            .with_attr("method", req.method.to_ascii_lowercase())
            .with_child(Element::new(web("uri")).with_text(req.uri.as_str()));
        if let Some(authority) = req.authority() {
            root = root.with_child(Element::new(web("authority")).with_text(authority));
        }
        root = root.with_child(
            Element::new(web("context-root")).with_text(req.context_root.as_str()),
        );

        let mut path = Element::new(web("path"));
        for part in &self.path {
            path = match part {
                PathPart::Literal(text) => {
                    path.with_child(Element::new(web("part")).with_text(text.as_str()))
                }
                PathPart::Group { name, value } => {
                    let mut m = Element::new(web("match"));
                    if let Some(name) = name {
                        m = m.with_attr("name", name.as_str());
                    }
                    path.with_child(m.with_text(value.as_str()))
                }
            };
        }
        root = root.with_child(path);

        for (name, value) in &req.query {
            root = root.with_child(
                Element::new(web("param"))
                    .with_attr("name", name.as_str())
                    .with_attr("value", value.as_str()),
            );
        }
        for (name, value) in &req.headers {
            root = root.with_child(
                Element::new(web("header"))
                    .with_attr("name", name.to_ascii_lowercase())
                    .with_attr("value", value.as_str()),
            );
        }

        let mut items = Vec::new();
        if let (Some(content_type), false) = (req.header("Content-Type"), req.body.is_empty()) {
            let body = parse_body(content_type, &req.body)?;
            root = root.with_child(
                Element::new(web("body"))
                    .with_attr("content-type", content_type)
                    .with_attr("position", "1"),
            );
            items.push(body);
        }

        let mut sequence = Vec::with_capacity(items.len() + 1);
        sequence.push(Item::element(root));
        sequence.extend(items);
        Ok(sequence)
    }
}

fn parse_body(content_type: &str, body: &Bytes) -> Result<Item, TransportError> {
    let media = MediaType::parse(content_type);
    let kind = media.as_ref().map(|m| m.kind()).unwrap_or(MediaKind::Binary);
    match kind {
        MediaKind::Multipart => Err(TransportError::not_implemented(
            "multipart request bodies are not supported",
        )),
        MediaKind::Binary => Ok(Item::Binary(body.clone())),
        MediaKind::Xml | MediaKind::Html | MediaKind::Text => {
            let charset = media.and_then(|m| m.charset);
            decode_text(body, charset.as_deref()).map(Item::Atomic)
        }
    }
}

fn decode_text(body: &[u8], charset: Option<&str>) -> Result<String, TransportError> {
    match charset.map(|c| c.to_ascii_lowercase()).as_deref() {
        None | Some("utf-8") | Some("utf8") => String::from_utf8(body.to_vec())
            .map_err(|_| TransportError::bad_request("request body is not valid UTF-8")),
        Some("us-ascii") | Some("ascii") => match body.iter().position(|b| !b.is_ascii()) {
            None => Ok(body.iter().map(|&b| b as char).collect()),
            Some(offset) => Err(TransportError::bad_request(format!(
                "request body is not valid US-ASCII (byte 0x{:02X} at offset {})",
                body[offset], offset
            ))),
        },
        Some("iso-8859-1") | Some("latin1") => Ok(body.iter().map(|&b| b as char).collect()),
        Some(other) => Err(TransportError::bad_request(format!(
            "unsupported request charset '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(view: &RequestView) -> Element {
        view.sequence().unwrap()[0].as_element().unwrap().clone()
    }

    #[test]
    fn test_request_element_shape() {
        let request = HttpRequest::new("POST", "/items/42")
            .with_header("Host", "example.org")
            .with_param("q", "x");
        let view = RequestView::new(
            request,
            Some("item".into()),
            vec![
                PathPart::Literal("/items/".into()),
                PathPart::Group { name: Some("id".into()), value: "42".into() },
            ],
        );
        let root = root(&view);

        assert_eq!(root.name, QName::new(WEB_NS, "request"));
        assert_eq!(root.attr("method"), Some("post"));
        assert_eq!(root.attr("servlet"), Some("item"));
        let children: Vec<_> = root.child_elements().map(|e| e.name.local.as_str()).collect();
        assert_eq!(
            children,
            vec!["uri", "authority", "context-root", "path", "param", "header"]
        );

        let path = root.child_elements().find(|e| e.name.local == "path").unwrap();
        let m = path.child_elements().nth(1).unwrap();
        assert_eq!(m.attr("name"), Some("id"));
        assert_eq!(m.string_value(), "42");
    }

    #[test]
    fn test_sequence_is_parsed_once() {
        let view = RequestView::new(HttpRequest::new("GET", "/"), None, Vec::new());
        let first = view.sequence().unwrap() as *const Sequence;
        let second = view.sequence().unwrap() as *const Sequence;
        assert_eq!(first, second);
    }

    #[test]
    fn test_text_and_binary_bodies() {
        let text = RequestView::new(
            HttpRequest::new("POST", "/").with_body("application/xml", "<a/>"),
            None,
            Vec::new(),
        );
        assert_eq!(text.sequence().unwrap()[1], Item::text("<a/>"));

        let binary = RequestView::new(
            HttpRequest::new("POST", "/").with_body("image/png", vec![0u8, 1, 2]),
            None,
            Vec::new(),
        );
        assert_eq!(
            binary.sequence().unwrap()[1],
            Item::Binary(Bytes::from_static(&[0, 1, 2]))
        );
    }

    #[test]
    fn test_multipart_body_not_implemented() {
        let view = RequestView::new(
            HttpRequest::new("POST", "/").with_body("multipart/form-data; boundary=x", "--x--"),
            None,
            Vec::new(),
        );
        assert_eq!(view.sequence().unwrap_err().status, 501);
    }

    #[test]
    fn test_invalid_utf8_is_bad_request() {
        let view = RequestView::new(
            HttpRequest::new("POST", "/").with_body("text/plain", vec![0xffu8, 0xfe]),
            None,
            Vec::new(),
        );
        assert_eq!(view.sequence().unwrap_err().status, 400);
    }

    #[test]
    fn test_latin1_body() {
        let view = RequestView::new(
            HttpRequest::new("POST", "/").with_body("text/plain; charset=ISO-8859-1", vec![0xe9u8]),
            None,
            Vec::new(),
        );
        assert_eq!(view.sequence().unwrap()[1], Item::text("é"));
    }

    #[test]
    fn test_us_ascii_body_rejects_high_bytes() {
        let ascii = |bytes: Vec<u8>| {
            RequestView::new(
                HttpRequest::new("POST", "/").with_body("text/plain; charset=US-ASCII", bytes),
                None,
                Vec::new(),
            )
        };
        // Valid UTF-8, but not ASCII.
        let err = ascii("é".as_bytes().to_vec()).sequence().unwrap_err();
        assert_eq!(err.status, 400);
        assert!(err.message.contains("0xC3"));

        assert_eq!(ascii(b"plain".to_vec()).sequence().unwrap()[1], Item::text("plain"));
    }

    #[test]
    fn test_path_parts_from_match() {
        let pattern = crate::routing::matcher::PathPattern::with_groups(
            "/a/(b)",
            &[(1, "x".into())],
        )
        .unwrap();
        let m = pattern.match_path("/a/b").unwrap();
        assert_eq!(
            PathPart::collect(&m),
            vec![
                PathPart::Literal("/a/".into()),
                PathPart::Group { name: Some("x".into()), value: "b".into() },
            ]
        );
    }
}
