//! Response encoding.
//!
//! # Data Flow
//! ```text
//! Sequence (web:response, trailing items...)
//!     → decode.rs (ResponseDescriptor: status, headers, bodies)
//!     → per body:
//!         @src          → bytes read verbatim
//!         inline/items  → serialize.rs (method, encoding)
//!     → HttpResponse
//! ```
//!
//! # Design Decisions
//! - `HttpResponse` is transport-neutral; `http::response` adapts it to axum
//! - External bodies never pass through the serializer
//! - Multipart output is decoded for validation but answered with 501

pub mod content_type;
pub mod decode;
pub mod serialize;

use std::path::{Path, PathBuf};

use bytes::Bytes;
use url::Url;

use crate::error::TransportError;
use crate::model::item::Sequence;

pub use decode::{Body, BodyContent, ResponseContent, ResponseDescriptor};
pub use serialize::{Method, SerializationParams};

/// A fully encoded response, ready for any transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Reason phrase requested by the application, if any.
    pub message: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            message: None,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// A `text/plain` response, used for transport and internal errors.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            message: None,
            headers: vec![(
                "Content-Type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    /// First value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode a computed sequence. `base_dir` anchors relative `src` URIs.
    pub fn encode(
        &self,
        sequence: Sequence,
        base_dir: Option<&Path>,
    ) -> Result<HttpResponse, TransportError> {
        let descriptor = ResponseDescriptor::decode(sequence)?;
        let mut response = HttpResponse::new(descriptor.status);
        response.message = descriptor.message;
        response.headers = descriptor.headers;

        match descriptor.content {
            ResponseContent::Empty => {}
            ResponseContent::Single(body) => self.write_body(&mut response, body, base_dir)?,
            ResponseContent::Multipart(multipart) => {
                tracing::debug!(
                    bodies = multipart.bodies.len(),
                    "Rejecting multipart response"
                );
                return Err(TransportError::not_implemented(
                    "Multipart responses are not supported",
                ));
            }
        }
        Ok(response)
    }

    fn write_body(
        &self,
        response: &mut HttpResponse,
        body: Body,
        base_dir: Option<&Path>,
    ) -> Result<(), TransportError> {
        if let Some(id) = body.id {
            response.headers.push(("Content-ID".to_string(), id));
        }
        if let Some(description) = body.description {
            response
                .headers
                .push(("Content-Description".to_string(), description));
        }

        response.body = match body.content {
            BodyContent::External(src) => read_external(&src, base_dir)?,
            BodyContent::Items(items) => Bytes::from(serialize::serialize(&body.params, &items)?),
        };

        if let Some(media_type) = body.params.media_type {
            let value = match &body.params.encoding {
                Some(encoding) => format!("{}; charset={}", media_type, encoding),
                None => media_type,
            };
            response.set_header("Content-Type", value);
        }
        Ok(())
    }
}

fn resolve_src(src: &str, base_dir: Option<&Path>) -> Result<PathBuf, TransportError> {
    match Url::parse(src) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|_| TransportError::internal(format!("Invalid file URL in web:body/@src: {}", src))),
        Ok(url) => Err(TransportError::internal(format!(
            "Unsupported scheme in web:body/@src: {}",
            url.scheme()
        ))),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base_dir.ok_or_else(|| {
                TransportError::internal(format!(
                    "Relative web:body/@src without an application directory: {}",
                    src
                ))
            })?;
            Ok(base.join(src))
        }
        Err(e) => Err(TransportError::internal(format!(
            "Invalid web:body/@src {:?}: {}",
            src, e
        ))),
    }
}

fn read_external(src: &str, base_dir: Option<&Path>) -> Result<Bytes, TransportError> {
    let path = resolve_src(src, base_dir)?;
    match std::fs::read(&path) {
        Ok(bytes) => Ok(Bytes::from(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TransportError::not_found(format!("Body source not found: {}", src)))
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read body source");
            Err(TransportError::internal(format!("Cannot read body source: {}", src)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{Element, Item};
    use crate::model::{QName, WEB_NS};

    fn web(local: &str) -> Element {
        Element::new(QName::new(WEB_NS, local).with_prefix("web"))
    }

    #[test]
    fn test_text_body_from_trailing_item() {
        let response = web("response")
            .with_attr("status", "200")
            .with_child(web("body").with_attr("content-type", "text/plain"));
        let encoded = ResponseEncoder::new()
            .encode(vec![Item::element(response), Item::text("hello")], None)
            .unwrap();

        assert_eq!(encoded.status, 200);
        assert_eq!(encoded.header("content-type"), Some("text/plain"));
        assert_eq!(&encoded.body[..], b"hello");
    }

    #[test]
    fn test_charset_only_when_encoding_explicit() {
        let response = web("response").with_child(
            web("body")
                .with_attr("content-type", "text/plain")
                .with_attr("encoding", "ISO-8859-1")
                .with_attr("id", "part-1")
                .with_attr("description", "greeting")
                .with_text("caf\u{e9}"),
        );
        let encoded = ResponseEncoder::new()
            .encode(vec![Item::element(response)], None)
            .unwrap();

        assert_eq!(encoded.header("Content-Type"), Some("text/plain; charset=ISO-8859-1"));
        assert_eq!(encoded.header("Content-ID"), Some("part-1"));
        assert_eq!(encoded.header("Content-Description"), Some("greeting"));
        assert_eq!(&encoded.body[..], b"caf\xE9");
    }

    #[test]
    fn test_src_streams_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/report.pdf"), b"%PDF-1.4 \x00\x01").unwrap();

        // An invalid method proves the serializer is never reached.
        let response = web("response").with_child(
            web("body")
                .with_attr("content-type", "application/pdf")
                .with_attr("method", "no-such-method")
                .with_attr("src", "config/report.pdf"),
        );
        let encoded = ResponseEncoder::new()
            .encode(vec![Item::element(response)], Some(dir.path()))
            .unwrap();

        assert_eq!(encoded.header("Content-Type"), Some("application/pdf"));
        assert_eq!(&encoded.body[..], b"%PDF-1.4 \x00\x01");
    }

    #[test]
    fn test_src_forms() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "abc").unwrap();
        let url = Url::from_file_path(&file).unwrap().to_string();

        assert_eq!(&read_external(&url, None).unwrap()[..], b"abc");
        assert_eq!(read_external("missing.txt", Some(dir.path())).unwrap_err().status, 404);
        assert_eq!(read_external("http://example.com/a", Some(dir.path())).unwrap_err().status, 500);
        assert_eq!(read_external("a.txt", None).unwrap_err().status, 500);
    }

    #[test]
    fn test_descriptor_headers_and_message() {
        let response = web("response")
            .with_attr("status", "418")
            .with_attr("message", "Teapot")
            .with_child(web("header").with_attr("name", "X-Trace").with_attr("value", "t1"));
        let encoded = ResponseEncoder::new()
            .encode(vec![Item::element(response)], None)
            .unwrap();

        assert_eq!(encoded.status, 418);
        assert_eq!(encoded.message.as_deref(), Some("Teapot"));
        assert_eq!(encoded.header("x-trace"), Some("t1"));
        assert!(encoded.body.is_empty());
    }

    #[test]
    fn test_multipart_not_implemented() {
        let response = web("response").with_child(
            web("multipart")
                .with_attr("content-type", "multipart/mixed")
                .with_child(web("body").with_attr("content-type", "text/plain").with_text("a")),
        );
        let err = ResponseEncoder::new()
            .encode(vec![Item::element(response)], None)
            .unwrap_err();
        assert_eq!(err.status, 501);
    }
}
