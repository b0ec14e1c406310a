//! Request handling and transformation.
//!
//! # Responsibilities
//! - Assign a request ID (UUID v4) unless the client sent one
//! - Split `/{app}/{rest}` into the application name and its relative path
//! - Convert axum request parts into a transport-neutral `HttpRequest`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The application-relative path stays percent-encoded, as received
//! - Non-UTF-8 header values are kept lossily rather than dropped

use axum::http::{request::Parts, HeaderName};
use bytes::Bytes;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::runtime::request::HttpRequest;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Sets `x-request-id` on incoming requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Copies `x-request-id` from the request to the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

pub fn request_id(parts: &Parts) -> String {
    parts
        .headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// `/shop/items/1` → `("shop", "/items/1")`; `/shop` → `("shop", "/")`.
pub fn split_mount(path: &str) -> Option<(&str, String)> {
    let trimmed = path.strip_prefix('/')?;
    let (app, rest) = match trimmed.split_once('/') {
        Some((app, rest)) => (app, format!("/{}", rest)),
        None => (trimmed, "/".to_string()),
    };
    if app.is_empty() {
        return None;
    }
    Some((app, rest))
}

/// Build the dispatcher's view of a request mounted at `/{app}`.
pub fn to_http_request(parts: &Parts, app: &str, path: String, body: Bytes) -> HttpRequest {
    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let query = parts
        .uri
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = match (parts.uri.authority(), parts.headers.get(axum::http::header::HOST)) {
        (Some(_), _) => parts.uri.to_string(),
        (None, Some(host)) => format!(
            "http://{}{}",
            String::from_utf8_lossy(host.as_bytes()),
            path_and_query
        ),
        (None, None) => path_and_query.to_string(),
    };

    HttpRequest {
        method: parts.method.as_str().to_string(),
        path,
        uri,
        context_root: format!("/{}", app),
        query,
        headers,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_split_mount() {
        assert_eq!(split_mount("/shop/items/1"), Some(("shop", "/items/1".to_string())));
        assert_eq!(split_mount("/shop"), Some(("shop", "/".to_string())));
        assert_eq!(split_mount("/shop/"), Some(("shop", "/".to_string())));
        assert_eq!(split_mount("/"), None);
    }

    #[test]
    fn test_to_http_request() {
        let (parts, _) = Request::builder()
            .method("POST")
            .uri("/shop/items/1?q=a%20b&x=1")
            .header("Host", "example.com:8080")
            .header("X-Custom", "v")
            .body(())
            .unwrap()
            .into_parts();

        let request = to_http_request(&parts, "shop", "/items/1".into(), Bytes::from_static(b"hi"));
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/items/1");
        assert_eq!(request.context_root, "/shop");
        assert_eq!(request.uri, "http://example.com:8080/shop/items/1?q=a%20b&x=1");
        assert_eq!(
            request.query,
            vec![("q".to_string(), "a b".to_string()), ("x".to_string(), "1".to_string())]
        );
        assert_eq!(request.header("x-custom"), Some("v"));
        assert_eq!(&request.body[..], b"hi");
    }
}
