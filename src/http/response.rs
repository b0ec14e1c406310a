//! Response conversion.
//!
//! # Responsibilities
//! - Turn an encoded `HttpResponse` into an axum response
//! - Drop headers that are not valid HTTP, with a warning
//!
//! # Design Decisions
//! - Header order and duplicates from the application are preserved
//! - Out-of-range status codes become 500
//! - The requested reason phrase is logged only; HTTP/2 has none

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::response::HttpResponse;

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or_else(|_| {
            tracing::warn!(status = self.status, "Invalid status code, answering 500");
            StatusCode::INTERNAL_SERVER_ERROR
        });
        if let Some(message) = &self.message {
            tracing::debug!(status = self.status, message = %message, "Reason phrase not transmitted");
        }

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_headers_and_status_carried_over() {
        let mut encoded = HttpResponse::new(201);
        encoded.headers.push(("Set-Cookie".into(), "a=1".into()));
        encoded.headers.push(("Set-Cookie".into(), "b=2".into()));
        encoded.headers.push(("Bad Header".into(), "x".into()));
        encoded.body = Bytes::from_static(b"ok");

        let response = encoded.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookies: Vec<_> = response.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies.len(), 2);
        assert_eq!(response.headers().len(), 2);
    }

    #[test]
    fn test_invalid_status_becomes_500() {
        let response = HttpResponse::new(1000).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
