//! Responses handed back to the host.

use std::borrow::Cow;

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};

/// Content type used for every rendered fragment.
pub const TEXT_HTML: &str = "text/html";

/// A response produced by the worker, the cache, or the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// A 200 `text/html` response.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK)
            .with_header_value(CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML))
            .with_body(body.into())
    }

    /// The fixed response used when dispatch fails.
    pub fn router_failed() -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED).with_body("501")
    }

    /// Replace all headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set a single header.
    pub fn with_header_value(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Check if the response was successful (2xx status).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_html() {
        let resp = Response::html("<p>hi</p>");

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.header("Content-Type"), Some(TEXT_HTML));
        assert_eq!(resp.text(), "<p>hi</p>");
        assert!(resp.is_success());
    }

    #[test]
    fn test_response_router_failed() {
        let resp = Response::router_failed();

        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(resp.text(), "501");
        assert!(!resp.is_success());
    }
}
