//! Intercepted request values.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, Uri};

use crate::WorkerError;

/// Content type of an HTML form submission.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A request as seen by the worker.
///
/// URLs are always absolute: the host hands the worker the full URL of every
/// request it intercepts, and origin checks depend on it.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    /// Create a request with an empty body.
    pub fn new(method: Method, url: &str) -> Result<Self, WorkerError> {
        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
            WorkerError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(WorkerError::InvalidUrl {
                url: url.to_string(),
                reason: "URL must be absolute".to_string(),
            });
        }

        Ok(Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Vec::new(),
        })
    }

    /// Create a GET request.
    pub fn get(url: &str) -> Result<Self, WorkerError> {
        Self::new(Method::GET, url)
    }

    /// Create a POST request.
    pub fn post(url: &str) -> Result<Self, WorkerError> {
        Self::new(Method::POST, url)
    }

    /// Add a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, WorkerError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| WorkerError::InvalidHeader(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| WorkerError::InvalidHeader(name.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set a raw body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a form-encoded body and its content type.
    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
        self.body = form.into().into_bytes();
        self
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The parsed URL.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The full URL as a string.
    pub fn url(&self) -> String {
        self.uri.to_string()
    }

    /// The URL path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Whether the method is `method`, ignoring ASCII case.
    pub fn is_method(&self, method: &Method) -> bool {
        self.method.as_str().eq_ignore_ascii_case(method.as_str())
    }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// The origin (`scheme://authority`) of the URL.
    pub fn origin(&self) -> String {
        match (self.uri.scheme_str(), self.uri.authority()) {
            (Some(scheme), Some(authority)) => format!("{}://{}", scheme, authority),
            _ => String::new(),
        }
    }

    /// The request headers.
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

    /// Key used to identify this request in a cache.
    pub fn cache_key(&self) -> String {
        self.url()
    }
}
