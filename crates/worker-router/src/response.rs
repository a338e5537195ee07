//! The response builder handed to handlers.

use std::sync::Arc;

use worker_bridge::CookieBridge;
use worker_core::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use worker_core::{
    BackgroundMessage, ClientId, Clients, CookieOptions, HeaderMap, Response, StatusCode,
    TEXT_HTML,
};

use crate::RouteError;

/// Where a finalized response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// A registered handler.
    Route,
    /// The static asset cache.
    Cache,
    /// The host's navigation preload.
    Preload,
    /// A live network fetch.
    Network,
    /// Dispatch failed and the fixed failure response was sent.
    Failed,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Route => write!(f, "route"),
            Self::Cache => write!(f, "cache"),
            Self::Preload => write!(f, "preload"),
            Self::Network => write!(f, "network"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Proof that an event's response has been produced.
///
/// Only the finalizing methods of [`PseudoResponse`] and [`crate::Next::run`]
/// create one, and each consumes the builder, so a handler can finalize at
/// most once and must finalize to return successfully.
#[derive(Debug)]
#[must_use = "a finalized response must be returned to the router"]
pub struct Finalized {
    response: Response,
    source: Source,
}

impl Finalized {
    pub(crate) fn new(response: Response, source: Source) -> Self {
        Self { response, source }
    }

    pub(crate) fn failed() -> Self {
        Self::new(Response::router_failed(), Source::Failed)
    }

    /// The response that will be sent.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Where the response came from.
    pub fn source(&self) -> Source {
        self.source
    }

    /// Take the response.
    pub fn into_response(self) -> Response {
        self.response
    }
}

/// Write-only response builder for one event.
pub struct PseudoResponse {
    headers: HeaderMap,
    cookie_name: String,
    bridge: Arc<CookieBridge>,
    client: Option<ClientId>,
    clients: Arc<dyn Clients>,
}

impl PseudoResponse {
    /// Create a builder that reports cookie writes to `client`.
    pub fn new(bridge: Arc<CookieBridge>, clients: Arc<dyn Clients>, client: Option<ClientId>) -> Self {
        Self {
            headers: HeaderMap::new(),
            cookie_name: bridge.name().to_string(),
            bridge,
            client,
            clients,
        }
    }

    /// Set a header, or delete it when `value` is `None`.
    pub fn set(&mut self, name: &str, value: Option<&str>) -> Result<&mut Self, RouteError> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RouteError::InvalidHeader(name.to_string()))?;
        match value {
            Some(value) => {
                let value = HeaderValue::from_str(value)
                    .map_err(|_| RouteError::InvalidHeader(name.to_string()))?;
                self.headers.insert(header, value);
            }
            None => {
                self.headers.remove(header);
            }
        }
        Ok(self)
    }

    /// Set several headers at once.
    pub fn set_all<'a, I>(&mut self, headers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        for (name, value) in headers {
            self.set(name, value)?;
        }
        Ok(self)
    }

    /// Headers set so far.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set the bridged cookie.
    ///
    /// The worker has no cookie jar, so the value is remembered by the bridge
    /// and posted to the issuing page, which persists it.
    pub async fn cookie(
        &mut self,
        name: &str,
        value: impl Into<String>,
        options: CookieOptions,
    ) -> Result<(), RouteError> {
        if name != self.cookie_name {
            return Err(RouteError::CookieName {
                expected: self.cookie_name.clone(),
                actual: name.to_string(),
            });
        }

        let value = value.into();
        self.bridge.set(Some(value.clone()));

        let Some(id) = &self.client else {
            return Ok(());
        };
        let message = BackgroundMessage::SetCookie {
            cookie_name: self.cookie_name.clone(),
            cookie_value: value,
            options,
        };
        match self.clients.get(id).await {
            Some(client) => {
                if let Err(e) = client.post_message(&message) {
                    tracing::warn!(client = %id, error = %e, "failed to post cookie to page");
                }
            }
            None => tracing::warn!(client = %id, "page closed before cookie could be posted"),
        }
        Ok(())
    }

    /// Finalize with a 200 `text/html` body.
    pub fn send(self, body: impl Into<String>) -> Finalized {
        let mut headers = self.headers;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML));
        Finalized::new(
            Response::new(StatusCode::OK)
                .with_headers(headers)
                .with_body(body.into()),
            Source::Route,
        )
    }

    /// Finalize with a fully custom response, ignoring headers set here.
    pub fn raw_response(self, response: Response) -> Finalized {
        Finalized::new(response, Source::Route)
    }

    pub(crate) fn finalize_from(self, source: Source, response: Response) -> Finalized {
        Finalized::new(response, source)
    }
}

impl std::fmt::Debug for PseudoResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PseudoResponse")
            .field("headers", &self.headers)
            .field("cookie_name", &self.cookie_name)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
