//! Events delivered by the host.

use std::future::Future;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::{Request, Response, WorkerError};

/// Identifier of a page controlled by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Create a client ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A response the host already started fetching speculatively.
pub type PreloadFuture = BoxFuture<'static, Option<Response>>;

/// The read-only part of an intercepted event.
#[derive(Debug, Clone)]
pub struct EventInfo {
    request: Request,
    client_id: Option<ClientId>,
}

impl EventInfo {
    /// The intercepted request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The page that issued the request, if the host knows it.
    pub fn client_id(&self) -> Option<&ClientId> {
        self.client_id.as_ref()
    }
}

/// One intercepted request.
///
/// The event owns the write-once respond-with slot. Splitting it with
/// [`FetchEvent::into_parts`] hands the slot to whoever will answer.
pub struct FetchEvent {
    info: EventInfo,
    preload: Option<PreloadFuture>,
    responder: RespondWith,
}

impl FetchEvent {
    /// Create an event and the receiver the host waits on.
    pub fn new(request: Request) -> (Self, ResponseReceiver) {
        let (tx, rx) = oneshot::channel();
        let url = request.url();
        let event = Self {
            info: EventInfo {
                request,
                client_id: None,
            },
            preload: None,
            responder: RespondWith { tx, url },
        };
        (event, ResponseReceiver(rx))
    }

    /// Attach the issuing page.
    pub fn with_client(mut self, id: impl Into<ClientId>) -> Self {
        self.info.client_id = Some(id.into());
        self
    }

    /// Attach a speculative preload.
    pub fn with_preload<F>(mut self, preload: F) -> Self
    where
        F: Future<Output = Option<Response>> + Send + 'static,
    {
        self.preload = Some(preload.boxed());
        self
    }

    /// The intercepted request.
    pub fn request(&self) -> &Request {
        &self.info.request
    }

    /// The issuing page, if known.
    pub fn client_id(&self) -> Option<&ClientId> {
        self.info.client_id.as_ref()
    }

    /// Split into the read-only info, the preload, and the respond-with slot.
    pub fn into_parts(self) -> (EventInfo, Option<PreloadFuture>, RespondWith) {
        (self.info, self.preload, self.responder)
    }
}

/// The write-once slot answering an intercepted request.
///
/// `respond` consumes the slot, so an event cannot be answered twice.
#[derive(Debug)]
pub struct RespondWith {
    tx: oneshot::Sender<Response>,
    url: String,
}

impl RespondWith {
    /// Fill the slot.
    ///
    /// If the host has already abandoned the event the response is dropped.
    pub fn respond(self, response: Response) {
        let status = response.status();
        if self.tx.send(response).is_err() {
            tracing::debug!(url = %self.url, %status, "event abandoned before response");
        }
    }

    /// Whether the host is still waiting on this slot.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Host side of the respond-with slot.
#[derive(Debug)]
pub struct ResponseReceiver(oneshot::Receiver<Response>);

impl ResponseReceiver {
    /// Wait for the worker's response.
    pub async fn recv(self) -> Result<Response, WorkerError> {
        self.0.await.map_err(|_| WorkerError::Unanswered)
    }

    /// Take the response if one has been sent.
    pub fn try_recv(&mut self) -> Option<Response> {
        self.0.try_recv().ok()
    }
}

/// Work that must finish before the host may tear the worker down.
type PendingWork = BoxFuture<'static, Result<(), WorkerError>>;

/// An install or activate event that can extend the worker's lifetime.
#[derive(Default)]
pub struct ExtendableEvent {
    pending: Mutex<Vec<PendingWork>>,
}

impl ExtendableEvent {
    /// Create an event with no pending work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the worker alive until `work` finishes.
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.push(work.boxed());
    }

    /// Number of registered work items.
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drive all registered work; the first failure fails the event.
    pub async fn settled(self) -> Result<(), WorkerError> {
        let pending = self.pending.into_inner().unwrap_or_else(|e| e.into_inner());
        futures::future::try_join_all(pending).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(url: &str) -> (FetchEvent, ResponseReceiver) {
        FetchEvent::new(Request::get(url).unwrap())
    }

    // === RespondWith Tests ===

    #[tokio::test]
    async fn test_respond_with_delivers_response() {
        let (event, rx) = event("http://localhost/a");
        let (_, _, slot) = event.into_parts();

        slot.respond(Response::html("done"));

        let resp = rx.recv().await.unwrap();
        assert_eq!(resp.text(), "done");
    }

    #[tokio::test]
    async fn test_respond_with_abandoned_event_does_not_panic() {
        let (event, rx) = event("http://localhost/a");
        drop(rx);
        let (_, _, slot) = event.into_parts();

        assert!(!slot.is_open());
        slot.respond(Response::html("nobody listens"));
    }

    #[tokio::test]
    async fn test_dropped_slot_reports_unanswered() {
        let (event, rx) = event("http://localhost/a");
        drop(event);

        assert!(matches!(rx.recv().await, Err(WorkerError::Unanswered)));
    }

    #[test]
    fn test_fetch_event_client() {
        let (event, _rx) = event("http://localhost/a");
        let event = event.with_client("tab-1");

        assert_eq!(event.client_id().map(ClientId::as_str), Some("tab-1"));
    }

    // === ExtendableEvent Tests ===

    #[tokio::test]
    async fn test_extendable_event_runs_all_work() {
        let event = ExtendableEvent::new();
        let (tx, rx) = oneshot::channel();
        event.wait_until(async move {
            let _ = tx.send(());
            Ok(())
        });
        event.wait_until(async { Ok(()) });

        assert_eq!(event.pending(), 2);
        event.settled().await.unwrap();
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_extendable_event_propagates_failure() {
        let event = ExtendableEvent::new();
        event.wait_until(async { Err(WorkerError::Host("boom".to_string())) });

        assert!(matches!(event.settled().await, Err(WorkerError::Host(_))));
    }
}
