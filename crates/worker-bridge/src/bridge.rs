//! The cookie bridge.

use std::sync::RwLock;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use worker_core::{CookieConfig, ForegroundMessage};

use crate::{decode_component, BridgeError};

/// Resolution state of the bridged cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieState {
    /// Neither the restart message nor the ceiling has settled yet.
    Unresolved,
    /// Settled; `None` means the page had no cookie or never answered.
    Resolved(Option<String>),
}

impl CookieState {
    /// Whether the race has settled.
    pub fn is_resolved(&self) -> bool {
        matches!(self, CookieState::Resolved(_))
    }
}

/// Recovers one cookie's value after a cold start.
///
/// The race starts when the bridge is created. A restart message from the page
/// and the ceiling timer both try to settle it; the first one wins and the
/// loser has no effect on the outcome. Values arriving later still update the
/// last-known value returned by [`CookieBridge::resolve_cookie`].
#[derive(Debug)]
pub struct CookieBridge {
    name: String,
    ceiling: Duration,
    deadline: Instant,
    state: watch::Sender<CookieState>,
    value: RwLock<Option<String>>,
}

impl CookieBridge {
    /// Start the race for `name`, settling with no value after `ceiling`.
    pub fn new(name: impl Into<String>, ceiling: Duration) -> Self {
        let (state, _) = watch::channel(CookieState::Unresolved);
        Self {
            name: name.into(),
            ceiling,
            deadline: Instant::now() + ceiling,
            state,
            value: RwLock::new(None),
        }
    }

    /// Start the race described by the cookie config.
    pub fn from_config(config: &CookieConfig) -> Self {
        Self::new(config.name.clone(), config.ceiling())
    }

    /// The tracked cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The recovery ceiling.
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// The current resolution state.
    pub fn state(&self) -> CookieState {
        self.state.borrow().clone()
    }

    /// Whether the race has settled.
    pub fn is_resolved(&self) -> bool {
        self.state.borrow().is_resolved()
    }

    /// The last known value, without waiting.
    pub fn current(&self) -> Option<String> {
        self.value.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Wait for the race to settle and return the last known value.
    ///
    /// Never waits past the ceiling measured from the bridge's creation.
    pub async fn resolve_cookie(&self) -> Option<String> {
        if !self.is_resolved() {
            let mut rx = self.state.subscribe();
            tokio::select! {
                _ = rx.wait_for(CookieState::is_resolved) => {}
                _ = sleep_until(self.deadline) => {
                    if self.settle(None) {
                        tracing::debug!(cookie = %self.name, "no restart message before ceiling");
                    }
                }
            }
        }
        self.current()
    }

    /// Feed a restart message from the page.
    ///
    /// Other message types are ignored.
    pub fn handle_message(&self, message: &ForegroundMessage) -> Result<(), BridgeError> {
        match message {
            ForegroundMessage::RestoreCookie { cookie } => self.receive(cookie.as_deref()),
        }
    }

    /// Accept the percent-encoded cookie the page sent, or `None` if it had none.
    ///
    /// A payload that does not decode leaves the state untouched.
    pub fn receive(&self, encoded: Option<&str>) -> Result<(), BridgeError> {
        let decoded = match encoded.map(decode_component).transpose() {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(cookie = %self.name, error = %e, "ignoring malformed restart message");
                return Err(e);
            }
        };

        self.store(decoded.clone());
        if !self.settle(decoded) {
            tracing::debug!(cookie = %self.name, "restart message after settlement");
        }
        Ok(())
    }

    /// Record a value written during this lifetime.
    pub fn set(&self, value: Option<String>) {
        self.store(value.clone());
        self.settle(value);
    }

    fn store(&self, value: Option<String>) {
        *self.value.write().unwrap_or_else(|e| e.into_inner()) = value;
    }

    /// Latch the race. Returns whether this call settled it.
    fn settle(&self, value: Option<String>) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_resolved() {
                return false;
            }
            *state = CookieState::Resolved(value);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn bridge() -> Arc<CookieBridge> {
        Arc::new(CookieBridge::new("minesweeper", Duration::from_millis(1000)))
    }

    // === Race Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_bridge_message_within_ceiling() {
        let bridge = bridge();
        let start = Instant::now();

        let waiter = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.resolve_cookie().await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        bridge.receive(Some("%7B%22rows%22%3A5%7D")).unwrap();

        let value = waiter.await.unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"rows":5}"#));
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert_eq!(bridge.state(), CookieState::Resolved(value));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_times_out_at_ceiling() {
        let bridge = bridge();
        let start = Instant::now();

        let value = bridge.resolve_cookie().await;

        assert_eq!(value, None);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        assert_eq!(bridge.state(), CookieState::Resolved(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_malformed_payload_stays_unresolved() {
        let bridge = bridge();
        let start = Instant::now();

        let result = bridge.receive(Some("%"));

        assert_eq!(result, Err(BridgeError::MalformedEscape(0)));
        assert_eq!(bridge.state(), CookieState::Unresolved);
        assert_eq!(bridge.resolve_cookie().await, None);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_null_cookie_resolves_immediately() {
        let bridge = bridge();
        let start = Instant::now();

        bridge
            .handle_message(&ForegroundMessage::RestoreCookie { cookie: None })
            .unwrap();

        assert_eq!(bridge.resolve_cookie().await, None);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_late_message_updates_value() {
        let bridge = bridge();
        assert_eq!(bridge.resolve_cookie().await, None);

        bridge.receive(Some("late")).unwrap();

        assert_eq!(bridge.state(), CookieState::Resolved(None));
        assert_eq!(bridge.resolve_cookie().await.as_deref(), Some("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_resolved_reads_do_not_wait() {
        let bridge = bridge();
        bridge.receive(Some("v")).unwrap();
        let start = Instant::now();

        for _ in 0..3 {
            assert_eq!(bridge.resolve_cookie().await.as_deref(), Some("v"));
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_concurrent_waiters_share_outcome() {
        let bridge = bridge();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let bridge = bridge.clone();
                tokio::spawn(async move { bridge.resolve_cookie().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        bridge.receive(Some("shared")).unwrap();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().as_deref(), Some("shared"));
        }
    }

    // === Write Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_bridge_set_updates_value() {
        let bridge = bridge();
        bridge.set(Some("written".to_string()));

        assert!(bridge.is_resolved());
        assert_eq!(bridge.current().as_deref(), Some("written"));
    }
}
