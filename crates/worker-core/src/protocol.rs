//! Messages exchanged between the page and the worker.

use serde::{Deserialize, Serialize};

/// Page -> worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ForegroundMessage {
    /// Sent once per worker start with the percent-encoded tracked cookie.
    ///
    /// `cookie` is `null` when the page has no such cookie.
    #[serde(rename = "be-nice-with-my-cookies")]
    RestoreCookie { cookie: Option<String> },
}

impl ForegroundMessage {
    /// Interpret a raw message payload; anything unrecognised is `None`.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }
}

/// Worker -> page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackgroundMessage {
    /// Ask the page to persist the tracked cookie.
    #[serde(rename = "set-cookie", rename_all = "camelCase")]
    SetCookie {
        cookie_name: String,
        cookie_value: String,
        options: CookieOptions,
    },
}

/// Options passed along with a cookie write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieOptions {
    /// Lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
    /// Cookie path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CookieOptions {
    /// Options with a max-age.
    pub fn max_age(secs: u64) -> Self {
        Self {
            max_age: Some(secs),
            path: None,
        }
    }

    /// Set the cookie path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}
