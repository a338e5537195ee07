//! The page's side of the cookie exchange.
//!
//! The page owns the durable cookie jar. It pushes the tracked cookie to the
//! worker after every restart and writes cookies the worker asks it to set.

use worker_core::{BackgroundMessage, ForegroundMessage};

use crate::encode_component;

/// Find `name` in a `document.cookie` style string and return its raw value.
///
/// The value is returned still percent-encoded.
pub fn extract_cookie_by_name(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .map(str::trim_start)
        .find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

/// The message the page posts to a freshly started worker.
pub fn restart_message(cookie_header: &str, name: &str) -> ForegroundMessage {
    ForegroundMessage::RestoreCookie {
        cookie: extract_cookie_by_name(cookie_header, name),
    }
}

/// The `document.cookie` assignment the page performs for a set-cookie message.
///
/// `default_max_age` applies when the message carries no max-age.
pub fn document_cookie(message: &BackgroundMessage, default_max_age: u64) -> String {
    match message {
        BackgroundMessage::SetCookie {
            cookie_name,
            cookie_value,
            options,
        } => {
            let mut cookie = format!(
                "{}={};max-age={}",
                cookie_name,
                encode_component(cookie_value),
                options.max_age.unwrap_or(default_max_age)
            );
            if let Some(path) = &options.path {
                cookie.push_str(";path=");
                cookie.push_str(path);
            }
            cookie
        }
    }
}
