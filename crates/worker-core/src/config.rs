//! Worker configuration.

use std::path::Path;
use std::time::Duration;

use http::Uri;
use serde::{Deserialize, Serialize};

use crate::WorkerError;

/// Complete worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// The origin and base path the worker controls.
    #[serde(default)]
    pub scope: Scope,

    /// The single cookie bridged from the page.
    #[serde(default)]
    pub cookie: CookieConfig,

    /// The static asset cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Enable speculative navigation preloads on activation.
    #[serde(default = "default_true")]
    pub navigation_preload: bool,
}

fn default_true() -> bool {
    true
}

impl WorkerConfig {
    /// Load config from a TOML or JSON file (chosen by extension).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorkerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkerError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content, path.extension().and_then(|e| e.to_str()) == Some("json"))
            .map_err(|e| WorkerError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse config text.
    pub fn parse(content: &str, json: bool) -> Result<Self, WorkerError> {
        if json {
            serde_json::from_str(content).map_err(|e| WorkerError::Config(e.to_string()))
        } else {
            toml::from_str(content).map_err(|e| WorkerError::Config(e.to_string()))
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, WorkerError> {
        toml::to_string_pretty(self).map_err(|e| WorkerError::Config(e.to_string()))
    }

    /// Set the controlled scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the bridged cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie.name = name.into();
        self
    }

    /// Set the cookie recovery ceiling.
    pub fn with_cookie_ceiling(mut self, ceiling: Duration) -> Self {
        self.cookie.ceiling_ms = ceiling.as_millis() as u64;
        self
    }

    /// Set the cache version.
    pub fn with_cache_version(mut self, version: impl Into<String>) -> Self {
        self.cache.version = version.into();
        self
    }

    /// Set the install manifest.
    pub fn with_manifest(mut self, manifest: Vec<&str>) -> Self {
        self.cache.manifest = manifest.into_iter().map(String::from).collect();
        self
    }

    /// Enable or disable navigation preload.
    pub fn with_navigation_preload(mut self, enabled: bool) -> Self {
        self.navigation_preload = enabled;
        self
    }
}

/// The origin and path prefix under the worker's control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// `scheme://host[:port]` of the controlled origin.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Path prefix of the scope (default `/`).
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

fn default_origin() -> String {
    "http://localhost:3003".to_string()
}

fn default_base_path() -> String {
    "/".to_string()
}

impl Default for Scope {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            base_path: default_base_path(),
        }
    }
}

impl Scope {
    /// Create a scope rooted at `/` of an origin.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            base_path: default_base_path(),
        }
    }

    /// Set the base path.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// The path of `uri` relative to this scope, keeping a leading `/`.
    ///
    /// `None` if the URL belongs to another origin or lies outside the base path.
    pub fn relative_path<'a>(&self, uri: &'a Uri) -> Option<&'a str> {
        let origin = match (uri.scheme_str(), uri.authority()) {
            (Some(scheme), Some(authority)) => format!("{}://{}", scheme, authority),
            _ => return None,
        };
        if !origin.eq_ignore_ascii_case(self.origin.trim_end_matches('/')) {
            return None;
        }

        let base = self.base_path.trim_end_matches('/');
        let path = uri.path();
        let rest = path.strip_prefix(base)?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Resolve a scope-relative path (e.g. a manifest entry) to a full URL.
    pub fn resolve(&self, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        let base = self.base_path.trim_end_matches('/');
        format!(
            "{}{}/{}",
            self.origin.trim_end_matches('/'),
            base,
            path.trim_start_matches('/')
        )
    }
}

/// The cookie carried across worker restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Cookie name.
    #[serde(default = "default_cookie_name")]
    pub name: String,
    /// How long a cold start waits for the page to restore the cookie.
    #[serde(default = "default_ceiling_ms")]
    pub ceiling_ms: u64,
    /// `max-age` the page writes the cookie with.
    #[serde(default = "default_max_age")]
    pub max_age: u64,
}

fn default_cookie_name() -> String {
    "minesweeper".to_string()
}

fn default_ceiling_ms() -> u64 {
    1000
}

fn default_max_age() -> u64 {
    315_360_000_000
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            ceiling_ms: default_ceiling_ms(),
            max_age: default_max_age(),
        }
    }
}

impl CookieConfig {
    /// The recovery ceiling as a duration.
    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.ceiling_ms)
    }
}

/// The static asset cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Generation name prefix.
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
    /// Generation version; bump to invalidate clients' caches.
    #[serde(default = "default_cache_version")]
    pub version: String,
    /// Scope-relative asset paths fetched at install.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,
}

fn default_cache_prefix() -> String {
    "minesweeper-service-worker-cache".to_string()
}

fn default_cache_version() -> String {
    "1".to_string()
}

fn default_manifest() -> Vec<String> {
    [
        "favicon.ico",
        "android-chrome-192x192.png",
        "android-chrome-512x512.png",
        "apple-touch-icon.png",
        "favicon-16x16.png",
        "favicon-32x32.png",
        "site.webmanifest",
        "site.css",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: default_cache_prefix(),
            version: default_cache_version(),
            manifest: default_manifest(),
        }
    }
}
