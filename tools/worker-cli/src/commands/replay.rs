//! Scripted request replay against an in-memory worker.
//!
//! A script describes what the network serves, which routes the app
//! registers, what the page sends on restart, and the requests to make:
//!
//! ```toml
//! [[fixture]]
//! url = "site.css"
//! body = "body { margin: 0 }"
//!
//! [[route]]
//! method = "GET"
//! path = "/"
//! body = "<h1>Minesweeper</h1>"
//!
//! [message]
//! cookie = "%7B%22rows%22%3A5%7D"
//! delay_ms = 100
//!
//! [[request]]
//! path = "/"
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use worker_sdk::prelude::*;
use worker_sdk::worker_bridge::foreground::document_cookie;
use worker_sdk::worker_core::memory::MemoryHost;
use worker_sdk::worker_core::header::{HeaderValue, CONTENT_TYPE};

use super::ReplayArgs;
use crate::context::Context;
use crate::output::{source_badge, status_badge};

const CLIENT_ID: &str = "replay";

/// A replay script.
#[derive(Debug, Default, Deserialize)]
pub struct ReplayScript {
    /// What the network answers.
    #[serde(default, rename = "fixture")]
    pub fixtures: Vec<Fixture>,

    /// Routes registered before the worker starts.
    #[serde(default, rename = "route")]
    pub routes: Vec<ScriptRoute>,

    /// The page's restart message. Without one the first requests wait out
    /// the cookie ceiling.
    #[serde(default)]
    pub message: Option<RestartMessage>,

    /// Take the network down after install.
    #[serde(default)]
    pub offline: bool,

    /// Requests dispatched concurrently.
    #[serde(default, rename = "request")]
    pub requests: Vec<ScriptRequest>,
}

/// A network response.
#[derive(Debug, Deserialize)]
pub struct Fixture {
    /// Full URL or path under the scope.
    pub url: String,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// A canned route handler.
#[derive(Debug, Deserialize)]
pub struct ScriptRoute {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub body: String,
    /// Set the bridged cookie to this value before answering.
    #[serde(default)]
    pub set_cookie: Option<String>,
}

/// What the page sends when the worker starts.
#[derive(Debug, Deserialize)]
pub struct RestartMessage {
    /// Percent-encoded cookie value; absent means the page has none.
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub delay_ms: u64,
}

/// One request.
#[derive(Debug, Deserialize)]
pub struct ScriptRequest {
    #[serde(default = "default_method")]
    pub method: String,
    /// Full URL or path under the scope, optionally with a query.
    pub path: String,
    /// URL-encoded form body.
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_status() -> u16 {
    200
}

fn default_method() -> String {
    "GET".to_string()
}

/// The answer to one scripted request.
#[derive(Debug, Serialize)]
pub struct ReplayOutcome {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub source: String,
    pub body: String,
    pub elapsed_ms: u64,
}

/// Everything a replay produced.
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub outcomes: Vec<ReplayOutcome>,
    /// Cookies the page was asked to persist, as it would write them.
    pub cookies: Vec<String>,
}

impl ReplayScript {
    /// Parse a script.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Run the replay command.
pub async fn run(args: ReplayArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.script);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read replay script: {}", path.display()))?;
    let script = ReplayScript::parse(&content)
        .with_context(|| format!("Failed to parse replay script: {}", path.display()))?;

    ctx.output.debug(&format!(
        "{} fixture(s), {} route(s), {} request(s)",
        script.fixtures.len(),
        script.routes.len(),
        script.requests.len()
    ));

    let report = execute(&script, ctx.config.clone()).await?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.header(&format!("Replay: {}", path.display()));
    for outcome in &report.outcomes {
        ctx.output.info(&format!(
            "{} {} -> {} ({}) {}ms",
            outcome.method,
            outcome.url,
            status_badge(outcome.status),
            source_badge(&outcome.source),
            outcome.elapsed_ms
        ));
        ctx.output.block(&outcome.body);
    }
    for cookie in &report.cookies {
        ctx.output.kv("set-cookie", cookie);
    }

    Ok(())
}

/// Start a worker on an in-memory host and run `script` against it.
pub async fn execute(script: &ReplayScript, config: WorkerConfig) -> Result<ReplayReport> {
    let host = MemoryHost::new();
    let page = host.clients.open(CLIENT_ID);
    for fixture in &script.fixtures {
        host.network
            .insert(&config.scope.resolve(&fixture.url), fixture_response(fixture)?);
    }

    let router = Router::new();
    for route in &script.routes {
        register(&router, route, &config.cookie.name)?;
    }

    let default_max_age = config.cookie.max_age;
    let scope = config.scope.clone();
    let worker = Arc::new(LifecycleManager::new(
        config,
        host.host(),
        Arc::new(MemoryCacheBackend::new()),
        Arc::new(router),
    ));
    let started = tokio::time::Instant::now();

    worker.install().await.context("Install failed")?;
    worker.activate().await.context("Activate failed")?;
    if script.offline {
        host.network.set_offline(true);
    }

    if let Some(message) = &script.message {
        let worker = worker.clone();
        let payload = serde_json::json!({
            "type": "be-nice-with-my-cookies",
            "cookie": message.cookie,
        });
        let delay = Duration::from_millis(message.delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            worker.handle_message(payload);
        });
    }

    let requests = script.requests.iter().map(|request| {
        let worker = worker.clone();
        let scope = scope.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(request.delay_ms)).await;
            let req = build_request(request, &scope)?;
            let (method, url) = (req.method().to_string(), req.url());

            let (event, rx) = FetchEvent::new(req);
            let source = worker.handle_fetch(event.with_client(CLIENT_ID)).await;
            let response = rx.recv().await?;

            Ok::<_, anyhow::Error>(ReplayOutcome {
                method,
                url,
                status: response.status().as_u16(),
                source: source.to_string(),
                body: response.text().into_owned(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            })
        }
    });
    let outcomes = join_all(requests)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let cookies = page
        .messages()
        .iter()
        .map(|message| document_cookie(message, default_max_age))
        .collect();

    Ok(ReplayReport { outcomes, cookies })
}

fn fixture_response(fixture: &Fixture) -> Result<Response> {
    let status = StatusCode::from_u16(fixture.status)
        .with_context(|| format!("Invalid status {} for {}", fixture.status, fixture.url))?;
    let mut response = Response::new(status).with_body(fixture.body.clone());
    if let Some(content_type) = &fixture.content_type {
        let value = HeaderValue::from_str(content_type)
            .with_context(|| format!("Invalid content type for {}", fixture.url))?;
        response = response.with_header_value(CONTENT_TYPE, value);
    }
    Ok(response)
}

fn register(router: &Router, route: &ScriptRoute, cookie_name: &str) -> Result<()> {
    let method = parse_method(&route.method)?;
    let body = route.body.clone();
    let set_cookie = route.set_cookie.clone();
    let cookie_name = cookie_name.to_string();

    router.route(method, route.path.clone(), move |_req, mut res: PseudoResponse, _next| {
        let body = body.clone();
        let set_cookie = set_cookie.clone();
        let cookie_name = cookie_name.clone();
        async move {
            if let Some(value) = set_cookie {
                res.cookie(&cookie_name, value, CookieOptions::default()).await?;
            }
            Ok(res.send(body))
        }
    });
    Ok(())
}

fn build_request(request: &ScriptRequest, scope: &Scope) -> Result<Request> {
    let method = parse_method(&request.method)?;
    let mut req = Request::new(method, &scope.resolve(&request.path))?;
    if let Some(form) = &request.form {
        req = req.with_form(form.clone());
    }
    Ok(req)
}

fn parse_method(method: &str) -> Result<Method> {
    match method.to_ascii_uppercase().parse::<Method>() {
        Ok(method) => Ok(method),
        Err(_) => bail!("Invalid method: {}", method),
    }
}
