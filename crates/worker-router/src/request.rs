//! The read-only request facade handed to handlers.

use std::collections::HashMap;
use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use worker_core::{header, EventInfo, Method, FORM_URLENCODED};

/// One form field, scalar until the field repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    /// The field appeared once.
    Single(String),
    /// The field appeared more than once, in submission order.
    Multiple(Vec<String>),
}

impl FormValue {
    /// The value if the field appeared exactly once.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            FormValue::Single(value) => Some(value),
            FormValue::Multiple(_) => None,
        }
    }

    /// Every submitted value, in order.
    pub fn values(&self) -> &[String] {
        match self {
            FormValue::Single(value) => std::slice::from_ref(value),
            FormValue::Multiple(values) => values,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            FormValue::Single(first) => {
                *self = FormValue::Multiple(vec![std::mem::take(first), value]);
            }
            FormValue::Multiple(values) => values.push(value),
        }
    }
}

/// A parsed form-encoded body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    fields: HashMap<String, FormValue>,
}

impl FormBody {
    /// Parse `application/x-www-form-urlencoded` text.
    ///
    /// Repeated fields coalesce into [`FormValue::Multiple`].
    pub fn parse(input: &str) -> Self {
        let mut fields: HashMap<String, FormValue> = HashMap::new();
        for (key, value) in form_pairs(input) {
            match fields.get_mut(&key) {
                Some(existing) => existing.push(value),
                None => {
                    fields.insert(key, FormValue::Single(value));
                }
            }
        }
        Self { fields }
    }

    /// Look up a field.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.get(name)
    }

    /// Number of distinct fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field was submitted.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Split form-encoded text into decoded pairs.
fn form_pairs(input: &str) -> impl Iterator<Item = (String, String)> + '_ {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (form_decode(key), form_decode(value))
        })
}

fn form_decode(s: &str) -> String {
    let s = s.replace('+', " ");
    percent_decode_str(&s).decode_utf8_lossy().into_owned()
}

/// Read-only view of one intercepted request.
///
/// Each accessor computes its value on first use and returns the same value
/// for the rest of the event.
#[derive(Debug)]
pub struct PseudoRequest {
    event: EventInfo,
    cookie_name: String,
    cookie_value: Option<String>,
    query: OnceLock<HashMap<String, String>>,
    body: OnceLock<FormBody>,
    cookies: OnceLock<HashMap<String, String>>,
}

impl PseudoRequest {
    /// Wrap an event with the cookie value the bridge recovered.
    pub fn new(event: EventInfo, cookie_name: impl Into<String>, cookie_value: Option<String>) -> Self {
        Self {
            event,
            cookie_name: cookie_name.into(),
            cookie_value,
            query: OnceLock::new(),
            body: OnceLock::new(),
            cookies: OnceLock::new(),
        }
    }

    /// The full request URL.
    pub fn url(&self) -> String {
        self.event.request().url()
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        self.event.request().method()
    }

    /// The raw event.
    pub fn event(&self) -> &EventInfo {
        &self.event
    }

    /// Query parameters; a repeated parameter keeps its last value.
    pub fn query(&self) -> &HashMap<String, String> {
        self.query.get_or_init(|| {
            self.event
                .request()
                .query()
                .map(|q| form_pairs(q).collect())
                .unwrap_or_default()
        })
    }

    /// The parsed form body. Empty for anything but a well-formed POST.
    pub fn body(&self) -> &FormBody {
        self.body.get_or_init(|| self.parse_body())
    }

    /// The bridged cookie, keyed by its name, if it has a value.
    pub fn cookies(&self) -> &HashMap<String, String> {
        self.cookies.get_or_init(|| {
            self.cookie_value
                .iter()
                .map(|value| (self.cookie_name.clone(), value.clone()))
                .collect()
        })
    }

    fn parse_body(&self) -> FormBody {
        let request = self.event.request();
        if !request.is_method(&Method::POST) {
            return FormBody::default();
        }

        let content_type = request.header(header::CONTENT_TYPE.as_str());
        let is_form = content_type
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .eq_ignore_ascii_case(FORM_URLENCODED)
            })
            .unwrap_or(true);
        if !is_form {
            tracing::debug!(url = %request.url(), content_type = ?content_type, "unsupported body, using empty form");
            return FormBody::default();
        }

        match std::str::from_utf8(request.body()) {
            Ok(text) => FormBody::parse(text),
            Err(e) => {
                tracing::debug!(url = %request.url(), error = %e, "undecodable body, using empty form");
                FormBody::default()
            }
        }
    }
}
