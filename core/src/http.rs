//! Request and response values exchanged with the transport.
//!
//! # Design
//! `HttpRequest` is plain data: the executor reads it but never mutates it
//! once dispatched, and each request carries its own `TransportConfig` so
//! no session is ever shared between calls. `RawResponse` is built when the
//! headers arrive and only gains its byte buffer at completion, at which
//! point it is handed to the caller and no longer changes.
//!
//! Headers use owned `(String, String)` pairs so values stay independent of
//! any particular transport's header types.

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timeline::ClockTimeline;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether URL-encoded parameters travel in the query string rather
    /// than in a form body.
    pub fn params_in_query(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How request parameters are encoded on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamEncoding {
    #[default]
    UrlEncoded,
    JsonBody,
}

/// Per-request transport settings. Every field is optional; unset fields
/// fall back to the transport's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Whole-request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub pool_max_idle_per_host: Option<usize>,
    pub user_agent: Option<String>,
}

impl TransportConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: Map<String, Value>,
    pub encoding: ParamEncoding,
    /// Statuses treated as failures regardless of the body.
    pub rejected_statuses: HashSet<u16>,
    pub transport: TransportConfig,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            params: Map::new(),
            encoding: ParamEncoding::default(),
            rejected_statuses: HashSet::new(),
            transport: TransportConfig::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn encoding(mut self, encoding: ParamEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn reject_status(mut self, status: u16) -> Self {
        self.rejected_statuses.insert(status);
        self
    }

    pub fn reject_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.rejected_statuses.extend(statuses);
        self
    }

    pub fn transport(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }
}

/// Status codes whose responses carry no body. Parsing them never touches
/// the byte buffer.
pub const NO_BODY_STATUSES: [u16; 2] = [204, 205];

pub fn is_no_body_status(status: u16) -> bool {
    NO_BODY_STATUSES.contains(&status)
}

/// A response as delivered by the transport, before any typed parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    timeline: ClockTimeline,
    rejected_statuses: HashSet<u16>,
}

impl RawResponse {
    pub fn new(url: impl Into<String>, status: u16, headers: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            status,
            headers,
            body: None,
            timeline: ClockTimeline::default(),
            rejected_statuses: HashSet::new(),
        }
    }

    /// Attach the received bytes. An empty buffer leaves the response
    /// without a body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    pub fn with_timeline(mut self, timeline: ClockTimeline) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn with_rejected_statuses(mut self, statuses: HashSet<u16>) -> Self {
        self.rejected_statuses = statuses;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive lookup of the first header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn timeline(&self) -> &ClockTimeline {
        &self.timeline
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected_statuses.contains(&self.status)
    }

    /// The charset parameter of the `content-type` header, if any.
    pub fn charset(&self) -> Option<String> {
        let content_type = self.header("content-type")?.parse::<mime::Mime>().ok()?;
        content_type
            .get_param(mime::CHARSET)
            .map(|charset| charset.as_str().to_string())
    }
}

/// Renders `headers : status : url`, leaving out the headers when there are
/// none.
impl std::fmt::Display for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.headers.is_empty() {
            f.write_str("{")?;
            for (i, (name, value)) in self.headers.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name}: {value}")?;
            }
            f.write_str("} : ")?;
        }
        write!(f, "{} : {}", self.status, self.url)
    }
}
