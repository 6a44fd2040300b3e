//! Transport abstraction and the reqwest-backed implementation.
//!
//! # Design
//! A `Connector` opens a `Session` from one request's `TransportConfig`; the
//! executor asks for a fresh session on every call instead of sharing a
//! process-wide client. A `Session` sends the request and resolves once the
//! response headers are in, handing back the body as a stream of chunks.
//! Dropping that stream aborts the transfer.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, ParamEncoding, TransportConfig};

pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Status line and headers of a response, plus its still-streaming body.
pub struct TransportResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ByteStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

pub trait Connector: Send + Sync {
    fn connect(&self, config: &TransportConfig) -> Result<Box<dyn Session>, TransportError>;
}

#[async_trait]
pub trait Session: Send + Sync {
    /// Send `request`, resolving when the response headers arrive.
    async fn send(&self, request: &HttpRequest) -> Result<TransportResponse, TransportError>;
}

/// Connector that builds a dedicated `reqwest::Client` per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestConnector;

impl Connector for ReqwestConnector {
    fn connect(&self, config: &TransportConfig) -> Result<Box<dyn Session>, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(max_idle) = config.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(max_idle);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        let client = builder.build()?;
        Ok(Box::new(ReqwestSession { client }))
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestSession {
    client: reqwest::Client,
}

impl ReqwestSession {
    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.params.is_empty() {
            return builder;
        }
        match request.encoding {
            ParamEncoding::JsonBody => builder.json(&request.params),
            ParamEncoding::UrlEncoded => {
                let pairs = form_pairs(request);
                if request.method.params_in_query() {
                    builder.query(&pairs)
                } else {
                    builder.form(&pairs)
                }
            }
        }
    }
}

#[async_trait]
impl Session for ReqwestSession {
    async fn send(&self, request: &HttpRequest) -> Result<TransportResponse, TransportError> {
        let response = self.build(request).send().await?;

        Ok(TransportResponse {
            url: response.url().to_string(),
            status: response.status().as_u16(),
            headers: header_pairs(response.headers()),
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from))
                .boxed(),
        })
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Owned copies of `headers`. Values that are not valid UTF-8 are decoded
/// lossily rather than dropped.
fn header_pairs(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = match value.to_str() {
                Ok(text) => text.to_string(),
                Err(_) => {
                    tracing::debug!(header = %name, "header value is not UTF-8, decoding lossily");
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                }
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}

/// Flatten params into `key=value` pairs; strings are used verbatim, other
/// values as their JSON text.
fn form_pairs(request: &HttpRequest) -> Vec<(String, String)> {
    request
        .params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}
