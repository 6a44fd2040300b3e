use std::{collections::HashMap, convert::Infallible, time::Duration};

use axum::{
    body::Body,
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// What `/echo` reports back about the request it received.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub method: String,
    pub query: HashMap<String, String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Deserialize)]
pub struct StreamParams {
    #[serde(default = "default_chunks")]
    pub chunks: u32,
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_chunks() -> u32 {
    3
}

#[derive(Deserialize)]
pub struct DelayParams {
    #[serde(default)]
    pub delay_ms: u64,
}

pub fn app() -> Router {
    Router::new()
        .route("/json/object", get(json_object))
        .route("/json/array", get(json_array))
        .route("/text", get(text))
        .route("/latin1", get(latin1))
        .route("/empty", any(empty))
        .route("/status/{code}", any(status))
        .route("/echo", any(echo))
        .route("/stream", get(stream))
        .route("/slow", get(slow))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn json_object() -> Json<Value> {
    Json(json!({"a": 1}))
}

async fn json_array() -> Json<Value> {
    Json(json!([{"a": 1}, {"a": 2}]))
}

async fn text() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "hello")
}

async fn latin1() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=iso-8859-1")],
        Bytes::from_static(b"caf\xe9"),
    )
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, Json(json!({"status": code}))))
}

async fn echo(
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Json<Echo> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(Echo {
        method: method.to_string(),
        query,
        content_type,
        body,
    })
}

/// Streams `chunks` numbered lines, sleeping `delay_ms` before each one.
async fn stream(Query(params): Query<StreamParams>) -> Response {
    let delay = Duration::from_millis(params.delay_ms);
    let total = params.chunks;
    let chunks = futures::stream::unfold(0u32, move |i| async move {
        if i >= total {
            return None;
        }
        tokio::time::sleep(delay).await;
        Some((Ok::<_, Infallible>(Bytes::from(format!("chunk-{i}\n"))), i + 1))
    });
    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(chunks))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn slow(Query(params): Query<DelayParams>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(params.delay_ms)).await;
    Json(json!({"slow": true}))
}
