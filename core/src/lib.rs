//! Asynchronous HTTP request execution with typed, classified results.
//!
//! # Overview
//! A `RequestExecutor` runs one `HttpRequest` over a pluggable transport,
//! accumulates the streamed body, and hands back a `RawResponse` (or a
//! classified `Error`). Parsing the response into a JSON object, a JSON
//! array of objects, or text is a separate step that yields an
//! `HttpResult<T>`.
//!
//! # Design
//! - The transport sits behind the `Connector`/`Session` traits; each call
//!   opens its own session from the request's `TransportConfig`.
//!   `ReqwestConnector` is the production implementation.
//! - Outcomes are classified by `ErrorKind`: the caller's rejection policy,
//!   the transport, or the payload.
//! - Payload kinds are a closed set, tagged by `PayloadKind`.
//! - Every response carries a `ClockTimeline` for latency breakdowns.

pub mod error;
pub mod executor;
pub mod http;
pub mod parser;
pub mod payload;
pub mod result;
pub mod timeline;
pub mod transport;

pub use error::{Error, ErrorKind, ExecuteError, ParseFailure, TransportError};
pub use executor::{ExecutorObserver, Outcome, RequestExecutor, TaskState};
pub use http::{HttpMethod, HttpRequest, ParamEncoding, RawResponse, TransportConfig};
pub use parser::{parse, parse_array, parse_object, parse_text, Shape};
pub use payload::{JsonArray, JsonObject, Payload, PayloadKind, PayloadValue};
pub use result::HttpResult;
pub use timeline::{ClockTimeline, LatencyBreakdown, TimelineError};
pub use transport::{Connector, ReqwestConnector, Session, TransportResponse};
