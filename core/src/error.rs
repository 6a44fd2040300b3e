//! Error classification for request outcomes.
//!
//! # Design
//! Every failed request ends in exactly one `Error` whose `ErrorKind` says
//! who is at fault: the caller's rejection policy (`StatusCodeRejected`),
//! the network (`TransportFailure`), or the payload (`ParseFailure`). Errors
//! optionally hold shared references to the response and request that
//! produced them. Those references are read-only and exist only for
//! diagnostics; errors are never retried.

use std::sync::Arc;

use thiserror::Error as ThisError;

use crate::executor::TaskState;
use crate::http::{HttpRequest, RawResponse};

/// Why a payload could not be produced from a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ParseFailure {
    /// The response carried no bytes and its status expects a body.
    #[error("no data")]
    NoData,

    /// The bytes decoded, but not into the requested shape.
    #[error("invalid type")]
    InvalidType,

    /// The bytes are structurally unusable for the requested shape.
    #[error("invalid data")]
    InvalidData,

    /// The decoder failed; the cause holds the decoder error.
    #[error("unknown cause")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    #[error("status code rejected")]
    StatusCodeRejected,

    #[error("transport failure")]
    TransportFailure,

    #[error("parse failure: {0}")]
    ParseFailure(ParseFailure),
}

type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A classified request failure.
#[derive(Debug, Clone, ThisError)]
#[error("{kind}{}", status_suffix(.response.as_deref()))]
pub struct Error {
    kind: ErrorKind,
    #[source]
    cause: Option<Cause>,
    response: Option<Arc<RawResponse>>,
    request: Option<Arc<HttpRequest>>,
}

fn status_suffix(response: Option<&RawResponse>) -> String {
    response
        .map(|r| format!(" (HTTP {})", r.status()))
        .unwrap_or_default()
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            cause: None,
            response: None,
            request: None,
        }
    }

    /// The response's status is in the request's rejection set.
    pub fn status_rejected(response: Arc<RawResponse>, request: Option<Arc<HttpRequest>>) -> Self {
        Self {
            kind: ErrorKind::StatusCodeRejected,
            cause: None,
            response: Some(response),
            request,
        }
    }

    pub fn transport(cause: TransportError, request: Option<Arc<HttpRequest>>) -> Self {
        Self {
            kind: ErrorKind::TransportFailure,
            cause: Some(Arc::new(cause)),
            response: None,
            request,
        }
    }

    pub fn parse(failure: ParseFailure) -> Self {
        Self::new(ErrorKind::ParseFailure(failure))
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_response(mut self, response: Arc<RawResponse>) -> Self {
        self.response = Some(response);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The parse failure category, when this is a parse error.
    pub fn parse_failure(&self) -> Option<ParseFailure> {
        match self.kind {
            ErrorKind::ParseFailure(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn response(&self) -> Option<&RawResponse> {
        self.response.as_deref()
    }

    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_deref()
    }
}

/// Failures reported by a transport while sending or streaming.
#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("response body failed: {0}")]
    Body(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else if err.is_builder() || err.is_request() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Other(Box::new(err))
        }
    }
}

/// Misuse of a `RequestExecutor`, reported synchronously by `execute`.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ExecuteError {
    /// Executors run a single task; this one is not idle.
    #[error("executor already started (state: {0:?})")]
    AlreadyStarted(TaskState),

    #[error("execute called outside a tokio runtime")]
    NoRuntime,
}
