//! The typed outcome of parsing a response.

use crate::error::Error;
use crate::payload::{Payload, PayloadKind, PayloadValue};

/// Exactly one of a typed payload or a classified error.
#[derive(Debug, Clone)]
pub enum HttpResult<T> {
    Success(T),
    Failure(Error),
}

impl<T> HttpResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, HttpResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            HttpResult::Success(value) => Some(value),
            HttpResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            HttpResult::Success(_) => None,
            HttpResult::Failure(err) => Some(err),
        }
    }

    pub fn into_value(self) -> Option<T> {
        self.into_result().ok()
    }

    pub fn into_error(self) -> Option<Error> {
        self.into_result().err()
    }

    pub fn into_result(self) -> Result<T, Error> {
        match self {
            HttpResult::Success(value) => Ok(value),
            HttpResult::Failure(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> HttpResult<U> {
        match self {
            HttpResult::Success(value) => HttpResult::Success(f(value)),
            HttpResult::Failure(err) => HttpResult::Failure(err),
        }
    }
}

impl<T: PayloadValue> HttpResult<T> {
    /// Tag of the payload kind this result carries on success.
    pub fn kind(&self) -> PayloadKind {
        T::KIND
    }

    pub fn into_payload(self) -> HttpResult<Payload> {
        self.map(PayloadValue::into_payload)
    }
}

impl<T> From<Result<T, Error>> for HttpResult<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => HttpResult::Success(value),
            Err(err) => HttpResult::Failure(err),
        }
    }
}

impl<T> From<HttpResult<T>> for Result<T, Error> {
    fn from(result: HttpResult<T>) -> Self {
        result.into_result()
    }
}
