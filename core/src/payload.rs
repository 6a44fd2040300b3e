//! The closed set of payload kinds a response can be parsed into.
//!
//! # Design
//! Payload kinds are fixed: a JSON object, a JSON array of objects, a
//! string, an error, or nothing. `PayloadValue` is sealed so the set cannot
//! grow outside this crate, and every kind reports a `PayloadKind` tag.
//! Code that handles payloads of unknown kind matches on `Payload`, never on
//! runtime type information.

use serde_json::{Map, Value};

use crate::error::Error;

pub type JsonObject = Map<String, Value>;
pub type JsonArray = Vec<JsonObject>;

/// Tag naming one payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    ObjectMap,
    ArrayOfMaps,
    String,
    Error,
    Empty,
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::JsonObject {}
    impl Sealed for super::JsonArray {}
    impl Sealed for String {}
    impl Sealed for crate::error::Error {}
    impl Sealed for () {}
}

/// A concrete payload type. Implemented only for the five payload kinds.
pub trait PayloadValue: sealed::Sealed + Sized {
    const KIND: PayloadKind;

    /// Hook for payload kinds that can carry an error of their own. None of
    /// the built-in kinds do.
    fn internal_error() -> Option<Error> {
        None
    }

    fn into_payload(self) -> Payload;

    /// Extract this kind from a `Payload`, handing the payload back when
    /// its tag does not match.
    fn from_payload(payload: Payload) -> Result<Self, Payload>;
}

impl PayloadValue for JsonObject {
    const KIND: PayloadKind = PayloadKind::ObjectMap;

    fn into_payload(self) -> Payload {
        Payload::ObjectMap(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, Payload> {
        match payload {
            Payload::ObjectMap(map) => Ok(map),
            other => Err(other),
        }
    }
}

impl PayloadValue for JsonArray {
    const KIND: PayloadKind = PayloadKind::ArrayOfMaps;

    fn into_payload(self) -> Payload {
        Payload::ArrayOfMaps(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, Payload> {
        match payload {
            Payload::ArrayOfMaps(items) => Ok(items),
            other => Err(other),
        }
    }
}

impl PayloadValue for String {
    const KIND: PayloadKind = PayloadKind::String;

    fn into_payload(self) -> Payload {
        Payload::String(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, Payload> {
        match payload {
            Payload::String(text) => Ok(text),
            other => Err(other),
        }
    }
}

impl PayloadValue for Error {
    const KIND: PayloadKind = PayloadKind::Error;

    fn into_payload(self) -> Payload {
        Payload::Error(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, Payload> {
        match payload {
            Payload::Error(err) => Ok(err),
            other => Err(other),
        }
    }
}

impl PayloadValue for () {
    const KIND: PayloadKind = PayloadKind::Empty;

    fn into_payload(self) -> Payload {
        Payload::Empty
    }

    fn from_payload(payload: Payload) -> Result<Self, Payload> {
        match payload {
            Payload::Empty => Ok(()),
            other => Err(other),
        }
    }
}

/// A payload of any kind.
#[derive(Debug, Clone)]
pub enum Payload {
    ObjectMap(JsonObject),
    ArrayOfMaps(JsonArray),
    String(String),
    Error(Error),
    Empty,
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::ObjectMap(_) => PayloadKind::ObjectMap,
            Payload::ArrayOfMaps(_) => PayloadKind::ArrayOfMaps,
            Payload::String(_) => PayloadKind::String,
            Payload::Error(_) => PayloadKind::Error,
            Payload::Empty => PayloadKind::Empty,
        }
    }

    pub fn as_object(&self) -> Option<&JsonObject> {
        match self {
            Payload::ObjectMap(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&JsonArray> {
        match self {
            Payload::ArrayOfMaps(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::String(text) => Some(text),
            _ => None,
        }
    }

    /// Convert to a concrete payload type, handing the payload back on a
    /// tag mismatch.
    pub fn downcast<T: PayloadValue>(self) -> Result<T, Payload> {
        T::from_payload(self)
    }
}
