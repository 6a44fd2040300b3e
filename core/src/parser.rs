//! Turns a `RawResponse` into a typed `HttpResult`.
//!
//! # Design
//! Checks run in a fixed order so that cheaper, policy-level answers win
//! over decoding:
//! 1. a status in the request's rejection set fails without reading bytes;
//! 2. a no-body status (204, 205) succeeds with a fixed sentinel value;
//! 3. a response without bytes fails with `NoData`;
//! 4. only then are the bytes decoded for the requested shape.

use std::sync::Arc;

use encoding_rs::Encoding;
use serde_json::{json, Value};

use crate::error::{Error, ParseFailure};
use crate::http::{is_no_body_status, RawResponse};
use crate::payload::{JsonArray, JsonObject, Payload, PayloadValue};
use crate::result::HttpResult;

/// The payload shape a caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
    /// Text decoded with the given encoding; `None` means the caller had no
    /// encoding to offer.
    Text(Option<&'static Encoding>),
}

/// Parse `response` into the payload kind named by `shape`.
pub fn parse(response: &RawResponse, shape: Shape) -> HttpResult<Payload> {
    match shape {
        Shape::Object => parse_object(response).into_payload(),
        Shape::Array => parse_array(response).into_payload(),
        Shape::Text(encoding) => parse_text(response, encoding).into_payload(),
    }
}

impl RawResponse {
    pub fn parse(&self, shape: Shape) -> HttpResult<Payload> {
        parse(self, shape)
    }
}

pub fn parse_object(response: &RawResponse) -> HttpResult<JsonObject> {
    parse_json(response, success_object, |value| match value {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

/// Parse a JSON array whose every element is an object.
pub fn parse_array(response: &RawResponse) -> HttpResult<JsonArray> {
    parse_json(
        response,
        || vec![success_object()],
        |value| match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => None,
        },
    )
}

pub fn parse_text(response: &RawResponse, encoding: Option<&'static Encoding>) -> HttpResult<String> {
    let bytes = match body_of(response) {
        Ok(Body::NoBodyStatus) => return HttpResult::Success("success".to_string()),
        Ok(Body::Bytes(bytes)) => bytes,
        Err(err) => return HttpResult::Failure(err),
    };

    let Some(encoding) = encoding else {
        return HttpResult::Failure(parse_error(response, ParseFailure::InvalidType));
    };

    match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => HttpResult::Success(text.into_owned()),
        None => {
            tracing::debug!(
                url = %response.url(),
                encoding = encoding.name(),
                "response bytes are not valid in the requested encoding"
            );
            HttpResult::Failure(parse_error(response, ParseFailure::InvalidType))
        }
    }
}

/// Resolve an encoding label such as `"utf-8"` or `"latin1"`.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// The encoding named by the response's `content-type` charset, if any.
pub fn response_encoding(response: &RawResponse) -> Option<&'static Encoding> {
    response.charset().as_deref().and_then(encoding_for_label)
}

enum Body<'a> {
    NoBodyStatus,
    Bytes(&'a [u8]),
}

fn body_of(response: &RawResponse) -> Result<Body<'_>, Error> {
    if response.is_rejected() {
        return Err(Error::status_rejected(Arc::new(response.clone()), None));
    }
    if is_no_body_status(response.status()) {
        return Ok(Body::NoBodyStatus);
    }
    match response.body() {
        Some(bytes) => Ok(Body::Bytes(bytes)),
        None => Err(parse_error(response, ParseFailure::NoData)),
    }
}

fn parse_json<T: PayloadValue>(
    response: &RawResponse,
    sentinel: impl FnOnce() -> T,
    extract: impl FnOnce(Value) -> Option<T>,
) -> HttpResult<T> {
    let bytes = match body_of(response) {
        Ok(Body::NoBodyStatus) => return HttpResult::Success(sentinel()),
        Ok(Body::Bytes(bytes)) => bytes,
        Err(err) => return HttpResult::Failure(err),
    };

    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(url = %response.url(), error = %e, "response is not valid JSON");
            return HttpResult::Failure(parse_error(response, ParseFailure::Unknown).with_cause(e));
        }
    };

    match extract(value) {
        Some(payload) => HttpResult::Success(payload),
        None => HttpResult::Failure(parse_error(response, ParseFailure::InvalidType)),
    }
}

fn success_object() -> JsonObject {
    let mut map = JsonObject::new();
    map.insert("success".to_string(), json!(true));
    map
}

fn parse_error(response: &RawResponse, failure: ParseFailure) -> Error {
    Error::parse(failure).with_response(Arc::new(response.clone()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::payload::PayloadKind;

    fn response(status: u16, body: &'static [u8]) -> RawResponse {
        RawResponse::new("http://localhost:3000/test", status, Vec::new()).with_body(body)
    }

    fn failure_of<T>(result: HttpResult<T>) -> ParseFailure {
        result.into_error().and_then(|e| e.parse_failure()).unwrap()
    }

    #[test]
    fn object_round_trip() {
        let result = parse_object(&response(200, br#"{"a":1}"#));
        assert_eq!(result.value().unwrap()["a"], 1);
    }

    #[test]
    fn array_round_trip() {
        let result = parse_array(&response(200, br#"[{"a":1}]"#));
        let items = result.into_value().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["a"], 1);
    }

    #[test]
    fn text_round_trip() {
        let result = parse_text(&response(200, b"hello"), Some(encoding_rs::UTF_8));
        assert_eq!(result.into_value().unwrap(), "hello");
    }

    #[test]
    fn array_bytes_as_object_is_invalid_type() {
        let result = parse_object(&response(200, br#"[{"a":1}]"#));
        assert_eq!(failure_of(result), ParseFailure::InvalidType);
    }

    #[test]
    fn heterogeneous_array_is_invalid_type() {
        let result = parse_array(&response(200, br#"[{"a":1}, 2]"#));
        assert_eq!(failure_of(result), ParseFailure::InvalidType);
    }

    #[test]
    fn json_fragment_is_decoded_then_rejected_by_shape() {
        let result = parse_object(&response(200, b"42"));
        assert_eq!(failure_of(result), ParseFailure::InvalidType);
    }

    #[test]
    fn malformed_json_is_unknown_with_cause() {
        let err = parse_object(&response(200, b"{not json")).into_error().unwrap();
        assert_eq!(err.parse_failure(), Some(ParseFailure::Unknown));
        assert!(err.cause().is_some());
        assert_eq!(err.response().map(RawResponse::status), Some(200));
    }

    #[test]
    fn missing_body_is_no_data() {
        let bare = RawResponse::new("http://localhost:3000/test", 200, Vec::new());
        assert_eq!(failure_of(parse_object(&bare)), ParseFailure::NoData);
        assert_eq!(failure_of(parse_text(&bare, Some(encoding_rs::UTF_8))), ParseFailure::NoData);
    }

    #[test]
    fn no_body_statuses_yield_sentinels_regardless_of_bytes() {
        for status in [204, 205] {
            let with_junk = response(status, b"<<garbage>>");
            let object = parse_object(&with_junk).into_value().unwrap();
            assert_eq!(serde_json::Value::Object(object), json!({"success": true}));

            let bare = RawResponse::new("http://x", status, Vec::new());
            let array = parse_array(&bare).into_value().unwrap();
            assert_eq!(serde_json::to_value(array).unwrap(), json!([{"success": true}]));

            let text = parse_text(&bare, None).into_value().unwrap();
            assert_eq!(text, "success");
        }
    }

    #[test]
    fn rejected_status_short_circuits_before_bytes() {
        let rejected = response(401, br#"{"a":1}"#).with_rejected_statuses(HashSet::from([401]));
        for shape in [Shape::Object, Shape::Array, Shape::Text(Some(encoding_rs::UTF_8))] {
            let err = parse(&rejected, shape).into_error().unwrap();
            assert_eq!(err.kind(), ErrorKind::StatusCodeRejected);
        }
    }

    #[test]
    fn rejected_no_body_status_still_fails() {
        let rejected = response(204, b"").with_rejected_statuses(HashSet::from([204]));
        let err = parse_object(&rejected).into_error().unwrap();
        assert_eq!(err.kind(), ErrorKind::StatusCodeRejected);
    }

    #[test]
    fn text_without_encoding_is_invalid_type() {
        let result = parse_text(&response(200, b"hello"), None);
        assert_eq!(failure_of(result), ParseFailure::InvalidType);
    }

    #[test]
    fn text_with_malformed_bytes_is_invalid_type() {
        let result = parse_text(&response(200, b"\xff\xfe\xfd"), Some(encoding_rs::UTF_8));
        assert_eq!(failure_of(result), ParseFailure::InvalidType);
    }

    #[test]
    fn text_decodes_with_label_encoding() {
        let latin1 = encoding_for_label("latin1").unwrap();
        let result = parse_text(&response(200, b"caf\xe9"), Some(latin1));
        assert_eq!(result.into_value().unwrap(), "café");
        assert!(encoding_for_label("no-such-charset").is_none());
    }

    #[test]
    fn encoding_from_content_type() {
        let response = RawResponse::new(
            "http://x",
            200,
            vec![("content-type".to_string(), "text/html; charset=utf-8".to_string())],
        );
        assert_eq!(response_encoding(&response), Some(encoding_rs::UTF_8));
    }

    #[test]
    fn quoted_charset_lookalike_does_not_pick_encoding() {
        let response = RawResponse::new(
            "http://x",
            200,
            vec![(
                "content-type".to_string(),
                r#"text/plain; name="a;charset=latin1"; charset=utf-8"#.to_string(),
            )],
        )
        .with_body("café");
        let text = parse_text(&response, response_encoding(&response)).into_value();
        assert_eq!(text.as_deref(), Some("café"));
    }

    #[test]
    fn dynamic_parse_tags_payload() {
        let result = parse(&response(200, br#"{"a":1}"#), Shape::Object);
        assert_eq!(result.value().map(Payload::kind), Some(PayloadKind::ObjectMap));

        let result = parse(&response(200, br#"[]"#), Shape::Array);
        assert_eq!(result.value().map(Payload::kind), Some(PayloadKind::ArrayOfMaps));
    }
}
