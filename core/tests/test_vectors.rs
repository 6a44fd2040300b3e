//! Verify response parsing against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector describes a simulated response (status, body, rejection set),
//! the requested shape, and either the expected payload or the expected
//! error category. Payloads are compared as parsed JSON, not raw strings.

use std::collections::HashSet;

use courier_core::parser::encoding_for_label;
use courier_core::{parse, ErrorKind, ParseFailure, Payload, RawResponse, Shape};

fn shape_of(case: &serde_json::Value) -> Shape {
    match case["shape"].as_str().unwrap() {
        "object" => Shape::Object,
        "array" => Shape::Array,
        "text" => Shape::Text(case["encoding"].as_str().and_then(encoding_for_label)),
        other => panic!("unknown shape: {other}"),
    }
}

fn response_of(case: &serde_json::Value) -> RawResponse {
    let status = case["status"].as_u64().unwrap() as u16;
    let rejected: HashSet<u16> = case
        .get("rejected")
        .and_then(|r| r.as_array())
        .map(|codes| codes.iter().map(|c| c.as_u64().unwrap() as u16).collect())
        .unwrap_or_default();

    let response = RawResponse::new("http://localhost:3000/vector", status, Vec::new())
        .with_rejected_statuses(rejected);
    match case["body"].as_str() {
        Some(body) => response.with_body(body.to_string()),
        None => response,
    }
}

fn payload_json(payload: Payload) -> serde_json::Value {
    match payload {
        Payload::ObjectMap(map) => serde_json::Value::Object(map),
        Payload::ArrayOfMaps(items) => serde_json::to_value(items).unwrap(),
        Payload::String(text) => serde_json::Value::String(text),
        other => panic!("unexpected payload kind: {:?}", other.kind()),
    }
}

fn error_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::StatusCodeRejected => "status_code_rejected",
        ErrorKind::TransportFailure => "transport_failure",
        ErrorKind::ParseFailure(ParseFailure::NoData) => "no_data",
        ErrorKind::ParseFailure(ParseFailure::InvalidType) => "invalid_type",
        ErrorKind::ParseFailure(ParseFailure::InvalidData) => "invalid_data",
        ErrorKind::ParseFailure(ParseFailure::Unknown) => "unknown",
    }
}

#[test]
fn parse_test_vectors() {
    let raw = include_str!("../../test-vectors/parse.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let result = parse(&response_of(case), shape_of(case));

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.into_error().unwrap_or_else(|| panic!("{name}: expected an error"));
            assert_eq!(error_name(err.kind()), expected_error.as_str().unwrap(), "{name}: error kind");
        } else {
            let payload = result
                .into_result()
                .unwrap_or_else(|e| panic!("{name}: unexpected error {e}"));
            assert_eq!(payload_json(payload), case["expected_result"], "{name}: parsed result");
        }
    }
}
