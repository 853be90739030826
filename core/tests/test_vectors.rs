//! Verify request preparation and assertion evaluation against JSON test
//! vectors stored in `test-vectors/`.
//!
//! Bodies that were JSON-encoded are compared as parsed JSON, not raw
//! strings, so the vectors do not depend on key spacing.

use reqcheck_core::http::HttpRequest;
use reqcheck_core::{evaluate, AssertionContext, RequestDescriptor};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Request preparation
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];
        let descriptor = RequestDescriptor::try_from(case["descriptor"].clone()).unwrap();

        let req = HttpRequest::prepare(&descriptor).unwrap_or_else(|err| panic!("{name}: {err}"));
        assert_eq!(req.method.as_str(), expected["method"], "{name}: method");
        assert_eq!(req.url.as_str(), expected["url"], "{name}: url");

        let headers: Map<String, Value> = req
            .headers
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(v.to_str().unwrap())))
            .collect();
        assert_eq!(Value::Object(headers), expected["headers"], "{name}: headers");

        let body = req.body.as_deref().map(|bytes| String::from_utf8(bytes.to_vec()).unwrap());
        match (&expected["body"], body) {
            (Value::Null, body) => assert_eq!(body, None, "{name}: body"),
            (Value::String(text), body) => assert_eq!(body.as_deref(), Some(text.as_str()), "{name}: body"),
            (json, Some(body)) => {
                let parsed: Value = serde_json::from_str(&body).unwrap();
                assert_eq!(&parsed, json, "{name}: body");
            }
            (_, None) => panic!("{name}: expected a body"),
        }
    }
}

#[test]
fn invalid_request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["invalid"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let descriptor = RequestDescriptor::try_from(case["descriptor"].clone()).unwrap();
        let err = HttpRequest::prepare(&descriptor).expect_err(name);
        assert_eq!(err.code(), case["code"], "{name}: code");
    }
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

#[test]
fn assertion_test_vectors() {
    let raw = include_str!("../../test-vectors/assertions.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let ctx = &vectors["context"];
    let context = AssertionContext {
        response: Some(ctx["response"].clone()),
        status_code: ctx["statusCode"].as_u64().map(|code| code as u16),
        error: Some(ctx["error"].clone()),
    };

    let cases = vectors["cases"].as_array().unwrap();
    let assertions: Vec<String> = cases
        .iter()
        .map(|case| case["assertion"].as_str().unwrap().to_string())
        .collect();
    let outcomes = evaluate(&assertions, &context);
    assert_eq!(outcomes.len(), cases.len());

    for (case, outcome) in cases.iter().zip(&outcomes) {
        let name = &outcome.assertion;
        assert_eq!(outcome.status, case["status"].as_bool().unwrap(), "{name}: {}", outcome.message);
        let expected_message = case["message"]
            .as_str()
            .unwrap_or("Assertion passed: Assertion passed successfully!");
        assert_eq!(outcome.message, expected_message, "{name}: message");
    }
}
