use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::app;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- fixed responses ---

#[tokio::test]
async fn ok_returns_json_and_marker_header() {
    let resp = app().oneshot(get("/ok")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-mock-server"], "1");
    let body: Value = body_json(resp).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn status_route_returns_requested_code() {
    let resp = app().oneshot(get("/status/503")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({"status": 503}));
}

#[tokio::test]
async fn status_route_rejects_invalid_code() {
    let resp = app().oneshot(get("/status/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn text_route_is_plain_text() {
    let resp = app().oneshot(get("/text")).await.unwrap();

    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "text/plain");
    assert_eq!(&body_bytes(resp).await[..], b"plain text body");
}

#[tokio::test]
async fn empty_route_has_no_body() {
    let resp = app().oneshot(get("/empty")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn redirect_points_at_ok() {
    let resp = app().oneshot(get("/redirect")).await.unwrap();

    assert!(resp.status().is_redirection());
    assert_eq!(resp.headers()[http::header::LOCATION], "/ok");
}

// --- echo ---

#[tokio::test]
async fn echo_reflects_method_query_headers_and_body() {
    let mut req = json_request("PUT", "/echo?a=1&b=two", r#"{"n":5}"#);
    req.headers_mut().insert("x-trace", "abc".parse().unwrap());
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["method"], "PUT");
    assert_eq!(body["uri"], "/echo?a=1&b=two");
    assert_eq!(body["query"], json!([["a", "1"], ["b", "two"]]));
    assert_eq!(body["headers"]["x-trace"], "abc");
    assert_eq!(body["body"], json!({"n": 5}));
}

#[tokio::test]
async fn echo_keeps_non_json_body_as_string() {
    let req = Request::builder()
        .method("POST")
        .uri("/echo")
        .body("a=1&b=2".to_string())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    let body: Value = body_json(resp).await;
    assert_eq!(body["body"], "a=1&b=2");
    assert_eq!(body["query"], json!([]));
}

#[tokio::test]
async fn echo_without_body_reports_null() {
    let resp = app().oneshot(get("/echo")).await.unwrap();
    let body: Value = body_json(resp).await;
    assert_eq!(body["method"], "GET");
    assert_eq!(body["body"], Value::Null);
}
