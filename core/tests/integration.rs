//! End-to-end runs against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port in its own runtime thread, then
//! drives `execute` and `run` over real HTTP. Covers success, client and
//! server errors, body decoding, redirects and the proxy path.
//!
//! One test sets proxy environment variables for the whole process. Every
//! other test either passes no proxy or an explicit one, so neither reads
//! them.

use std::net::SocketAddr;

use reqcheck_core::{execute, run, RequestDescriptor, TransportError};
use serde_json::{json, Value as Json};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
    });

    addr
}

fn descriptor(value: Json) -> RequestDescriptor {
    RequestDescriptor::try_from(value).unwrap()
}

fn strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn successful_get_populates_envelope() {
    let addr = start_server();
    let result = execute(descriptor(json!({"url": format!("http://{addr}/ok")})), None).await;

    assert!(result.is_success());
    assert_eq!(result.response.status, Some(200));
    assert_eq!(result.response.status_text.as_deref(), Some("OK"));
    let headers = result.response.headers.as_ref().unwrap();
    assert_eq!(headers.get("x-mock-server"), Some("1"));
    assert_eq!(headers.get("content-type"), Some("application/json"));
    assert_eq!(result.response.data.as_ref().unwrap()["ok"], true);
}

#[tokio::test]
async fn client_error_keeps_response_and_records_error() {
    let addr = start_server();
    let result = execute(descriptor(json!({"url": format!("http://{addr}/status/404")})), None).await;

    assert_eq!(result.response.status, Some(404));
    assert_eq!(result.response.data, Some(json!({"status": 404})));
    assert_eq!(result.error, Some(TransportError::Status { status: 404 }));
    assert_eq!(result.error.unwrap().code(), "ERR_BAD_REQUEST");
}

#[tokio::test]
async fn server_error_is_bad_response() {
    let addr = start_server();
    let result = execute(descriptor(json!({"url": format!("http://{addr}/status/500")})), None).await;

    assert_eq!(result.response.status, Some(500));
    assert_eq!(result.error.map(|e| e.code()), Some("ERR_BAD_RESPONSE"));
}

#[tokio::test]
async fn text_and_empty_bodies_decode_as_strings() {
    let addr = start_server();

    let text = execute(descriptor(json!({"url": format!("http://{addr}/text")})), None).await;
    assert_eq!(text.response.data, Some(json!("plain text body")));

    let empty = execute(descriptor(json!({"url": format!("http://{addr}/empty")})), None).await;
    assert_eq!(empty.response.status, Some(204));
    assert_eq!(empty.response.data, Some(json!("")));
    assert!(empty.is_success());
}

#[tokio::test]
async fn redirects_are_followed() {
    let addr = start_server();
    let result = execute(descriptor(json!({"url": format!("http://{addr}/redirect")})), None).await;

    assert_eq!(result.response.status, Some(200));
    assert_eq!(result.response.data.as_ref().unwrap()["ok"], true);
}

#[tokio::test]
async fn method_params_headers_and_body_reach_the_server() {
    let addr = start_server();
    let result = execute(
        descriptor(json!({
            "method": "patch",
            "url": format!("http://{addr}/echo"),
            "headers": {"X-Trace": "abc"},
            "params": {"page": 2},
            "data": {"name": "bolt"}
        })),
        None,
    )
    .await;

    let echoed = result.response.data.unwrap();
    assert_eq!(echoed["method"], "PATCH");
    assert_eq!(echoed["query"], json!([["page", "2"]]));
    assert_eq!(echoed["headers"]["x-trace"], "abc");
    assert_eq!(echoed["headers"]["content-type"], "application/json");
    assert_eq!(echoed["body"], json!({"name": "bolt"}));
    assert!(echoed["headers"]["user-agent"].as_str().unwrap().starts_with("reqcheck/"));
}

#[tokio::test]
async fn proxy_receives_absolute_form_request() {
    let addr = start_server();
    let result = execute(
        descriptor(json!({"url": "http://upstream.invalid/echo?via=proxy"})),
        Some(&addr.to_string()),
    )
    .await;

    assert!(result.is_success(), "{:?}", result.error);
    let echoed = result.response.data.unwrap();
    assert_eq!(echoed["uri"], "http://upstream.invalid/echo?via=proxy");
}

#[tokio::test]
async fn environment_proxies_are_ignored_without_explicit_proxy() {
    let addr = start_server();
    // nothing listens on port 1; a client honouring these would fail
    for var in ["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"] {
        std::env::set_var(var, "http://127.0.0.1:1");
    }
    let result = execute(descriptor(json!({"url": format!("http://{addr}/ok")})), None).await;

    assert_eq!(result.response.status, Some(200));
    assert_eq!(result.error, None);
}

#[tokio::test]
async fn run_reports_assertions_in_order() {
    let addr = start_server();
    let assertions = strings(&[
        "expect(context.statusCode).to.equal(404)",
        "expect(context.error.code).to.equal('ERR_BAD_REQUEST')",
        "expect(context.statusCode).to.equal(200)",
    ]);
    let report = run(
        descriptor(json!({"url": format!("http://{addr}/status/404"), "label": "missing"})),
        Some(assertions.as_slice()),
        None,
    )
    .await;

    let parsed: Json = serde_json::from_str(&report.render()).unwrap();
    assert_eq!(parsed["request"]["label"], "missing");
    assert_eq!(parsed["response"]["status"], 404);
    assert_eq!(parsed["response"]["statusText"], "Not Found");
    assert!(parsed.get("error").is_none());

    let outcomes = parsed["assertions"].as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0]["status"], true);
    assert_eq!(outcomes[1]["status"], true);
    assert_eq!(outcomes[2]["message"], "Assertion failed: expected 404 to equal 200");
}

#[tokio::test]
async fn run_without_assertions_reports_null() {
    let addr = start_server();
    let report = run(descriptor(json!({"url": format!("http://{addr}/ok")})), None, None).await;

    assert!(report.assertions.is_none());
    let parsed: Json = serde_json::from_str(&report.render()).unwrap();
    assert_eq!(parsed["assertions"], Json::Null);
}

#[tokio::test]
async fn connection_refused_reports_empty_response() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let assertions = strings(&["expect(context.error.code).to.equal('ECONNREFUSED')", "expect(context.response).to.be.undefined"]);
    let report = run(
        descriptor(json!({"url": format!("http://127.0.0.1:{port}/")})),
        Some(assertions.as_slice()),
        None,
    )
    .await;

    let parsed: Json = serde_json::from_str(&report.render()).unwrap();
    assert_eq!(parsed["response"], json!({}));
    assert!(parsed["assertions"].as_array().unwrap().iter().all(|o| o["status"] == true), "{parsed}");
}
