use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect},
    routing::{any, get},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub fn app() -> Router {
    Router::new()
        .route("/ok", get(ok))
        .route("/echo", any(echo))
        .route("/status/{code}", get(status))
        .route("/text", get(text))
        .route("/empty", get(empty))
        .route("/redirect", get(redirect))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn ok() -> impl IntoResponse {
    (
        [("x-mock-server", "1")],
        Json(json!({"ok": true, "items": [{"id": 1, "name": "first"}, {"id": 2, "name": "second"}]})),
    )
}

/// Reflects the request back. `uri` keeps the absolute form a proxy receives.
async fn echo(
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.to_string(), Value::String(value))
        })
        .collect();
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    Json(json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "query": query,
        "headers": headers,
        "body": body,
    }))
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, Json(json!({"status": code}))))
}

async fn text() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "plain text body")
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn redirect() -> Redirect {
    Redirect::to("/ok")
}
