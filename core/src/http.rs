//! HTTP request and response described as plain data.
//!
//! # Design
//! `HttpRequest::prepare` turns a descriptor into everything the transport
//! needs (method, final URL with query, headers, encoded body) without any
//! I/O, and `HttpResponse::into_envelope` normalizes what came back. The
//! executor only moves bytes between the two, so validation and decoding
//! are testable without a server.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde_json::Value as Json;

use crate::error::TransportError;
use crate::types::{Headers, RequestDescriptor, ResponseEnvelope};

const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// A validated request, ready to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn prepare(descriptor: &RequestDescriptor) -> Result<Self, TransportError> {
        let method = Method::from_bytes(descriptor.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| TransportError::BadOption(format!("Invalid HTTP method `{}`", descriptor.method)))?;

        let mut url = Url::parse(&descriptor.url).map_err(|_| TransportError::InvalidUrl {
            url: descriptor.url.clone(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl {
                url: descriptor.url.clone(),
            });
        }
        if !descriptor.params.is_empty() {
            url.query_pairs_mut().extend_pairs(descriptor.params.iter());
        }

        let mut headers = build_headers(&descriptor.headers)?;
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        }

        let body = match &descriptor.data {
            None => None,
            Some(Json::String(text)) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
                }
                Some(text.clone().into_bytes())
            }
            Some(data) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                }
                Some(data.to_string().into_bytes())
            }
        };

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }
}

pub fn build_headers(input: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| TransportError::BadOption(format!("Invalid header name `{key}`: {err}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|err| TransportError::BadOption(format!("Invalid header value for `{key}`: {err}")))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// A response as received, before decoding.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The transport failure this response represents, if any.
    pub fn failure(&self) -> Option<TransportError> {
        (!self.is_success()).then_some(TransportError::Status { status: self.status })
    }

    pub fn into_envelope(self) -> ResponseEnvelope {
        let mut headers = Headers::new();
        for (name, value) in &self.headers {
            headers.append(name, value);
        }
        ResponseEnvelope {
            headers: Some(headers),
            data: Some(decode_body(&self.body)),
            status: Some(self.status),
            status_text: Some(self.status_text),
        }
    }
}

/// JSON when the body parses as JSON, otherwise the text itself.
fn decode_body(body: &[u8]) -> Json {
    if body.is_empty() {
        return Json::String(String::new());
    }
    serde_json::from_slice(body).unwrap_or_else(|_| Json::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: Json) -> RequestDescriptor {
        RequestDescriptor::try_from(value).unwrap()
    }

    #[test]
    fn method_is_case_insensitive() {
        let req = HttpRequest::prepare(&descriptor(json!({"method": "post", "url": "http://localhost/x"}))).unwrap();
        assert_eq!(req.method, Method::POST);
    }

    #[test]
    fn params_are_appended_to_existing_query() {
        let req = HttpRequest::prepare(&descriptor(json!({
            "url": "http://localhost/search?q=1",
            "params": {"page": 2, "tag": "a b"}
        })))
        .unwrap();
        assert_eq!(req.url.as_str(), "http://localhost/search?q=1&page=2&tag=a+b");
    }

    #[test]
    fn json_body_gets_json_content_type() {
        let req = HttpRequest::prepare(&descriptor(json!({
            "method": "POST",
            "url": "http://localhost/users",
            "data": {"name": "ada"}
        })))
        .unwrap();
        assert_eq!(req.headers[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(req.headers[ACCEPT], DEFAULT_ACCEPT);
        assert_eq!(req.body.as_deref(), Some(br#"{"name":"ada"}"#.as_slice()));
    }

    #[test]
    fn string_body_is_sent_verbatim_as_form() {
        let req = HttpRequest::prepare(&descriptor(json!({
            "method": "POST",
            "url": "http://localhost/login",
            "data": "user=ada&pass=x"
        })))
        .unwrap();
        assert_eq!(req.headers[CONTENT_TYPE], FORM_CONTENT_TYPE);
        assert_eq!(req.body.as_deref(), Some(b"user=ada&pass=x".as_slice()));
    }

    #[test]
    fn explicit_content_type_wins() {
        let req = HttpRequest::prepare(&descriptor(json!({
            "method": "POST",
            "url": "http://localhost/raw",
            "headers": {"Content-Type": "text/plain"},
            "data": {"a": 1}
        })))
        .unwrap();
        assert_eq!(req.headers[CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn invalid_inputs_are_transport_errors() {
        let err = HttpRequest::prepare(&descriptor(json!({"url": "not a url"}))).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_URL");
        let err = HttpRequest::prepare(&descriptor(json!({"url": "ftp://localhost/file"}))).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_URL");
        let err = HttpRequest::prepare(&descriptor(json!({"method": "GE T", "url": "http://localhost"}))).unwrap_err();
        assert_eq!(err.code(), "ERR_BAD_OPTION_VALUE");
        let err = HttpRequest::prepare(&descriptor(json!({
            "url": "http://localhost",
            "headers": {"bad header": "x"}
        })))
        .unwrap_err();
        assert_eq!(err.code(), "ERR_BAD_OPTION_VALUE");
    }

    #[test]
    fn response_decoding() {
        let response = HttpResponse {
            status: 404,
            status_text: "Not Found".into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: br#"{"error":"missing"}"#.to_vec(),
        };
        assert_eq!(response.failure(), Some(TransportError::Status { status: 404 }));
        let envelope = response.into_envelope();
        assert_eq!(envelope.status, Some(404));
        assert_eq!(envelope.data, Some(json!({"error": "missing"})));
        assert_eq!(envelope.headers.unwrap().get("content-type"), Some("application/json"));
    }

    #[test]
    fn non_json_and_empty_bodies() {
        assert_eq!(decode_body(b"plain text"), json!("plain text"));
        assert_eq!(decode_body(b""), json!(""));
        assert_eq!(decode_body(b"42"), json!(42));
    }
}
