//! Data model shared by the executor, the evaluator and the report.
//!
//! # Design
//! `RequestDescriptor` keeps the JSON it was parsed from so the report can
//! echo the caller's input byte-for-byte in meaning (unknown fields
//! included), while the typed fields drive the transport. Everything else
//! is built fresh per invocation and serialized once.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::{DescriptorError, TransportError};

/// One HTTP request to perform.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "Json", into = "Json")]
pub struct RequestDescriptor {
    /// HTTP method as given; compared case-insensitively. Defaults to `GET`.
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    /// Body payload; `None` when absent or `null`.
    pub data: Option<Json>,
    source: Json,
}

impl RequestDescriptor {
    /// The input this descriptor was parsed from, unmodified.
    pub fn source(&self) -> &Json {
        &self.source
    }
}

impl TryFrom<Json> for RequestDescriptor {
    type Error = DescriptorError;

    fn try_from(source: Json) -> Result<Self, Self::Error> {
        let Json::Object(fields) = &source else {
            return Err(DescriptorError::NotAnObject);
        };
        let method = match fields.get("method") {
            None | Some(Json::Null) => "GET".to_string(),
            Some(Json::String(m)) => m.clone(),
            Some(_) => return Err(DescriptorError::InvalidField { field: "method", expected: "a string" }),
        };
        let url = match fields.get("url") {
            None | Some(Json::Null) => String::new(),
            Some(Json::String(u)) => u.clone(),
            Some(_) => return Err(DescriptorError::InvalidField { field: "url", expected: "a string" }),
        };
        let headers = string_pairs(fields, "headers", false)?;
        let params = string_pairs(fields, "params", true)?;
        let data = match fields.get("data") {
            None | Some(Json::Null) => None,
            Some(d) => Some(d.clone()),
        };
        Ok(Self {
            method,
            url,
            headers,
            params,
            data,
            source,
        })
    }
}

impl From<RequestDescriptor> for Json {
    fn from(descriptor: RequestDescriptor) -> Self {
        descriptor.source
    }
}

/// Flatten a `{name: scalar}` object into string pairs, skipping nulls.
///
/// With `expand_arrays`, `{ids: [1, 2]}` becomes `ids[]=1`, `ids[]=2`.
fn string_pairs(
    fields: &Map<String, Json>,
    field: &'static str,
    expand_arrays: bool,
) -> Result<Vec<(String, String)>, DescriptorError> {
    let entries = match fields.get(field) {
        None | Some(Json::Null) => return Ok(Vec::new()),
        Some(Json::Object(entries)) => entries,
        Some(_) => return Err(DescriptorError::InvalidField { field, expected: "an object" }),
    };
    let mut pairs = Vec::with_capacity(entries.len());
    for (name, value) in entries {
        match value {
            Json::Null => {}
            Json::Array(items) if expand_arrays => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    pairs.push((format!("{name}[]"), scalar_text(item)));
                }
            }
            other => pairs.push((name.clone(), scalar_text(other))),
        }
    }
    Ok(pairs)
}

fn scalar_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Response header list; names lower-case, repeats joined with `, `.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, joined)) => {
                joined.push_str(", ");
                joined.push_str(value);
            }
            None => self.0.push((name, value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Observable result of the attempt. Every field is `None` when no response
/// was received.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

impl ResponseEnvelope {
    /// Whether any response reached us.
    pub fn received(&self) -> bool {
        self.status.is_some()
    }

    pub fn to_json(&self) -> Json {
        let mut out = Map::new();
        if let Some(headers) = &self.headers {
            let headers = headers
                .iter()
                .map(|(name, value)| (name.to_string(), Json::from(value)))
                .collect();
            out.insert("headers".into(), Json::Object(headers));
        }
        if let Some(data) = &self.data {
            out.insert("data".into(), data.clone());
        }
        if let Some(status) = self.status {
            out.insert("status".into(), Json::from(status));
        }
        if let Some(status_text) = &self.status_text {
            out.insert("statusText".into(), Json::from(status_text.as_str()));
        }
        Json::Object(out)
    }
}

/// What `execute` hands back: never an `Err`, failures live in `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub request: RequestDescriptor,
    pub response: ResponseEnvelope,
    pub error: Option<TransportError>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of one assertion, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    pub assertion: String,
    pub status: bool,
    pub message: String,
}

impl AssertionOutcome {
    pub fn passed(assertion: &str) -> Self {
        Self {
            assertion: assertion.to_string(),
            status: true,
            message: "Assertion passed: Assertion passed successfully!".to_string(),
        }
    }

    pub fn failed(assertion: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            assertion: assertion.to_string(),
            status: false,
            message: format!("Assertion failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: Json) -> Result<RequestDescriptor, DescriptorError> {
        RequestDescriptor::try_from(value)
    }

    #[test]
    fn method_defaults_to_get_and_url_to_empty() {
        let d = descriptor(json!({})).unwrap();
        assert_eq!(d.method, "GET");
        assert_eq!(d.url, "");
        assert!(d.data.is_none());
    }

    #[test]
    fn header_and_param_values_are_stringified() {
        let d = descriptor(json!({
            "url": "http://x",
            "headers": {"x-count": 3, "x-skip": null, "accept": "text/plain"},
            "params": {"page": 2, "ids": [1, 2]}
        }))
        .unwrap();
        assert_eq!(
            d.headers,
            vec![("x-count".into(), "3".into()), ("accept".into(), "text/plain".into())]
        );
        assert_eq!(
            d.params,
            vec![("page".into(), "2".into()), ("ids[]".into(), "1".into()), ("ids[]".into(), "2".into())]
        );
    }

    #[test]
    fn echo_preserves_unknown_fields() {
        let input = json!({"method": "post", "url": "http://x", "test_case_desc": "creates a user"});
        let d: RequestDescriptor = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(&d).unwrap(), input);
    }

    #[test]
    fn non_object_is_rejected() {
        assert_eq!(descriptor(json!([1])).unwrap_err(), DescriptorError::NotAnObject);
        assert!(matches!(
            descriptor(json!({"headers": "nope"})).unwrap_err(),
            DescriptorError::InvalidField { field: "headers", .. }
        ));
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("set-cookie", "b=2");
        assert_eq!(headers.get("SET-COOKIE"), Some("a=1, b=2"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn empty_envelope_serializes_to_empty_object() {
        let envelope = ResponseEnvelope::default();
        assert!(!envelope.received());
        assert_eq!(envelope.to_json(), json!({}));
        assert_eq!(serde_json::to_value(&envelope).unwrap(), json!({}));
    }

    #[test]
    fn envelope_uses_camel_case() {
        let mut headers = Headers::new();
        headers.append("content-type", "application/json");
        let envelope = ResponseEnvelope {
            headers: Some(headers),
            data: Some(json!({"ok": true})),
            status: Some(200),
            status_text: Some("OK".into()),
        };
        let expected = json!({
            "headers": {"content-type": "application/json"},
            "data": {"ok": true},
            "status": 200,
            "statusText": "OK"
        });
        assert_eq!(envelope.to_json(), expected);
        assert_eq!(serde_json::to_value(&envelope).unwrap(), expected);
    }

    #[test]
    fn outcome_messages() {
        assert_eq!(
            AssertionOutcome::passed("x").message,
            "Assertion passed: Assertion passed successfully!"
        );
        assert_eq!(AssertionOutcome::failed("x", "boom").message, "Assertion failed: boom");
    }
}
