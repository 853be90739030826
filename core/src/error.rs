//! Error types for request descriptors and the HTTP transport.
//!
//! # Design
//! `TransportError` never escapes `execute`: it is stored in the
//! `ExecutionResult` and shown to assertions as `context.error`. Its codes
//! follow the names HTTP clients conventionally report (`ECONNREFUSED`,
//! `ERR_BAD_REQUEST`, ...) so assertions can branch on them.

use std::error::Error as _;
use std::io;

use serde_json::{json, Value as Json};

/// A request descriptor that does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("request descriptor must be a JSON object")]
    NotAnObject,

    #[error("`{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Why a request did not produce a 2xx response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("Request failed with status code {status}")]
    Status { status: u16 },

    #[error("Invalid URL")]
    InvalidUrl { url: String },

    /// Method, header or proxy could not be used.
    #[error("{0}")]
    BadOption(String),

    #[error("connect ECONNREFUSED {address}")]
    ConnectionRefused { address: String },

    #[error("timeout exceeded")]
    Timeout,

    #[error("{0}")]
    Network(String),
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Status { status } if (400..500).contains(status) => "ERR_BAD_REQUEST",
            TransportError::Status { .. } => "ERR_BAD_RESPONSE",
            TransportError::InvalidUrl { .. } => "ERR_INVALID_URL",
            TransportError::BadOption(_) => "ERR_BAD_OPTION_VALUE",
            TransportError::ConnectionRefused { .. } => "ECONNREFUSED",
            TransportError::Timeout => "ETIMEDOUT",
            TransportError::Network(_) => "ERR_NETWORK",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// The shape assertions see as `context.error`.
    pub fn to_json(&self) -> Json {
        let mut value = json!({
            "name": "TransportError",
            "message": self.to_string(),
            "code": self.code(),
        });
        if let (Some(status), Json::Object(fields)) = (self.status(), &mut value) {
            fields.insert("status".into(), Json::from(status));
        }
        value
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout;
        }
        if let Some(status) = err.status() {
            return TransportError::Status {
                status: status.as_u16(),
            };
        }
        if err.is_connect() && refused(&err) {
            let address = err
                .url()
                .and_then(|url| Some(format!("{}:{}", url.host_str()?, url.port_or_known_default()?)))
                .unwrap_or_default();
            return TransportError::ConnectionRefused { address };
        }
        if err.is_builder() {
            return TransportError::BadOption(err.to_string());
        }
        TransportError::Network(err.to_string())
    }
}

/// Whether an `io::ErrorKind::ConnectionRefused` sits anywhere in the source chain.
fn refused(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
