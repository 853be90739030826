//! Performs one HTTP request and captures its outcome.
//!
//! # Design
//! `execute` never returns an error: every failure (bad descriptor,
//! connection refused, non-2xx status) is folded into the returned
//! `ExecutionResult`. Environment proxy variables are ignored unless a
//! proxy is passed explicitly, so a run behaves the same on every machine.

use reqwest::{redirect, Client, Proxy};
use tracing::{debug, warn};

pub use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};
use crate::types::{ExecutionResult, RequestDescriptor, ResponseEnvelope};

const USER_AGENT: &str = concat!("reqcheck/", env!("CARGO_PKG_VERSION"));

/// Sends requests, optionally through a proxy.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    proxy: Option<String>,
}

impl Executor {
    pub fn new(proxy: Option<&str>) -> Self {
        Self {
            proxy: proxy.filter(|p| !p.is_empty()).map(str::to_string),
        }
    }

    fn client(&self) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::limited(10));

        builder = match &self.proxy {
            Some(proxy) => {
                let proxy = Proxy::all(proxy_url(proxy))
                    .map_err(|err| TransportError::BadOption(format!("Invalid proxy URL: {err}")))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        builder.build().map_err(TransportError::from)
    }

    pub async fn execute(&self, descriptor: RequestDescriptor) -> ExecutionResult {
        let (response, error) = match self.round_trip(&descriptor).await {
            Ok(response) => {
                let error = response.failure();
                (response.into_envelope(), error)
            }
            Err(error) => (ResponseEnvelope::default(), Some(error)),
        };
        if let Some(error) = &error {
            warn!(code = error.code(), status = ?response.status, %error, "request failed");
        }
        ExecutionResult {
            request: descriptor,
            response,
            error,
        }
    }

    async fn round_trip(&self, descriptor: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let request = HttpRequest::prepare(descriptor)?;
        let client = self.client()?;
        debug!(method = %request.method, url = %request.url, proxy = ?self.proxy, "dispatching request");

        let mut builder = client.request(request.method, request.url).headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        let body = response.bytes().await?.to_vec();
        debug!(status = status.as_u16(), bytes = body.len(), "response received");

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text,
            headers,
            body,
        })
    }
}

/// Proxy hosts are accepted bare (`proxy.local:8080`) and default to `http://`.
fn proxy_url(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{proxy}")
    }
}

/// Run one request with a fresh executor.
pub async fn execute(descriptor: RequestDescriptor, proxy: Option<&str>) -> ExecutionResult {
    Executor::new(proxy).execute(descriptor).await
}
