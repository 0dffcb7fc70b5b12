//! Request transport
//!
//! Runners never talk to the network directly: they hand an [`HttpRequest`]
//! to a [`Transport`]. The default implementation is backed by reqwest;
//! tests and embedders can provide their own.

use super::types::{HttpCookie, HttpEntry, HttpHeader, HttpRequest, HttpResponse};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, Proxy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Default per-request timeout, in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// Classification of a failed HTTP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    ConnectionError,
    TooManyRedirects,
    HttpError,
    Unknown,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::Timeout => "timeout",
            FailureReason::ConnectionError => "connection_error",
            FailureReason::TooManyRedirects => "too_many_redirects",
            FailureReason::HttpError => "http_error",
            FailureReason::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A request that produced no response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("too many redirects: {0}")]
    TooManyRedirects(String),

    #[error("request failed: {0}")]
    Unknown(String),
}

impl TransportError {
    /// Failure classification
    pub fn reason(&self) -> FailureReason {
        match self {
            TransportError::Timeout(_) => FailureReason::Timeout,
            TransportError::Connection(_) => FailureReason::ConnectionError,
            TransportError::TooManyRedirects(_) => FailureReason::TooManyRedirects,
            TransportError::Unknown(_) => FailureReason::Unknown,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_redirect() {
            TransportError::TooManyRedirects(e.to_string())
        } else if e.is_connect() {
            TransportError::Connection(e.to_string())
        } else {
            TransportError::Unknown(e.to_string())
        }
    }
}

/// Sends one request and returns its response
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request. Any HTTP status is a response; only exchanges that
    /// produced no response at all are errors.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a reqwest [`Client`]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Requests routed through a proxy get a dedicated client that accepts
    /// the proxy's certificates.
    fn client_for(&self, request: &HttpRequest) -> Result<Client, TransportError> {
        match &request.proxy {
            None => Ok(self.client.clone()),
            Some(proxy) => {
                let proxy = Proxy::all(proxy.as_str())
                    .map_err(|e| TransportError::Unknown(format!("invalid proxy: {e}")))?;
                Client::builder()
                    .proxy(proxy)
                    .danger_accept_invalid_certs(true)
                    .build()
                    .map_err(TransportError::from)
            }
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client_for(request)?;
        let url = request.url();

        let mut builder = client
            .request(request.method.into(), &url)
            .timeout(Duration::from_secs(request.timeout_seconds));

        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value());
        }

        if !request.cookies.is_empty() {
            let cookie = request
                .cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value()))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(COOKIE, cookie);
        }

        let query: Vec<(&str, &str)> = request
            .query_parameters
            .iter()
            .flat_map(|q| q.values.iter().map(move |v| (q.name.as_str(), v.as_str())))
            .collect();
        if !query.is_empty() {
            builder = builder.query(&query);
        }

        if let Some(body) = &request.body_text {
            if request.body_json.is_some() && request.header("content-type").is_none() {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let response = builder.send().await?;
        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let status = response.status();
        let response_url = response.url().to_string();

        let mut headers: Vec<HttpHeader> = Vec::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match headers.iter_mut().find(|h| h.name_matches(name.as_str())) {
                Some(existing) => existing.values.push(value),
                None => headers.push(HttpHeader::new(name.as_str(), value)),
            }
        }

        let mut cookies: Vec<HttpCookie> = Vec::new();
        for cookie in response.cookies() {
            match cookies.iter_mut().find(|c| c.name == cookie.name()) {
                Some(existing) => existing.values.push(cookie.value().to_string()),
                None => cookies.push(HttpCookie::new(cookie.name(), cookie.value())),
            }
        }

        let body_text = response.text().await?;
        let body_json = serde_json::from_str(&body_text).ok();

        debug!(
            "{} {} -> {} in {}ms",
            request.method,
            url,
            status.as_u16(),
            elapsed_ms
        );

        Ok(HttpResponse {
            url: response_url,
            status_code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            elapsed_ms,
            headers,
            cookies,
            body_text: Some(body_text),
            body_json,
        })
    }
}
