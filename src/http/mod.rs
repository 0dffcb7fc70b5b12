//! HTTP module
//!
//! Wire model shared by runners and audit events, entry mergers, and the
//! [`Transport`] seam used to send requests.
//!
//! # Features
//!
//! - **Mergers**: header/cookie/query lists merge by name, headers
//!   case-insensitively
//! - **Transport**: reqwest-backed by default, failures classified into
//!   timeout / connection / redirect / unknown

mod transport;
mod types;

pub use transport::{
    FailureReason, ReqwestTransport, Transport, TransportError, DEFAULT_TIMEOUT_SECONDS,
};
pub use types::{
    merge_bodies, merge_cookies, merge_entries, merge_headers, merge_query_parameters, HttpCookie,
    HttpEntry, HttpHeader, HttpQueryParameter, HttpRequest, HttpResponse, Scheme,
};

use crate::error::{Error, Result};
use url::Url;

/// Split a raw URL into scheme, host (with port) and path
pub fn parse_raw_url(raw: &str) -> Result<(Scheme, String, String)> {
    let url = Url::parse(raw)?;

    let scheme = match url.scheme() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => return Err(Error::config(format!("Unsupported URL scheme: {other}"))),
    };

    let host = url
        .host_str()
        .ok_or_else(|| Error::config(format!("URL has no host: {raw}")))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok((scheme, host, url.path().to_string()))
}

/// Query parameters carried by a raw URL, merged by name
pub fn parse_raw_query(raw: &str) -> Result<Vec<HttpQueryParameter>> {
    let url = Url::parse(raw)?;
    let pairs: Vec<HttpQueryParameter> = url
        .query_pairs()
        .map(|(name, value)| HttpQueryParameter::new(name, value))
        .collect();
    Ok(merge_query_parameters(&[], &pairs))
}

#[cfg(test)]
mod tests;
