//! HTTP wire model
//!
//! Requests and responses are plain data so that runners, events and the
//! transport can share them. Headers, cookies and query parameters are all
//! `{ name, values }` entries; merging concatenates values by name.

use crate::types::{JsonValue, Method};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Common shape of a named, multi-valued HTTP entry
pub trait HttpEntry: Clone {
    /// Entry name
    fn name(&self) -> &str;
    /// Replace the entry name
    fn set_name(&mut self, name: String);
    /// Entry values
    fn values(&self) -> &[String];
    /// Mutable entry values
    fn values_mut(&mut self) -> &mut Vec<String>;
    /// Whether names compare case-insensitively
    const CASE_INSENSITIVE: bool;

    /// Name comparison honouring the entry's case sensitivity
    fn name_matches(&self, other: &str) -> bool {
        if Self::CASE_INSENSITIVE {
            self.name().eq_ignore_ascii_case(other)
        } else {
            self.name() == other
        }
    }
}

macro_rules! http_entry {
    ($(#[$meta:meta])* $ty:ident, $case_insensitive:expr, $sep:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $ty {
            pub name: String,
            #[serde(default)]
            pub values: Vec<String>,
        }

        impl $ty {
            /// Create an entry with a single value
            pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    values: vec![value.into()],
                }
            }

            /// Values joined into a single string
            pub fn value(&self) -> String {
                self.values.join($sep)
            }
        }

        impl HttpEntry for $ty {
            const CASE_INSENSITIVE: bool = $case_insensitive;

            fn name(&self) -> &str {
                &self.name
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }

            fn values(&self) -> &[String] {
                &self.values
            }

            fn values_mut(&mut self) -> &mut Vec<String> {
                &mut self.values
            }
        }
    };
}

http_entry!(
    /// HTTP header; names compare case-insensitively
    HttpHeader,
    true,
    ", "
);
http_entry!(
    /// HTTP cookie
    HttpCookie,
    false,
    ","
);
http_entry!(
    /// URL query parameter
    HttpQueryParameter,
    false,
    ","
);

/// Merge two lists of entries.
///
/// Entries sharing a name are collapsed into one: values are concatenated
/// without duplicates and the name of the latest occurrence is kept.
pub fn merge_entries<T: HttpEntry>(a: &[T], b: &[T]) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(a.len() + b.len());

    for entry in a.iter().chain(b.iter()) {
        match merged.iter_mut().find(|m| m.name_matches(entry.name())) {
            Some(existing) => {
                existing.set_name(entry.name().to_string());
                for value in entry.values() {
                    if !existing.values().contains(value) {
                        existing.values_mut().push(value.clone());
                    }
                }
            }
            None => merged.push(entry.clone()),
        }
    }

    merged
}

/// Merge header lists (case-insensitive names)
pub fn merge_headers(a: &[HttpHeader], b: &[HttpHeader]) -> Vec<HttpHeader> {
    merge_entries(a, b)
}

/// Merge cookie lists
pub fn merge_cookies(a: &[HttpCookie], b: &[HttpCookie]) -> Vec<HttpCookie> {
    merge_entries(a, b)
}

/// Merge query parameter lists
pub fn merge_query_parameters(
    a: &[HttpQueryParameter],
    b: &[HttpQueryParameter],
) -> Vec<HttpQueryParameter> {
    merge_entries(a, b)
}

/// Deep-merge two request bodies; `overlay` wins on key conflicts.
pub fn merge_bodies(base: Option<&JsonValue>, overlay: Option<&JsonValue>) -> Option<JsonValue> {
    match (base, overlay) {
        (None, None) => None,
        (Some(b), None) => Some(b.clone()),
        (None, Some(o)) => Some(o.clone()),
        (Some(JsonValue::Object(b)), Some(JsonValue::Object(o))) => {
            let mut merged = b.clone();
            for (key, value) in o {
                let next = match merged.get(key) {
                    Some(existing) => merge_bodies(Some(existing), Some(value)),
                    None => Some(value.clone()),
                };
                if let Some(next) = next {
                    merged.insert(key.clone(), next);
                }
            }
            Some(JsonValue::Object(merged))
        }
        (Some(_), Some(o)) => Some(o.clone()),
    }
}

/// URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

/// A fully resolved request handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequest {
    pub method: Method,
    pub scheme: Scheme,
    /// Host including an optional `:port`
    pub host: String,
    pub path: String,
    pub headers: Vec<HttpHeader>,
    pub cookies: Vec<HttpCookie>,
    pub query_parameters: Vec<HttpQueryParameter>,
    pub body_text: Option<String>,
    pub body_json: Option<JsonValue>,
    pub proxy: Option<String>,
    pub timeout_seconds: u64,
}

impl HttpRequest {
    /// URL without query string
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }

    /// First header value matching `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|h| h.name_matches(name))
            .map(HttpHeader::value)
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.method, self.url())?;
        for header in &self.headers {
            for value in &header.values {
                writeln!(f, "H> {}: {}", header.name, value)?;
            }
        }
        for cookie in &self.cookies {
            for value in &cookie.values {
                writeln!(f, "C> {}: {}", cookie.name, value)?;
            }
        }
        if let Some(body) = &self.body_text {
            write!(f, "{body}")?;
        }
        Ok(())
    }
}

/// A response received from the transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResponse {
    pub url: String,
    pub status_code: u16,
    pub reason: String,
    pub elapsed_ms: u64,
    pub headers: Vec<HttpHeader>,
    pub cookies: Vec<HttpCookie>,
    pub body_text: Option<String>,
    pub body_json: Option<JsonValue>,
}

impl HttpResponse {
    /// Build a response from a status code, for tests and custom transports
    pub fn new(status_code: u16) -> Self {
        Self {
            url: String::new(),
            status_code,
            reason: String::new(),
            elapsed_ms: 0,
            headers: Vec::new(),
            cookies: Vec::new(),
            body_text: None,
            body_json: None,
        }
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_json(mut self, body: JsonValue) -> Self {
        self.body_text = Some(body.to_string());
        self.body_json = Some(body);
        self
    }

    /// Attach a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers = merge_headers(&self.headers, &[HttpHeader::new(name, value)]);
        self
    }

    /// Attach a cookie
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies = merge_cookies(&self.cookies, &[HttpCookie::new(name, value)]);
        self
    }

    /// Whether the status is an HTTP error (>= 400)
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} in {}ms",
            self.status_code, self.reason, self.elapsed_ms
        )?;
        for header in &self.headers {
            for value in &header.values {
                writeln!(f, "H< {}: {}", header.name, value)?;
            }
        }
        for cookie in &self.cookies {
            for value in &cookie.values {
                writeln!(f, "C< {}: {}", cookie.name, value)?;
            }
        }
        if let Some(body) = &self.body_text {
            write!(f, "{body}")?;
        }
        Ok(())
    }
}
