//! Common types used throughout multiauth
//!
//! Shared type definitions and aliases used across the runner, procedure
//! and store modules.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Name of a user declared in the configuration
pub type UserName = String;

/// Name of a procedure declared in the configuration
pub type ProcedureName = String;

/// Name of an authentication variable
pub type VariableName = String;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
}

impl Method {
    /// Upper-case method token as sent on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
            Method::HEAD => reqwest::Method::HEAD,
            Method::OPTIONS => reqwest::Method::OPTIONS,
        }
    }
}

/// Part of an HTTP request where a credential is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpLocation {
    #[default]
    Header,
    Cookie,
    Query,
}

impl fmt::Display for HttpLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpLocation::Header => f.write_str("header"),
            HttpLocation::Cookie => f.write_str("cookie"),
            HttpLocation::Query => f.write_str("query"),
        }
    }
}

// ============================================================================
// Variables
// ============================================================================

/// A named string produced by an extraction or declared statically on a user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name, referenced as `{{ name }}` in templates
    pub name: VariableName,
    /// Variable value
    pub value: String,
}

impl Variable {
    /// Create a new variable
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_serde() {
        let method: Method = serde_json::from_str("\"POST\"").unwrap();
        assert_eq!(method, Method::POST);
        assert_eq!(serde_json::to_string(&Method::DELETE).unwrap(), "\"DELETE\"");
        assert_eq!(Method::PATCH.to_string(), "PATCH");
    }

    #[test]
    fn test_location_serde() {
        let location: HttpLocation = serde_json::from_str("\"query\"").unwrap();
        assert_eq!(location, HttpLocation::Query);
        assert_eq!(HttpLocation::Cookie.to_string(), "cookie");
    }
}
