//! Extraction module
//!
//! Pulls values out of an [`HttpResponse`] and names them as [`Variable`]s.
//!
//! - `header`: response header, first match. Header names are matched
//!   ignoring ASCII case since the transport normalises them.
//! - `cookie`: response cookie, exact name match.
//! - `body`: depth-first search through the JSON body for the first field
//!   with the given key.
//!
//! A declaration that finds nothing produces no variable; it is reported
//! back as a miss so callers can decide whether that matters.

use crate::events::{EventKind, Events};
use crate::http::{HttpEntry, HttpResponse};
use crate::types::{JsonValue, Variable, VariableName};
use serde::{Deserialize, Serialize};

/// Where and how to extract a variable from a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "location", rename_all = "lowercase")]
pub enum HttpExtraction {
    /// Extract from a response header
    Header {
        /// Name of the variable to create
        name: VariableName,
        /// Header name
        key: String,
    },
    /// Extract from a response cookie
    Cookie {
        /// Name of the variable to create
        name: VariableName,
        /// Cookie name
        key: String,
    },
    /// Extract from the JSON body, searching nested objects and arrays
    Body {
        /// Name of the variable to create
        name: VariableName,
        /// Field name to look for
        key: String,
    },
}

impl HttpExtraction {
    /// Name of the variable this extraction produces
    pub fn name(&self) -> &str {
        match self {
            HttpExtraction::Header { name, .. }
            | HttpExtraction::Cookie { name, .. }
            | HttpExtraction::Body { name, .. } => name,
        }
    }

    /// Key looked up in the response
    pub fn key(&self) -> &str {
        match self {
            HttpExtraction::Header { key, .. }
            | HttpExtraction::Cookie { key, .. }
            | HttpExtraction::Body { key, .. } => key,
        }
    }

    /// Location label
    pub fn location(&self) -> &'static str {
        match self {
            HttpExtraction::Header { .. } => "header",
            HttpExtraction::Cookie { .. } => "cookie",
            HttpExtraction::Body { .. } => "body",
        }
    }
}

/// Result of running a list of extractions against a response
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    /// Variables produced, in declaration order
    pub variables: Vec<Variable>,
    /// One `extraction` event per produced variable
    pub events: Events,
    /// Declarations that matched nothing
    pub misses: Vec<HttpExtraction>,
}

/// Run every extraction against the response
pub fn extract(response: &HttpResponse, extractions: &[HttpExtraction]) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();

    for extraction in extractions {
        let value = match extraction {
            HttpExtraction::Header { key, .. } => response
                .headers
                .iter()
                .find(|h| h.name_matches(key))
                .map(|h| h.values.join(",")),
            HttpExtraction::Cookie { key, .. } => response
                .cookies
                .iter()
                .find(|c| &c.name == key)
                .map(|c| c.values.join(",")),
            HttpExtraction::Body { key, .. } => match &response.body_json {
                Some(body @ JsonValue::Object(_)) => search_key(body, key).map(stringify),
                _ => None,
            },
        };

        match value {
            Some(value) => {
                let variable = Variable::new(extraction.name(), value);
                outcome.events.push(EventKind::Extraction {
                    variable: variable.clone(),
                });
                outcome.variables.push(variable);
            }
            None => outcome.misses.push(extraction.clone()),
        }
    }

    outcome
}

/// Depth-first search for the first non-null field named `key`.
///
/// At each object the field itself is checked first, then every value is
/// searched in declaration order; array elements are searched in order.
pub fn search_key<'a>(value: &'a JsonValue, key: &str) -> Option<&'a JsonValue> {
    match value {
        JsonValue::Object(map) => {
            if let Some(found) = map.get(key).filter(|v| !v.is_null()) {
                return Some(found);
            }
            map.values().find_map(|v| search_key(v, key))
        }
        JsonValue::Array(items) => items.iter().find_map(|v| search_key(v, key)),
        _ => None,
    }
}

/// String form of an extracted JSON value
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests;
