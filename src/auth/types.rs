//! Authentication artifact and injection rules
//!
//! An [`Authentication`] is what callers attach to their own requests.
//! Injection turns variables collected by a procedure into one.

use crate::events::{EventKind, Events};
use crate::http::{
    merge_cookies, merge_headers, merge_query_parameters, HttpCookie, HttpHeader,
    HttpQueryParameter,
};
use crate::types::{HttpLocation, Variable, VariableName};
use crate::user::Credentials;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Headers, cookies and query parameters to attach to authenticated requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    #[serde(default)]
    pub headers: Vec<HttpHeader>,
    #[serde(default)]
    pub cookies: Vec<HttpCookie>,
    #[serde(default)]
    pub query_parameters: Vec<HttpQueryParameter>,
}

impl Authentication {
    /// An authentication carrying nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether nothing would be attached
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.cookies.is_empty() && self.query_parameters.is_empty()
    }

    /// Static authentication taken straight from a user's credentials
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self {
            headers: credentials.headers.clone(),
            cookies: credentials.cookies.clone(),
            query_parameters: credentials.query_parameters.clone(),
        }
    }

    /// Merge two authentications; values are concatenated by name
    #[must_use]
    pub fn merge(&self, other: &Authentication) -> Authentication {
        Authentication {
            headers: merge_headers(&self.headers, &other.headers),
            cookies: merge_cookies(&self.cookies, &other.cookies),
            query_parameters: merge_query_parameters(
                &self.query_parameters,
                &other.query_parameters,
            ),
        }
    }

    /// Every attached value, in headers / cookies / query order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .flat_map(|h| h.values.iter())
            .chain(self.cookies.iter().flat_map(|c| c.values.iter()))
            .chain(self.query_parameters.iter().flat_map(|q| q.values.iter()))
            .map(String::as_str)
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.headers.is_empty() {
            writeln!(f, "No headers")?;
        } else {
            writeln!(f, "Headers:")?;
            for header in &self.headers {
                writeln!(f, "- {}: {}", header.name, header.value())?;
            }
        }
        if self.cookies.is_empty() {
            writeln!(f, "No cookies")?;
        } else {
            writeln!(f, "Cookies:")?;
            for cookie in &self.cookies {
                writeln!(f, "- {}: {}", cookie.name, cookie.value())?;
            }
        }
        if self.query_parameters.is_empty() {
            writeln!(f, "No query parameters")?;
        } else {
            writeln!(f, "Query Parameters:")?;
            for query in &self.query_parameters {
                writeln!(f, "- {}: {}", query.name, query.value())?;
            }
        }
        Ok(())
    }
}

/// Rule placing a variable into the authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInjection {
    /// Where the token goes
    pub location: HttpLocation,
    /// Header, cookie or query parameter name
    pub key: String,
    /// Prepended to the variable value, e.g. `Bearer `
    #[serde(default)]
    pub prefix: Option<String>,
    /// Variable to inject; see [`InjectionFallback`] when unset
    #[serde(default)]
    pub variable: Option<VariableName>,
}

impl TokenInjection {
    /// Header injection of a named variable
    pub fn header(key: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            location: HttpLocation::Header,
            key: key.into(),
            prefix: None,
            variable: Some(variable.into()),
        }
    }

    /// Set the prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Variable used by an injection that names none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionFallback {
    /// The first (oldest) variable of the procedure's store
    #[default]
    First,
    /// No fallback: an injection without a variable resolves nothing
    None,
}

/// Result of applying a list of injections
#[derive(Debug, Clone, Default)]
pub struct InjectionOutcome {
    pub authentication: Authentication,
    pub events: Events,
    /// Injections that found no variable
    pub misses: Vec<TokenInjection>,
}

/// Resolve the variable an injection refers to
fn resolve<'a>(
    injection: &TokenInjection,
    variables: &'a [Variable],
    fallback: InjectionFallback,
) -> Option<&'a Variable> {
    match (&injection.variable, fallback) {
        (Some(name), _) => variables.iter().find(|v| &v.name == name),
        (None, InjectionFallback::First) => variables.first(),
        (None, InjectionFallback::None) => None,
    }
}

/// Apply one injection. Returns `None` when no variable resolves.
pub fn inject(
    injection: &TokenInjection,
    variables: &[Variable],
    fallback: InjectionFallback,
) -> Option<(Authentication, Events)> {
    let variable = resolve(injection, variables, fallback)?;

    let value = format!(
        "{}{}",
        injection.prefix.as_deref().unwrap_or(""),
        variable.value
    );
    let mut authentication = Authentication::empty();
    match injection.location {
        HttpLocation::Header => authentication
            .headers
            .push(HttpHeader::new(&injection.key, value)),
        HttpLocation::Cookie => authentication
            .cookies
            .push(HttpCookie::new(&injection.key, value)),
        HttpLocation::Query => authentication
            .query_parameters
            .push(HttpQueryParameter::new(&injection.key, value)),
    }

    let mut events = Events::new();
    events.push(EventKind::Injection {
        variable: variable.clone(),
        location: injection.location,
        target: injection.key.clone(),
    });

    Some((authentication, events))
}

/// Apply every injection and merge the results
pub fn inject_all(
    injections: &[TokenInjection],
    variables: &[Variable],
    fallback: InjectionFallback,
) -> InjectionOutcome {
    let mut outcome = InjectionOutcome::default();

    for injection in injections {
        match inject(injection, variables, fallback) {
            Some((authentication, events)) => {
                outcome.authentication = outcome.authentication.merge(&authentication);
                outcome.events.extend(events);
            }
            None => outcome.misses.push(injection.clone()),
        }
    }

    outcome
}
