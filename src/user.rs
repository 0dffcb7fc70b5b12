//! Users and their credentials
//!
//! A user names the procedure that authenticates it, the credential material
//! merged into every request of that procedure, static variables, the
//! injection rules that turn extracted variables into an [`Authentication`],
//! and an optional refresh policy.
//!
//! [`Authentication`]: crate::auth::Authentication

use crate::auth::TokenInjection;
use crate::http::{HttpCookie, HttpHeader, HttpQueryParameter};
use crate::types::{JsonValue, ProcedureName, UserName, Variable};
use serde::{Deserialize, Serialize};

/// Request material attached to every request sent for a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub headers: Vec<HttpHeader>,
    #[serde(default)]
    pub cookies: Vec<HttpCookie>,
    #[serde(default, alias = "queryParameters")]
    pub query_parameters: Vec<HttpQueryParameter>,
    /// Body fragment deep-merged into every request body
    #[serde(default)]
    pub body: Option<JsonValue>,
}

impl Credentials {
    /// Username and password, when both are present and non-empty
    pub fn username_password(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

/// How a user's authentication is refreshed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRefresh {
    /// Procedure used for refresh; defaults to the user's procedure
    #[serde(default)]
    pub procedure: Option<ProcedureName>,
    /// Fixed session lifetime in seconds
    #[serde(default, alias = "sessionSeconds")]
    pub session_seconds: Option<u64>,
    /// Merge the refreshed authentication into the previous one
    #[serde(default)]
    pub keep: bool,
    /// Credentials used for refresh; defaults to the user's credentials
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// Variables used for refresh; defaults to the user's variables
    #[serde(default)]
    pub variables: Option<Vec<Variable>>,
}

/// A user declared in the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: UserName,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub procedure: Option<ProcedureName>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub injections: Vec<TokenInjection>,
    #[serde(default)]
    pub refresh: Option<UserRefresh>,
}

impl User {
    /// Create a user with no credentials and no procedure
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credentials: Credentials::default(),
            procedure: None,
            variables: Vec::new(),
            injections: Vec::new(),
            refresh: None,
        }
    }

    /// Anonymous user without credentials
    pub fn public() -> Self {
        Self::new("public")
    }

    /// Session lifetime declared by the refresh policy
    pub fn session_ttl_seconds(&self) -> Option<u64> {
        self.refresh.as_ref().and_then(|r| r.session_seconds)
    }

    /// Procedure used to refresh this user
    pub fn refresh_procedure(&self) -> Option<&ProcedureName> {
        self.refresh
            .as_ref()
            .and_then(|r| r.procedure.as_ref())
            .or(self.procedure.as_ref())
    }

    /// The user as seen by a refresh run: refresh credentials, variables
    /// and procedure override the base ones when declared.
    pub fn refresh_user(&self) -> User {
        let mut user = self.clone();
        if let Some(refresh) = &self.refresh {
            if let Some(credentials) = &refresh.credentials {
                user.credentials = credentials.clone();
            }
            if let Some(variables) = &refresh.variables {
                user.variables = variables.clone();
            }
            user.procedure = self.refresh_procedure().cloned();
        }
        user
    }
}
