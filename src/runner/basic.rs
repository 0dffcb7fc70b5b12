//! HTTP Basic runner

use super::http::{HttpRequestParameters, HttpRunner, HttpRunnerConfiguration};
use super::{RunOutcome, RunnerContext, RunnerError};
use crate::events::Events;
use crate::extraction::HttpExtraction;
use crate::http::{merge_headers, HttpHeader};
use crate::types::Variable;
use crate::user::User;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Name of the variable holding the computed header value
pub const BASIC_HEADER_VARIABLE: &str = "basic-header-value";

/// Configuration of a `basic` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicRunnerConfiguration {
    /// Request used to check the username and password
    pub parameters: HttpRequestParameters,
    #[serde(default)]
    pub extractions: Vec<HttpExtraction>,
}

impl BasicRunnerConfiguration {
    /// Equivalent plain HTTP configuration
    pub fn to_http(&self) -> HttpRunnerConfiguration {
        HttpRunnerConfiguration {
            parameters: self.parameters.clone(),
            extractions: self.extractions.clone(),
        }
    }
}

/// `Authorization` header for a username and password
pub fn basic_header(username: &str, password: &str) -> HttpHeader {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    HttpHeader::new("Authorization", format!("Basic {encoded}"))
}

/// Runs a `basic` step
#[derive(Debug, Clone)]
pub struct BasicRunner {
    configuration: BasicRunnerConfiguration,
}

impl BasicRunner {
    pub fn new(configuration: BasicRunnerConfiguration) -> Self {
        Self { configuration }
    }

    pub fn configuration(&self) -> &BasicRunnerConfiguration {
        &self.configuration
    }

    pub async fn run(&self, user: &User, context: &RunnerContext) -> RunOutcome {
        let Some((username, password)) = user.credentials.username_password() else {
            return RunOutcome::failure(
                Events::new(),
                RunnerError::MissingCredentials {
                    user: user.name.clone(),
                },
            );
        };

        let header = basic_header(username, password);
        let mut credentials = user.credentials.clone();
        credentials.headers = merge_headers(&credentials.headers, std::slice::from_ref(&header));

        let mut outcome = HttpRunner::new(self.configuration.to_http())
            .run_with_credentials(&credentials, context)
            .await;

        if !outcome.is_failure() {
            outcome
                .variables
                .push(Variable::new(BASIC_HEADER_VARIABLE, header.value()));
        }
        outcome
    }
}
