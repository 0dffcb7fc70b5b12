//! Runner module
//!
//! A runner executes one procedure step: it builds a request from its
//! configuration and the user's credentials, sends it through the
//! [`Transport`], and extracts variables from the response.
//!
//! # Variants
//!
//! - `http`: plain request
//! - `basic`: adds `Authorization: Basic ...` from the user's credentials
//! - `graphql`: wraps a query and its variables into a JSON POST body
//! - `digest`: challenge / response over two round trips
//! - `selenium`: browser script run by a [`BrowserDriver`], followed by
//!   regex extraction over the captured traffic
//!
//! Runners are immutable. [`Runner::interpolate`] returns a new runner with
//! variables substituted into its configuration.

mod basic;
mod digest;
mod graphql;
mod http;
mod selenium;

pub use basic::{basic_header, BasicRunner, BasicRunnerConfiguration, BASIC_HEADER_VARIABLE};
pub use digest::{
    digest_header, parse_challenge, DigestChallenge, DigestHashes, DigestRequestSequence,
    DigestRunner, DigestRunnerConfiguration, DigestSecondRequest, DIGEST_HEADER_VARIABLE,
};
pub use graphql::{GraphqlRequestParameters, GraphqlRunner, GraphqlRunnerConfiguration, GraphqlVariable};
pub use http::{HttpRequestParameters, HttpRunner, HttpRunnerConfiguration};
pub use selenium::{
    extract_token, BrowserDriver, BrowserError, BrowserRun, CapturedRequest, CapturedResponse,
    SeleniumCommand, SeleniumExtraction, SeleniumProject, SeleniumRunner,
    SeleniumRunnerConfiguration, SeleniumScriptOptions, SeleniumScriptParameters, SeleniumTest,
    TranscriptLocation,
};

use crate::events::Events;
use crate::extraction::ExtractionOutcome;
use crate::http::{FailureReason, Transport, DEFAULT_TIMEOUT_SECONDS};
use crate::template::{interpolate_value, unresolved_placeholders};
use crate::types::Variable;
use crate::user::User;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

// ============================================================================
// Errors
// ============================================================================

/// A failure that aborts the current procedure run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("{reason}: {description}")]
    Http {
        reason: FailureReason,
        description: String,
    },

    #[error("User `{user}` is missing a username or password")]
    MissingCredentials { user: String },

    #[error("Digest challenge error: {0}")]
    Digest(String),

    #[error("Extraction `{name}` found nothing in {location} `{key}`")]
    ExtractionMiss {
        name: String,
        location: String,
        key: String,
    },

    #[error("Unresolved placeholders: {}", .names.join(", "))]
    Interpolation { names: Vec<String> },

    #[error("Invalid runner configuration: {0}")]
    Configuration(String),

    #[error("No browser driver is configured")]
    NoBrowser,

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Could not find token in `{location}` with regex `{regex}` at index `{index}`")]
    TokenNotFound {
        location: TranscriptLocation,
        regex: String,
        index: usize,
    },
}

impl RunnerError {
    /// Classification of the failure
    pub fn reason(&self) -> FailureReason {
        match self {
            RunnerError::Http { reason, .. } => *reason,
            RunnerError::Digest(_) => FailureReason::HttpError,
            _ => FailureReason::Unknown,
        }
    }

    pub(crate) fn http_status(status_code: u16) -> Self {
        RunnerError::Http {
            reason: FailureReason::HttpError,
            description: format!("HTTP error {status_code}"),
        }
    }
}

// ============================================================================
// Context and outcome
// ============================================================================

/// Collaborators and settings shared by every runner of a run
#[derive(Clone)]
pub struct RunnerContext {
    pub transport: Arc<dyn Transport>,
    pub browser: Option<Arc<dyn BrowserDriver>>,
    pub timeout_seconds: u64,
    /// Turn extraction misses and unresolved placeholders into errors
    pub strict: bool,
}

impl RunnerContext {
    /// Context with the default timeout, no browser and lenient extraction
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            browser: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            strict: false,
        }
    }

    /// Set the browser driver
    #[must_use]
    pub fn with_browser(mut self, browser: Arc<dyn BrowserDriver>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Set strict mode
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

impl fmt::Debug for RunnerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerContext")
            .field("browser", &self.browser.is_some())
            .field("timeout_seconds", &self.timeout_seconds)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

/// What a runner produced
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub variables: Vec<Variable>,
    pub events: Events,
    pub error: Option<RunnerError>,
}

impl RunOutcome {
    /// Successful outcome
    pub fn success(variables: Vec<Variable>, events: Events) -> Self {
        Self {
            variables,
            events,
            error: None,
        }
    }

    /// Failed outcome; failures never yield variables
    pub fn failure(events: Events, error: RunnerError) -> Self {
        Self {
            variables: Vec::new(),
            events,
            error: Some(error),
        }
    }

    /// Whether the runner failed
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Fold an extraction result into the runner's events, honouring strict mode
pub(crate) fn apply_extractions(
    outcome: ExtractionOutcome,
    events: &mut Events,
    strict: bool,
) -> Result<Vec<Variable>, RunnerError> {
    events.extend(outcome.events);

    if let Some(miss) = outcome.misses.first() {
        if strict {
            return Err(RunnerError::ExtractionMiss {
                name: miss.name().to_string(),
                location: miss.location().to_string(),
                key: miss.key().to_string(),
            });
        }
        for miss in &outcome.misses {
            warn!(
                "Extraction `{}` found nothing in {} `{}`",
                miss.name(),
                miss.location(),
                miss.key()
            );
        }
    }

    Ok(outcome.variables)
}

// ============================================================================
// Configuration and dispatch
// ============================================================================

/// Declarative configuration of one procedure step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tech", rename_all = "lowercase")]
pub enum RunnerConfiguration {
    Http(HttpRunnerConfiguration),
    Basic(BasicRunnerConfiguration),
    Digest(DigestRunnerConfiguration),
    Graphql(GraphqlRunnerConfiguration),
    Selenium(SeleniumRunnerConfiguration),
}

impl RunnerConfiguration {
    /// Discriminator value
    pub fn tech(&self) -> &'static str {
        match self {
            RunnerConfiguration::Http(_) => "http",
            RunnerConfiguration::Basic(_) => "basic",
            RunnerConfiguration::Digest(_) => "digest",
            RunnerConfiguration::Graphql(_) => "graphql",
            RunnerConfiguration::Selenium(_) => "selenium",
        }
    }

    /// Build the runner for this configuration
    pub fn runner(&self) -> Runner {
        Runner::new(self.clone())
    }
}

/// Executable form of a [`RunnerConfiguration`]
#[derive(Debug, Clone)]
pub enum Runner {
    Http(HttpRunner),
    Basic(BasicRunner),
    Digest(DigestRunner),
    Graphql(GraphqlRunner),
    Selenium(SeleniumRunner),
}

impl Runner {
    /// Create a runner
    pub fn new(configuration: RunnerConfiguration) -> Self {
        match configuration {
            RunnerConfiguration::Http(c) => Runner::Http(HttpRunner::new(c)),
            RunnerConfiguration::Basic(c) => Runner::Basic(BasicRunner::new(c)),
            RunnerConfiguration::Digest(c) => Runner::Digest(DigestRunner::new(c)),
            RunnerConfiguration::Graphql(c) => Runner::Graphql(GraphqlRunner::new(c)),
            RunnerConfiguration::Selenium(c) => Runner::Selenium(SeleniumRunner::new(c)),
        }
    }

    /// The configuration this runner was built from
    pub fn configuration(&self) -> RunnerConfiguration {
        match self {
            Runner::Http(r) => RunnerConfiguration::Http(r.configuration().clone()),
            Runner::Basic(r) => RunnerConfiguration::Basic(r.configuration().clone()),
            Runner::Digest(r) => RunnerConfiguration::Digest(r.configuration().clone()),
            Runner::Graphql(r) => RunnerConfiguration::Graphql(r.configuration().clone()),
            Runner::Selenium(r) => RunnerConfiguration::Selenium(r.configuration().clone()),
        }
    }

    /// New runner with `variables` substituted into every string of the
    /// configuration. The first variable of a given name wins.
    ///
    /// Placeholders left unresolved are an error in strict mode and a
    /// warning otherwise.
    pub fn interpolate(&self, variables: &[Variable], strict: bool) -> Result<Runner, RunnerError> {
        let tree = serde_json::to_value(self.configuration())
            .map_err(|e| RunnerError::Configuration(e.to_string()))?;
        let tree = interpolate_value(&tree, variables);

        let unresolved = unresolved_placeholders(&tree);
        if !unresolved.is_empty() {
            if strict {
                return Err(RunnerError::Interpolation { names: unresolved });
            }
            warn!("Unresolved placeholders: {}", unresolved.join(", "));
        }

        let configuration: RunnerConfiguration = serde_json::from_value(tree)
            .map_err(|e| RunnerError::Configuration(e.to_string()))?;
        Ok(Runner::new(configuration))
    }

    /// Execute the step for `user`
    pub async fn run(&self, user: &User, context: &RunnerContext) -> RunOutcome {
        match self {
            Runner::Http(r) => r.run(user, context).await,
            Runner::Basic(r) => r.run(user, context).await,
            Runner::Digest(r) => r.run(user, context).await,
            Runner::Graphql(r) => r.run(user, context).await,
            Runner::Selenium(r) => r.run(user, context).await,
        }
    }
}
