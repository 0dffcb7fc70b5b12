//! Browser script runner
//!
//! The browser itself is driven by an injected [`BrowserDriver`]: it replays
//! a recorded Selenium IDE project and hands back every request / response
//! the browser made. The runner turns the driver's logs into events and
//! pulls tokens out of that traffic with regexes.
//!
//! Unlike HTTP extractions, a transcript extraction that matches nothing is
//! fatal to the step.

use super::{RunOutcome, RunnerContext, RunnerError};
use crate::events::{EventKind, Events};
use crate::http::HttpHeader;
use crate::types::{Variable, VariableName};
use crate::user::User;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Script configuration
// ============================================================================

/// One recorded browser command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeleniumCommand {
    pub id: String,
    pub command: String,
    pub target: String,
    #[serde(default)]
    pub targets: Vec<Vec<String>>,
    #[serde(default)]
    pub value: String,
}

/// A named sequence of commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeleniumTest {
    pub id: String,
    pub name: String,
    pub commands: Vec<SeleniumCommand>,
}

/// A recorded Selenium IDE project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeleniumProject {
    pub tests: Vec<SeleniumTest>,
}

fn default_wait_for_seconds() -> u64 {
    5
}

/// Browser options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeleniumScriptOptions {
    #[serde(default)]
    pub token_lifetime: Option<u64>,
    /// How long a command may wait for its target
    #[serde(default = "default_wait_for_seconds")]
    pub wait_for_seconds: u64,
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for SeleniumScriptOptions {
    fn default() -> Self {
        Self {
            token_lifetime: None,
            wait_for_seconds: default_wait_for_seconds(),
            proxy: None,
        }
    }
}

/// What the browser should replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeleniumScriptParameters {
    pub project: SeleniumProject,
    #[serde(default)]
    pub options: SeleniumScriptOptions,
}

/// Part of the captured traffic searched by an extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptLocation {
    #[serde(rename = "RequestURL")]
    RequestUrl,
    RequestHeader,
    RequestBody,
    ResponseHeader,
    ResponseBody,
}

impl fmt::Display for TranscriptLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TranscriptLocation::RequestUrl => "RequestURL",
            TranscriptLocation::RequestHeader => "RequestHeader",
            TranscriptLocation::RequestBody => "RequestBody",
            TranscriptLocation::ResponseHeader => "ResponseHeader",
            TranscriptLocation::ResponseBody => "ResponseBody",
        };
        f.write_str(s)
    }
}

/// Regex extraction over the captured traffic. The first capture group of
/// each matching entry is a candidate; `extract_match_index` picks one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeleniumExtraction {
    pub name: VariableName,
    pub extract_location: TranscriptLocation,
    pub extract_regex: String,
    #[serde(default)]
    pub extract_match_index: Option<usize>,
}

/// Configuration of a `selenium` step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeleniumRunnerConfiguration {
    pub parameters: SeleniumScriptParameters,
    #[serde(default)]
    pub extractions: Vec<SeleniumExtraction>,
}

// ============================================================================
// Browser collaborator
// ============================================================================

/// Response captured by the browser
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedResponse {
    pub status_code: u16,
    pub headers: Vec<HttpHeader>,
    pub body: Option<String>,
}

/// Request captured by the browser, with its response if one arrived
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<HttpHeader>,
    pub body: Option<String>,
    pub response: Option<CapturedResponse>,
}

/// A command that failed while the script ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserError {
    pub message: String,
    pub from_exception: Option<String>,
}

/// Everything a script run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowserRun {
    pub exchanges: Vec<CapturedRequest>,
    pub logs: Vec<String>,
    pub errors: Vec<BrowserError>,
}

/// Replays a Selenium project in a browser
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Run every test of the project and return the captured traffic.
    /// Command failures belong in [`BrowserRun::errors`]; an `Err` means the
    /// browser could not be driven at all.
    async fn run(&self, parameters: &SeleniumScriptParameters) -> anyhow::Result<BrowserRun>;
}

// ============================================================================
// Extraction
// ============================================================================

fn header_lines(headers: &[HttpHeader]) -> impl Iterator<Item = String> + '_ {
    headers
        .iter()
        .flat_map(|h| h.values.iter().map(move |v| format!("{}: {v}", h.name)))
}

/// Find the `index`-th token captured by `regex` at `location`
pub fn extract_token(
    location: TranscriptLocation,
    regex: &str,
    index: Option<usize>,
    exchanges: &[CapturedRequest],
) -> Result<String, RunnerError> {
    let re = Regex::new(regex).map_err(|e| RunnerError::Configuration(e.to_string()))?;
    let capture = |text: &str| -> Option<String> {
        re.captures(text)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    };

    let tokens: Vec<String> = match location {
        TranscriptLocation::RequestUrl => exchanges
            .iter()
            .filter_map(|e| capture(e.url.as_str()))
            .collect(),
        TranscriptLocation::RequestHeader => exchanges
            .iter()
            .flat_map(|e| header_lines(&e.headers))
            .filter_map(|line| capture(line.as_str()))
            .collect(),
        TranscriptLocation::RequestBody => exchanges
            .iter()
            .filter_map(|e| e.body.as_deref().and_then(capture))
            .collect(),
        TranscriptLocation::ResponseHeader => exchanges
            .iter()
            .filter_map(|e| e.response.as_ref())
            .flat_map(|r| header_lines(&r.headers))
            .filter_map(|line| capture(line.as_str()))
            .collect(),
        TranscriptLocation::ResponseBody => exchanges
            .iter()
            .filter_map(|e| e.response.as_ref())
            .filter_map(|r| r.body.as_deref().and_then(capture))
            .collect(),
    };

    let index = index.unwrap_or(0);
    tokens
        .into_iter()
        .nth(index)
        .ok_or_else(|| RunnerError::TokenNotFound {
            location,
            regex: regex.to_string(),
            index,
        })
}

// ============================================================================
// Runner
// ============================================================================

/// Runs a `selenium` step
#[derive(Debug, Clone)]
pub struct SeleniumRunner {
    configuration: SeleniumRunnerConfiguration,
}

impl SeleniumRunner {
    pub fn new(configuration: SeleniumRunnerConfiguration) -> Self {
        Self { configuration }
    }

    pub fn configuration(&self) -> &SeleniumRunnerConfiguration {
        &self.configuration
    }

    pub async fn run(&self, _user: &User, context: &RunnerContext) -> RunOutcome {
        let mut events = Events::new();

        let Some(browser) = &context.browser else {
            return RunOutcome::failure(events, RunnerError::NoBrowser);
        };

        for test in &self.configuration.parameters.project.tests {
            events.push(EventKind::WebdriverLog {
                message: format!("Running test `{}`", test.name),
            });
        }

        let run = match browser.run(&self.configuration.parameters).await {
            Ok(run) => run,
            Err(e) => {
                events.push(EventKind::WebdriverError {
                    message: "Failed to run the browser script".to_string(),
                    from_exception: Some(format!("{e:#}")),
                });
                return RunOutcome::failure(events, RunnerError::Browser(format!("{e:#}")));
            }
        };

        for message in run.logs {
            events.push(EventKind::WebdriverLog { message });
        }
        for error in run.errors {
            events.push(EventKind::WebdriverError {
                message: error.message,
                from_exception: error.from_exception,
            });
        }

        let mut variables = Vec::new();
        for extraction in &self.configuration.extractions {
            match extract_token(
                extraction.extract_location,
                &extraction.extract_regex,
                extraction.extract_match_index,
                &run.exchanges,
            ) {
                Ok(token) => {
                    let variable = Variable::new(&extraction.name, token);
                    events.push(EventKind::Extraction {
                        variable: variable.clone(),
                    });
                    variables.push(variable);
                }
                Err(e) => {
                    events.push(EventKind::WebdriverError {
                        message: "Failed to extract token".to_string(),
                        from_exception: Some(e.to_string()),
                    });
                    return RunOutcome::failure(events, e);
                }
            }
        }

        RunOutcome::success(variables, events)
    }
}
