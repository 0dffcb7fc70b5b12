//! Plain HTTP runner

use super::{apply_extractions, RunOutcome, RunnerContext, RunnerError};
use crate::events::{EventKind, Events};
use crate::extraction::{extract, HttpExtraction};
use crate::http::{
    merge_bodies, merge_cookies, merge_headers, merge_query_parameters, parse_raw_query,
    parse_raw_url, HttpCookie, HttpHeader, HttpQueryParameter, HttpRequest, HttpResponse,
};
use crate::types::{JsonValue, Method};
use crate::user::{Credentials, User};
use serde::{Deserialize, Serialize};

/// Request declared by an HTTP step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequestParameters {
    pub url: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub headers: Vec<HttpHeader>,
    #[serde(default)]
    pub cookies: Vec<HttpCookie>,
    #[serde(default, alias = "queryParameters")]
    pub query_parameters: Vec<HttpQueryParameter>,
    /// JSON body, or a string sent as is
    #[serde(default)]
    pub body: Option<JsonValue>,
    #[serde(default)]
    pub proxy: Option<String>,
}

impl HttpRequestParameters {
    /// Parameters for a bare request
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            cookies: Vec::new(),
            query_parameters: Vec::new(),
            body: None,
            proxy: None,
        }
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers = merge_headers(&self.headers, &[HttpHeader::new(name, value)]);
        self
    }

    /// Build the concrete request: configuration entries first, then the
    /// user's credentials. On body key conflicts the credentials win.
    pub fn build_request(
        &self,
        credentials: &Credentials,
        timeout_seconds: u64,
    ) -> Result<HttpRequest, RunnerError> {
        let (scheme, host, path) =
            parse_raw_url(&self.url).map_err(|e| RunnerError::Configuration(e.to_string()))?;
        let url_query =
            parse_raw_query(&self.url).map_err(|e| RunnerError::Configuration(e.to_string()))?;

        let body = merge_bodies(self.body.as_ref(), credentials.body.as_ref());
        let (body_text, body_json) = match body {
            None => (None, None),
            Some(JsonValue::String(text)) => {
                let json = serde_json::from_str(&text).ok();
                (Some(text), json)
            }
            Some(json) => (Some(json.to_string()), Some(json)),
        };

        Ok(HttpRequest {
            method: self.method,
            scheme,
            host,
            path,
            headers: merge_headers(&self.headers, &credentials.headers),
            cookies: merge_cookies(&self.cookies, &credentials.cookies),
            query_parameters: merge_query_parameters(
                &merge_query_parameters(&url_query, &self.query_parameters),
                &credentials.query_parameters,
            ),
            body_text,
            body_json,
            proxy: self.proxy.clone(),
            timeout_seconds,
        })
    }
}

/// Configuration of an `http` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRunnerConfiguration {
    pub parameters: HttpRequestParameters,
    #[serde(default)]
    pub extractions: Vec<HttpExtraction>,
}

impl HttpRunnerConfiguration {
    /// Configuration without extractions
    pub fn new(parameters: HttpRequestParameters) -> Self {
        Self {
            parameters,
            extractions: Vec::new(),
        }
    }

    /// Add an extraction
    #[must_use]
    pub fn with_extraction(mut self, extraction: HttpExtraction) -> Self {
        self.extractions.push(extraction);
        self
    }
}

/// Runs an `http` step
#[derive(Debug, Clone)]
pub struct HttpRunner {
    configuration: HttpRunnerConfiguration,
}

impl HttpRunner {
    pub fn new(configuration: HttpRunnerConfiguration) -> Self {
        Self { configuration }
    }

    pub fn configuration(&self) -> &HttpRunnerConfiguration {
        &self.configuration
    }

    /// Send a request, recording the exchange. Transport failures are
    /// classified; any HTTP status is returned as a response.
    pub async fn send(
        request: &HttpRequest,
        context: &RunnerContext,
        events: &mut Events,
    ) -> Result<HttpResponse, RunnerError> {
        events.push(EventKind::HttpRequest {
            request: request.clone(),
        });

        match context.transport.send(request).await {
            Ok(response) => {
                events.push(EventKind::HttpResponse {
                    response: response.clone(),
                });
                Ok(response)
            }
            Err(e) => {
                let description = e.to_string();
                events.push(EventKind::HttpFailure {
                    reason: e.reason(),
                    description: description.clone(),
                });
                Err(RunnerError::Http {
                    reason: e.reason(),
                    description,
                })
            }
        }
    }

    /// Run the step with explicit credentials
    pub async fn run_with_credentials(
        &self,
        credentials: &Credentials,
        context: &RunnerContext,
    ) -> RunOutcome {
        let mut events = Events::new();

        let request = match self
            .configuration
            .parameters
            .build_request(credentials, context.timeout_seconds)
        {
            Ok(request) => request,
            Err(e) => return RunOutcome::failure(events, e),
        };

        let response = match Self::send(&request, context, &mut events).await {
            Ok(response) => response,
            Err(e) => return RunOutcome::failure(events, e),
        };

        if response.is_error() {
            let error = RunnerError::http_status(response.status_code);
            events.push(EventKind::HttpFailure {
                reason: error.reason(),
                description: format!("HTTP error {}", response.status_code),
            });
            return RunOutcome::failure(events, error);
        }

        let extracted = extract(&response, &self.configuration.extractions);
        match apply_extractions(extracted, &mut events, context.strict) {
            Ok(variables) => RunOutcome::success(variables, events),
            Err(e) => RunOutcome::failure(events, e),
        }
    }

    /// Run the step for `user`
    pub async fn run(&self, user: &User, context: &RunnerContext) -> RunOutcome {
        self.run_with_credentials(&user.credentials, context).await
    }
}
