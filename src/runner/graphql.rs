//! GraphQL runner
//!
//! A GraphQL step is an HTTP POST whose JSON body is `{query, variables}`,
//! deep-merged over any body declared alongside it.

use super::http::{HttpRequestParameters, HttpRunner, HttpRunnerConfiguration};
use super::{RunOutcome, RunnerContext};
use crate::extraction::HttpExtraction;
use crate::http::{merge_bodies, merge_headers, HttpCookie, HttpHeader, HttpQueryParameter};
use crate::types::{JsonObject, JsonValue, Method};
use crate::user::User;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One GraphQL operation variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlVariable {
    pub name: String,
    pub value: JsonValue,
}

/// Request declared by a GraphQL step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlRequestParameters {
    pub url: String,
    pub query: String,
    #[serde(default)]
    pub variables: Vec<GraphqlVariable>,
    #[serde(default)]
    pub headers: Vec<HttpHeader>,
    #[serde(default)]
    pub cookies: Vec<HttpCookie>,
    #[serde(default, alias = "queryParameters")]
    pub query_parameters: Vec<HttpQueryParameter>,
    /// Extra body fields; a string is parsed as JSON when possible
    #[serde(default)]
    pub body: Option<JsonValue>,
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Configuration of a `graphql` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlRunnerConfiguration {
    pub parameters: GraphqlRequestParameters,
    #[serde(default)]
    pub extractions: Vec<HttpExtraction>,
}

impl GraphqlRunnerConfiguration {
    /// Equivalent plain HTTP configuration
    pub fn to_http(&self) -> HttpRunnerConfiguration {
        let parameters = &self.parameters;

        let base = match &parameters.body {
            Some(JsonValue::String(text)) => serde_json::from_str::<JsonValue>(text)
                .ok()
                .filter(JsonValue::is_object),
            Some(body @ JsonValue::Object(_)) => Some(body.clone()),
            _ => None,
        };

        let variables: JsonObject = parameters
            .variables
            .iter()
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect();
        let operation = json!({
            "query": parameters.query,
            "variables": variables,
        });

        HttpRunnerConfiguration {
            parameters: HttpRequestParameters {
                url: parameters.url.clone(),
                method: Method::POST,
                headers: merge_headers(
                    &parameters.headers,
                    &[HttpHeader::new("Content-Type", "application/json")],
                ),
                cookies: parameters.cookies.clone(),
                query_parameters: parameters.query_parameters.clone(),
                body: merge_bodies(base.as_ref(), Some(&operation)),
                proxy: parameters.proxy.clone(),
            },
            extractions: self.extractions.clone(),
        }
    }
}

/// Runs a `graphql` step
#[derive(Debug, Clone)]
pub struct GraphqlRunner {
    configuration: GraphqlRunnerConfiguration,
}

impl GraphqlRunner {
    pub fn new(configuration: GraphqlRunnerConfiguration) -> Self {
        Self { configuration }
    }

    pub fn configuration(&self) -> &GraphqlRunnerConfiguration {
        &self.configuration
    }

    pub async fn run(&self, user: &User, context: &RunnerContext) -> RunOutcome {
        HttpRunner::new(self.configuration.to_http())
            .run(user, context)
            .await
    }
}
