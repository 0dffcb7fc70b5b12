//! HTTP Digest runner
//!
//! Two round trips. The first request is sent unauthenticated and must come
//! back with a `WWW-Authenticate` challenge carrying at least `realm` and
//! `nonce`. The runner answers with
//!
//! ```text
//! HA1      = MD5(username:realm:password)
//! HA2      = MD5(METHOD:uri)
//! response = MD5(HA1:nonce:HA2)
//! ```
//!
//! in an `Authorization: Digest ...` header on the second request, whose
//! result is the step's result. `qop=auth` (client nonce and nonce count) is
//! not computed: the challenge's `qop` is only exposed as a variable.

use super::http::{HttpRequestParameters, HttpRunner, HttpRunnerConfiguration};
use super::{RunOutcome, RunnerContext, RunnerError};
use crate::events::{EventKind, Events};
use crate::extraction::HttpExtraction;
use crate::http::{merge_headers, HttpEntry, HttpHeader};
use crate::types::{Method, Variable};
use crate::user::User;
use md5::{Digest, Md5};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// Name of the variable holding the computed header value
pub const DIGEST_HEADER_VARIABLE: &str = "digest-header-value";

/// `key=value` / `key="value"` pairs of a challenge
static CHALLENGE_PARAM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)=(?:"([^"]*)"|([^,\s]*))"#).expect("challenge regex is valid")
});

/// Overrides for the second, authenticated request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestSecondRequest {
    /// Path of the second request; defaults to the challenge domain
    #[serde(default)]
    pub path: Option<String>,
    /// Method of the second request; defaults to the first request's
    #[serde(default)]
    pub method: Option<Method>,
}

/// The two requests of a digest step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRequestSequence {
    pub first_request: HttpRequestParameters,
    #[serde(default)]
    pub second_request: Option<DigestSecondRequest>,
}

/// Configuration of a `digest` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRunnerConfiguration {
    pub parameters: DigestRequestSequence,
    /// Run against the second response
    #[serde(default)]
    pub extractions: Vec<HttpExtraction>,
}

/// Server parameters read from a `WWW-Authenticate` challenge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub domain: Option<String>,
}

/// Parse challenge header values. Fails when `realm` or `nonce` is missing.
pub fn parse_challenge(values: &[String]) -> Result<DigestChallenge, RunnerError> {
    let mut realm = None;
    let mut nonce = None;
    let mut challenge = DigestChallenge::default();

    for value in values {
        let value = value.trim();
        let params = match value.get(..6) {
            Some(scheme) if scheme.eq_ignore_ascii_case("digest") => &value[6..],
            _ => value,
        };

        for cap in CHALLENGE_PARAM_REGEX.captures_iter(params) {
            let key = cap[1].to_ascii_lowercase();
            let param = cap
                .get(2)
                .or_else(|| cap.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match key.as_str() {
                "realm" => realm = Some(param),
                "nonce" => nonce = Some(param),
                "qop" => challenge.qop = Some(param),
                "opaque" => challenge.opaque = Some(param),
                "domain" => challenge.domain = Some(param),
                _ => {}
            }
        }
    }

    match (realm, nonce) {
        (Some(realm), Some(nonce)) => Ok(DigestChallenge {
            realm,
            nonce,
            ..challenge
        }),
        _ => Err(RunnerError::Digest(
            "Digest response has no realm or nonce".to_string(),
        )),
    }
}

/// Intermediate and final digests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestHashes {
    pub ha1: String,
    pub ha2: String,
    pub response: String,
}

impl DigestHashes {
    pub fn compute(
        username: &str,
        realm: &str,
        password: &str,
        method: Method,
        uri: &str,
        nonce: &str,
    ) -> Self {
        let ha1 = md5_hex(&format!("{username}:{realm}:{password}"));
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        let response = md5_hex(&format!("{ha1}:{nonce}:{ha2}"));
        Self { ha1, ha2, response }
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// `Authorization` header answering a challenge
pub fn digest_header(
    challenge: &DigestChallenge,
    username: &str,
    password: &str,
    method: Method,
    uri: &str,
) -> HttpHeader {
    let hashes = DigestHashes::compute(
        username,
        &challenge.realm,
        password,
        method,
        uri,
        &challenge.nonce,
    );

    let mut value = format!(
        "Digest username=\"{username}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", response=\"{}\"",
        challenge.realm, challenge.nonce, hashes.response
    );
    if let Some(opaque) = &challenge.opaque {
        value.push_str(&format!(", opaque=\"{opaque}\""));
    }

    HttpHeader::new("Authorization", value)
}

/// Runs a `digest` step
#[derive(Debug, Clone)]
pub struct DigestRunner {
    configuration: DigestRunnerConfiguration,
}

impl DigestRunner {
    pub fn new(configuration: DigestRunnerConfiguration) -> Self {
        Self { configuration }
    }

    pub fn configuration(&self) -> &DigestRunnerConfiguration {
        &self.configuration
    }

    pub async fn run(&self, user: &User, context: &RunnerContext) -> RunOutcome {
        let mut events = Events::new();

        let Some((username, password)) = user.credentials.username_password() else {
            return RunOutcome::failure(
                events,
                RunnerError::MissingCredentials {
                    user: user.name.clone(),
                },
            );
        };

        let first = &self.configuration.parameters.first_request;
        let request = match first.build_request(&user.credentials, context.timeout_seconds) {
            Ok(request) => request,
            Err(e) => return RunOutcome::failure(events, e),
        };

        let response = match HttpRunner::send(&request, context, &mut events).await {
            Ok(response) => response,
            Err(e) => return RunOutcome::failure(events, e),
        };

        let challenge = response
            .headers
            .iter()
            .find(|h| h.name_matches("www-authenticate"))
            .ok_or_else(|| {
                RunnerError::Digest("Digest response has no WWW-Authenticate header".to_string())
            })
            .and_then(|h| parse_challenge(&h.values));
        let challenge = match challenge {
            Ok(challenge) => challenge,
            Err(e) => {
                events.push(EventKind::HttpFailure {
                    reason: e.reason(),
                    description: e.to_string(),
                });
                return RunOutcome::failure(events, e);
            }
        };

        let domain = challenge
            .domain
            .clone()
            .unwrap_or_else(|| request.path.clone());
        let overrides = self
            .configuration
            .parameters
            .second_request
            .clone()
            .unwrap_or_default();
        let second_path = overrides.path.unwrap_or_else(|| domain.clone());
        let second_method = overrides.method.unwrap_or(request.method);

        // the response hashes the method and URI actually sent
        let header = digest_header(&challenge, username, password, second_method, &second_path);
        debug!("Answering digest challenge for realm `{}`", challenge.realm);

        let mut variables = vec![
            Variable::new("realm", &challenge.realm),
            Variable::new("nonce", &challenge.nonce),
        ];
        if let Some(qop) = &challenge.qop {
            variables.push(Variable::new("qop", qop));
        }
        if let Some(opaque) = &challenge.opaque {
            variables.push(Variable::new("opaque", opaque));
        }
        variables.push(Variable::new("domain", &domain));
        variables.push(Variable::new(DIGEST_HEADER_VARIABLE, header.value()));

        let second = HttpRequestParameters {
            url: format!("{}://{}{}", request.scheme, request.host, second_path),
            method: second_method,
            headers: merge_headers(&first.headers, &[header]),
            cookies: first.cookies.clone(),
            query_parameters: first.query_parameters.clone(),
            body: None,
            proxy: first.proxy.clone(),
        };

        let mut outcome = HttpRunner::new(HttpRunnerConfiguration {
            parameters: second,
            extractions: self.configuration.extractions.clone(),
        })
        .run(user, context)
        .await;

        events.extend(outcome.events);
        outcome.events = events;
        if !outcome.is_failure() {
            variables.append(&mut outcome.variables);
            outcome.variables = variables;
        }
        outcome
    }
}
