//! Audit event types
//!
//! Every step of a procedure run leaves a typed record behind. Reporters
//! consume the ordered list; the engine only produces it.

use crate::http::{FailureReason, HttpRequest, HttpResponse};
use crate::types::{HttpLocation, Variable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Why a procedure stopped before completing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    RunnerError,
    InjectionMiss,
    Unknown,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbortReason::RunnerError => "runner_error",
            AbortReason::InjectionMiss => "injection_miss",
            AbortReason::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Variant-specific event payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    HttpRequest {
        request: HttpRequest,
    },
    HttpResponse {
        response: HttpResponse,
    },
    HttpFailure {
        reason: FailureReason,
        description: String,
    },
    Extraction {
        variable: Variable,
    },
    Injection {
        variable: Variable,
        location: HttpLocation,
        target: String,
    },
    ProcedureStarted {
        procedure_name: String,
        user_name: String,
    },
    ProcedureAborted {
        reason: AbortReason,
        description: String,
    },
    ProcedureFinished {
        user_name: String,
    },
    ProcedureSkipped {
        user_name: String,
    },
    WebdriverLog {
        message: String,
    },
    WebdriverError {
        message: String,
        from_exception: Option<String>,
    },
}

impl EventKind {
    /// Severity used when none is set explicitly
    pub fn default_severity(&self) -> Severity {
        match self {
            EventKind::HttpResponse { .. } => Severity::Success,
            EventKind::HttpFailure { .. }
            | EventKind::ProcedureAborted { .. }
            | EventKind::WebdriverError { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }

    /// Wire name of the event type
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::HttpRequest { .. } => "http_request",
            EventKind::HttpResponse { .. } => "http_response",
            EventKind::HttpFailure { .. } => "http_failure",
            EventKind::Extraction { .. } => "extraction",
            EventKind::Injection { .. } => "injection",
            EventKind::ProcedureStarted { .. } => "procedure_started",
            EventKind::ProcedureAborted { .. } => "procedure_aborted",
            EventKind::ProcedureFinished { .. } => "procedure_finished",
            EventKind::ProcedureSkipped { .. } => "procedure_skipped",
            EventKind::WebdriverLog { .. } => "webdriver_log",
            EventKind::WebdriverError { .. } => "webdriver_error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::HttpRequest { request } => write!(f, "{request}"),
            EventKind::HttpResponse { response } => write!(f, "{response}"),
            EventKind::HttpFailure {
                reason,
                description,
            } => write!(f, "{reason} {description}"),
            EventKind::Extraction { variable } => write!(f, "{}={}", variable.name, variable.value),
            EventKind::Injection {
                variable,
                location,
                target,
            } => write!(f, "{} in {location} {target}", variable.value),
            EventKind::ProcedureStarted {
                procedure_name,
                user_name,
            } => write!(f, "{procedure_name} started for user {user_name}"),
            EventKind::ProcedureAborted {
                reason,
                description,
            } => write!(f, "{reason} {description}"),
            EventKind::ProcedureFinished { user_name } => {
                write!(f, "procedure ended for user {user_name}")
            }
            EventKind::ProcedureSkipped { user_name } => {
                write!(f, "procedures skipped for user {user_name}")
            }
            EventKind::WebdriverLog { message } => f.write_str(message),
            EventKind::WebdriverError {
                message,
                from_exception,
            } => match from_exception {
                Some(e) => write!(f, "{message}: {e}"),
                None => f.write_str(message),
            },
        }
    }
}

/// A timestamped audit record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Create an event stamped now with its default severity
    pub fn new(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            severity: kind.default_severity(),
            kind,
        }
    }

    /// Override the severity
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Wire name of the event type
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// One-line (or multi-line for HTTP exchanges) human readable form
    pub fn logline(&self) -> String {
        self.kind.to_string()
    }
}

impl From<EventKind> for Event {
    fn from(kind: EventKind) -> Self {
        Event::new(kind)
    }
}

/// Ordered, append-only list of events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Events(Vec<Event>);

impl Events {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&mut self, event: impl Into<Event>) {
        self.0.push(event.into());
    }

    /// Append all events of another list
    pub fn extend(&mut self, other: Events) {
        self.0.extend(other.0);
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over events in order
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.0.iter()
    }

    /// Number of events of a given type name
    pub fn count(&self, name: &str) -> usize {
        self.0.iter().filter(|e| e.name() == name).count()
    }

    /// Last event, if any
    pub fn last(&self) -> Option<&Event> {
        self.0.last()
    }

    /// Borrow the events as a slice
    pub fn as_slice(&self) -> &[Event] {
        &self.0
    }
}

impl IntoIterator for Events {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Events {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Event> for Events {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
