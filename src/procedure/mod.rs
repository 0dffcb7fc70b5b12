//! Procedure module
//!
//! A procedure runs its steps in order for one user. Each step is
//! interpolated with the variables gathered so far, so a later request can
//! use a token extracted by an earlier one. The first failing step aborts
//! the run and the returned [`Authentication`] is empty.
//!
//! The variable store lives on the [`Procedure`] and survives between runs:
//! [`Procedure::reset`] starts from scratch, running again without a reset
//! reuses what earlier runs extracted.

use crate::auth::{inject_all, Authentication, InjectionFallback};
use crate::events::{AbortReason, EventKind, EventSink, Events, TracingSink};
use crate::runner::{Runner, RunnerConfiguration, RunnerContext, RunnerError};
use crate::types::{HttpLocation, ProcedureName, Variable, VariableName};
use crate::user::User;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// A named, ordered list of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureConfiguration {
    pub name: ProcedureName,
    #[serde(default, alias = "steps")]
    pub operations: Vec<RunnerConfiguration>,
}

impl ProcedureConfiguration {
    pub fn new(name: impl Into<String>, operations: Vec<RunnerConfiguration>) -> Self {
        Self {
            name: name.into(),
            operations,
        }
    }
}

/// Why a procedure run was aborted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcedureError {
    #[error("Runner error at step {step} of procedure `{procedure}`: {source}")]
    Runner {
        procedure: String,
        step: usize,
        #[source]
        source: RunnerError,
    },

    #[error("Injection into {location} `{key}` found no variable")]
    InjectionMiss { location: HttpLocation, key: String },
}

impl ProcedureError {
    pub fn abort_reason(&self) -> AbortReason {
        match self {
            ProcedureError::Runner { .. } => AbortReason::RunnerError,
            ProcedureError::InjectionMiss { .. } => AbortReason::InjectionMiss,
        }
    }

    /// The runner failure, if a step failed
    pub fn runner_error(&self) -> Option<&RunnerError> {
        match self {
            ProcedureError::Runner { source, .. } => Some(source),
            ProcedureError::InjectionMiss { .. } => None,
        }
    }
}

/// Result of one procedure run
#[derive(Debug, Clone, Default)]
pub struct ProcedureOutcome {
    /// Empty when the run failed
    pub authentication: Authentication,
    pub events: Events,
    pub error: Option<ProcedureError>,
}

impl ProcedureOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runtime state of a procedure
pub struct Procedure {
    configuration: ProcedureConfiguration,
    runners: Vec<Runner>,
    /// First-insertion order; overwriting a name keeps its position
    variables: IndexMap<VariableName, Variable>,
    events: Events,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.configuration.name)
            .field("steps", &self.runners.len())
            .field("variables", &self.variables.len())
            .finish_non_exhaustive()
    }
}

impl Procedure {
    /// Create a procedure whose events are logged through `tracing`
    pub fn new(configuration: ProcedureConfiguration) -> Self {
        let runners = configuration
            .operations
            .iter()
            .map(RunnerConfiguration::runner)
            .collect();

        Self {
            configuration,
            runners,
            variables: IndexMap::new(),
            events: Events::new(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Forward events to `sink` instead
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn name(&self) -> &str {
        &self.configuration.name
    }

    pub fn configuration(&self) -> &ProcedureConfiguration {
        &self.configuration
    }

    /// Drop every stored variable and the event log
    pub fn reset(&mut self) {
        self.variables.clear();
        self.events = Events::new();
    }

    /// Stored variables, oldest first
    pub fn variables(&self) -> Vec<Variable> {
        self.variables.values().cloned().collect()
    }

    /// Every event of every run since the last reset
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Store a variable, overwriting any of the same name in place
    fn store_variable(&mut self, variable: Variable) {
        self.variables.insert(variable.name.clone(), variable);
    }

    /// Lookup order for interpolation: stored variables last-inserted first,
    /// then the user's variables, newest first
    fn interpolation_variables(&self, user: &User) -> Vec<Variable> {
        self.variables
            .values()
            .rev()
            .chain(user.variables.iter().rev())
            .cloned()
            .collect()
    }

    fn emit(&self, events: &mut Events, incoming: Events) {
        for event in &incoming {
            self.sink.record(event);
        }
        events.extend(incoming);
    }

    fn emit_one(&self, events: &mut Events, kind: EventKind) {
        let mut single = Events::new();
        single.push(kind);
        self.emit(events, single);
    }

    fn abort(&mut self, mut events: Events, error: ProcedureError) -> ProcedureOutcome {
        warn!("Procedure `{}` aborted: {error}", self.configuration.name);
        self.emit_one(
            &mut events,
            EventKind::ProcedureAborted {
                reason: error.abort_reason(),
                description: error.to_string(),
            },
        );
        self.events.extend(events.clone());

        ProcedureOutcome {
            authentication: Authentication::empty(),
            events,
            error: Some(error),
        }
    }

    /// Run every step for `user`, then inject the stored variables
    pub async fn run(
        &mut self,
        user: &User,
        context: &RunnerContext,
        fallback: InjectionFallback,
    ) -> ProcedureOutcome {
        let mut events = Events::new();
        self.emit_one(
            &mut events,
            EventKind::ProcedureStarted {
                procedure_name: self.configuration.name.clone(),
                user_name: user.name.clone(),
            },
        );

        for step in 0..self.runners.len() {
            let variables = self.interpolation_variables(user);
            debug!(
                "Running step {step} of procedure `{}` with {} variables",
                self.configuration.name,
                variables.len()
            );

            let outcome = match self.runners[step].interpolate(&variables, context.strict) {
                Ok(runner) => runner.run(user, context).await,
                Err(source) => {
                    let error = ProcedureError::Runner {
                        procedure: self.configuration.name.clone(),
                        step,
                        source,
                    };
                    return self.abort(events, error);
                }
            };

            self.emit(&mut events, outcome.events);
            for variable in outcome.variables {
                self.store_variable(variable);
            }

            if let Some(source) = outcome.error {
                let error = ProcedureError::Runner {
                    procedure: self.configuration.name.clone(),
                    step,
                    source,
                };
                return self.abort(events, error);
            }
        }

        let injected = inject_all(&user.injections, &self.variables(), fallback);
        self.emit(&mut events, injected.events);

        if let Some(miss) = injected.misses.first() {
            if context.strict {
                let error = ProcedureError::InjectionMiss {
                    location: miss.location,
                    key: miss.key.clone(),
                };
                return self.abort(events, error);
            }
            for miss in &injected.misses {
                warn!(
                    "Injection into {} `{}` for user `{}` found no variable",
                    miss.location, miss.key, user.name
                );
            }
        }

        self.emit_one(
            &mut events,
            EventKind::ProcedureFinished {
                user_name: user.name.clone(),
            },
        );
        self.events.extend(events.clone());

        ProcedureOutcome {
            authentication: injected.authentication,
            events,
            error: None,
        }
    }
}
