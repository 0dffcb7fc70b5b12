//! The multiauth façade
//!
//! [`Multiauth`] owns the configuration, one live [`Procedure`] per
//! (user, procedure) pair and the [`AuthenticationStore`]. Many users can be
//! authenticated concurrently from a shared `Multiauth`; runs for the same
//! user and procedure are serialized.
//!
//! ```rust,ignore
//! let multiauth = Multiauth::from_file("multiauth.yaml")?;
//! let result = multiauth.authenticate("alice").await?;
//! if let Some(error) = &result.error {
//!     eprintln!("authentication failed: {error}");
//! }
//! ```

use crate::auth::{detect_ttl, Authentication, AuthenticationStore};
use crate::config::MultiauthConfiguration;
use crate::error::{Error, Result};
use crate::events::{EventKind, EventSink, Events, TracingSink};
use crate::http::{ReqwestTransport, Transport};
use crate::procedure::{Procedure, ProcedureError, ProcedureOutcome};
use crate::runner::{BrowserDriver, RunnerContext};
use crate::user::User;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

type SessionKey = (String, String);

/// Result of [`Multiauth::authenticate`] and [`Multiauth::refresh`]
#[derive(Debug, Clone, Default)]
pub struct AuthenticationResult {
    /// Empty when the procedure failed
    pub authentication: Authentication,
    pub events: Events,
    /// Times the user's authentication had been stored before this one
    pub refresh_count: u32,
    pub error: Option<ProcedureError>,
}

impl AuthenticationResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Multiauth`]
pub struct MultiauthBuilder {
    configuration: MultiauthConfiguration,
    transport: Option<Arc<dyn Transport>>,
    browser: Option<Arc<dyn BrowserDriver>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl MultiauthBuilder {
    /// Send requests through `transport` instead of a default reqwest client
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Driver used by selenium steps
    #[must_use]
    pub fn browser(mut self, browser: Arc<dyn BrowserDriver>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Forward events to `sink` instead of `tracing`
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and build the façade
    pub fn build(self) -> Result<Multiauth> {
        self.configuration.validate()?;

        let options = &self.configuration.options;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let mut context = RunnerContext::new(transport)
            .with_strict(options.strict)
            .with_timeout(options.request_timeout_seconds);
        if let Some(browser) = self.browser {
            context = context.with_browser(browser);
        }

        Ok(Multiauth {
            configuration: self.configuration,
            context,
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            store: AuthenticationStore::new(),
            sessions: Mutex::new(HashMap::new()),
        })
    }
}

// ============================================================================
// Façade
// ============================================================================

/// Entry point: authenticates and refreshes configured users
pub struct Multiauth {
    configuration: MultiauthConfiguration,
    context: RunnerContext,
    sink: Arc<dyn EventSink>,
    store: AuthenticationStore,
    sessions: Mutex<HashMap<SessionKey, Arc<AsyncMutex<Procedure>>>>,
}

impl fmt::Debug for Multiauth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multiauth")
            .field("procedures", &self.configuration.procedures.len())
            .field("users", &self.configuration.users.len())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Multiauth {
    /// Start building a façade over `configuration`
    pub fn builder(configuration: MultiauthConfiguration) -> MultiauthBuilder {
        MultiauthBuilder {
            configuration,
            transport: None,
            browser: None,
            sink: None,
        }
    }

    /// Façade with the default transport and sink
    pub fn new(configuration: MultiauthConfiguration) -> Result<Self> {
        Self::builder(configuration).build()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::new(MultiauthConfiguration::from_json_str(json)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::new(MultiauthConfiguration::from_yaml_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(MultiauthConfiguration::from_file(path)?)
    }

    pub fn configuration(&self) -> &MultiauthConfiguration {
        &self.configuration
    }

    /// Cached authentications
    pub fn store(&self) -> &AuthenticationStore {
        &self.store
    }

    fn user(&self, name: &str) -> Result<&User> {
        self.configuration
            .user(name)
            .ok_or_else(|| Error::missing_user(name))
    }

    /// Live procedure for a user, created on first use
    fn session(&self, user_name: &str, procedure_name: &str) -> Result<Arc<AsyncMutex<Procedure>>> {
        let configuration = self
            .configuration
            .procedure(procedure_name)
            .ok_or_else(|| Error::missing_procedure(procedure_name))?;

        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let session = sessions
            .entry((user_name.to_string(), procedure_name.to_string()))
            .or_insert_with(|| {
                let procedure =
                    Procedure::new(configuration.clone()).with_sink(Arc::clone(&self.sink));
                Arc::new(AsyncMutex::new(procedure))
            });
        Ok(Arc::clone(session))
    }

    /// Run the user's procedure, or skip it when the user declares none.
    /// `fresh` drops the variables kept from earlier runs.
    async fn execute(&self, user: &User, fresh: bool) -> Result<ProcedureOutcome> {
        let base = Authentication::from_credentials(&user.credentials);

        let Some(procedure_name) = &user.procedure else {
            let mut events = Events::new();
            events.push(EventKind::ProcedureSkipped {
                user_name: user.name.clone(),
            });
            for event in &events {
                self.sink.record(event);
            }
            return Ok(ProcedureOutcome {
                authentication: base,
                events,
                error: None,
            });
        };

        let session = self.session(&user.name, procedure_name)?;
        let mut procedure = session.lock().await;
        if fresh {
            procedure.reset();
        }

        let mut outcome = procedure
            .run(user, &self.context, self.configuration.options.injection_fallback)
            .await;
        if outcome.is_success() {
            outcome.authentication = base.merge(&outcome.authentication);
        }
        Ok(outcome)
    }

    /// Session lifetime: detected from JWTs, else the user's, else the default
    fn ttl_seconds(&self, user: &User, authentication: &Authentication) -> u64 {
        let options = &self.configuration.options;
        let detected = if options.detect_ttl {
            detect_ttl(authentication)
        } else {
            None
        };

        detected
            .or_else(|| user.session_ttl_seconds().filter(|seconds| *seconds > 0))
            .unwrap_or(options.default_ttl_seconds)
    }

    /// Store a successful outcome; failed ones leave the store untouched
    async fn finish(&self, user: &User, outcome: ProcedureOutcome) -> AuthenticationResult {
        if let Some(error) = outcome.error {
            warn!("Authentication of user `{}` failed: {error}", user.name);
            let refresh_count = self
                .store
                .record(&user.name)
                .await
                .map_or(0, |record| record.refresh_count);
            return AuthenticationResult {
                authentication: Authentication::empty(),
                events: outcome.events,
                refresh_count,
                error: Some(error),
            };
        }

        let ttl_seconds = self.ttl_seconds(user, &outcome.authentication);
        debug!("Storing authentication of user `{}` for {ttl_seconds}s", user.name);
        let refresh_count = self
            .store
            .store(
                &user.name,
                outcome.authentication.clone(),
                expiration(ttl_seconds),
            )
            .await;

        AuthenticationResult {
            authentication: outcome.authentication,
            events: outcome.events,
            refresh_count,
            error: None,
        }
    }

    /// Run the authentication procedure of `user_name` from scratch.
    ///
    /// Fails only for configuration lookups; a failing procedure is reported
    /// through [`AuthenticationResult::error`].
    pub async fn authenticate(&self, user_name: &str) -> Result<AuthenticationResult> {
        let user = self.user(user_name)?;
        info!("Authenticating user `{user_name}`");

        let outcome = self.execute(user, true).await?;
        Ok(self.finish(user, outcome).await)
    }

    /// Refresh the authentication of `user_name`.
    ///
    /// Uses the user's refresh procedure when declared, its authentication
    /// procedure otherwise, and keeps the variables of earlier runs. A user
    /// that was never authenticated is authenticated instead.
    pub async fn refresh(&self, user_name: &str) -> Result<AuthenticationResult> {
        let user = self.user(user_name)?;

        let Ok((base, _)) = self.store.get(user_name).await else {
            debug!("User `{user_name}` is not authenticated yet, authenticating instead");
            return self.authenticate(user_name).await;
        };
        info!("Refreshing user `{user_name}`");

        let mut outcome = self.execute(&user.refresh_user(), false).await?;
        let keep = user.refresh.as_ref().is_some_and(|refresh| refresh.keep);
        if keep && outcome.is_success() {
            outcome.authentication = base.merge(&outcome.authentication);
        }

        Ok(self.finish(user, outcome).await)
    }

    /// Whether the stored authentication of `user_name` has expired
    pub async fn should_refresh(&self, user_name: &str) -> Result<bool> {
        self.user(user_name)?;
        Ok(self.store.is_expired(user_name).await?)
    }
}

fn expiration(ttl_seconds: u64) -> DateTime<Utc> {
    let now = Utc::now();
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::ProcedureConfiguration;
    use crate::user::UserRefresh;

    fn configuration() -> MultiauthConfiguration {
        let mut user = User::new("alice");
        user.procedure = Some("login".to_string());
        MultiauthConfiguration::new(
            vec![ProcedureConfiguration::new("login", vec![])],
            vec![user, User::new("public")],
        )
    }

    #[test]
    fn test_ttl_priority() {
        let mut configuration = configuration();
        configuration.options.default_ttl_seconds = 42;
        let multiauth = Multiauth::new(configuration).unwrap();

        let mut user = User::new("alice");
        assert_eq!(multiauth.ttl_seconds(&user, &Authentication::empty()), 42);

        user.refresh = Some(UserRefresh {
            session_seconds: Some(7),
            ..Default::default()
        });
        assert_eq!(multiauth.ttl_seconds(&user, &Authentication::empty()), 7);

        user.refresh = Some(UserRefresh {
            session_seconds: Some(0),
            ..Default::default()
        });
        assert_eq!(multiauth.ttl_seconds(&user, &Authentication::empty()), 42);
    }

    #[test]
    fn test_expiration_saturates() {
        assert_eq!(expiration(u64::MAX), DateTime::<Utc>::MAX_UTC);
        assert!(expiration(10) > Utc::now());
    }

    #[test]
    fn test_build_rejects_invalid_configuration() {
        let mut configuration = configuration();
        configuration.users.push(User::new("alice"));
        assert!(Multiauth::new(configuration)
            .unwrap_err()
            .is_configuration_error());
    }

    #[tokio::test]
    async fn test_sessions_are_reused_per_user_and_procedure() {
        let multiauth = Multiauth::new(configuration()).unwrap();

        let first = multiauth.session("alice", "login").unwrap();
        let second = multiauth.session("alice", "login").unwrap();
        let other = multiauth.session("bob", "login").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert!(matches!(
            multiauth.session("alice", "nope"),
            Err(Error::MissingProcedure { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_refresh_unknown_states() {
        let multiauth = Multiauth::new(configuration()).unwrap();

        assert!(matches!(
            multiauth.should_refresh("nobody").await,
            Err(Error::MissingUser { .. })
        ));
        assert!(matches!(
            multiauth.should_refresh("alice").await,
            Err(Error::Store(_))
        ));

        multiauth.authenticate("public").await.unwrap();
        assert!(!multiauth.should_refresh("public").await.unwrap());

        multiauth.store().expire("public").await.unwrap();
        assert!(multiauth.should_refresh("public").await.unwrap());
    }
}
