//! Error types for multiauth
//!
//! Errors surfaced by the façade and the configuration loader. Failures
//! that happen while a procedure runs are not raised through this type: they
//! travel as [`RunnerError`] values inside the procedure outcome.
//!
//! [`RunnerError`]: crate::runner::RunnerError

use crate::auth::StoreError;
use thiserror::Error;

/// The main error type for multiauth
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("User `{user}` is not declared in the configuration")]
    MissingUser { user: String },

    #[error("Procedure `{procedure}` is not declared in the configuration")]
    MissingProcedure { procedure: String },

    // ============================================================================
    // Authentication Store Errors
    // ============================================================================
    #[error(transparent)]
    Store(#[from] StoreError),

    // ============================================================================
    // URL Errors
    // ============================================================================
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing user error
    pub fn missing_user(user: impl Into<String>) -> Self {
        Self::MissingUser { user: user.into() }
    }

    /// Create a missing procedure error
    pub fn missing_procedure(procedure: impl Into<String>) -> Self {
        Self::MissingProcedure {
            procedure: procedure.into(),
        }
    }

    /// Whether this error comes from a configuration lookup
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingUser { .. }
                | Error::MissingProcedure { .. }
                | Error::YamlParse(_)
                | Error::JsonParse(_)
        )
    }
}

/// Result type alias for multiauth
pub type Result<T> = std::result::Result<T, Error>;
