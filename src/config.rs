//! Configuration for multiauth
//!
//! A configuration declares procedures, users and engine options. It can be
//! loaded from JSON or YAML:
//!
//! ```yaml
//! procedures:
//!   - name: login
//!     operations:
//!       - tech: http
//!         parameters:
//!           url: https://api.example.com/login
//!           method: POST
//!         extractions:
//!           - location: body
//!             key: access_token
//!             name: token
//! users:
//!   - name: alice
//!     procedure: login
//!     injections:
//!       - location: header
//!         key: Authorization
//!         prefix: "Bearer "
//!         variable: token
//! ```

use crate::auth::InjectionFallback;
use crate::error::{Error, Result};
use crate::http::DEFAULT_TIMEOUT_SECONDS;
use crate::procedure::ProcedureConfiguration;
use crate::user::User;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Default session lifetime: 10 days
pub const DEFAULT_TTL_SECONDS: u64 = 10 * 24 * 60 * 60;

// ============================================================================
// Options
// ============================================================================

/// Engine options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiauthOptions {
    /// Fail on extraction misses, injection misses and unresolved
    /// placeholders instead of logging them
    #[serde(default)]
    pub strict: bool,

    /// Variable used by injections that name none
    #[serde(default)]
    pub injection_fallback: InjectionFallback,

    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,

    /// Session lifetime when neither detection nor the user declares one
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,

    /// Read session lifetimes from JWT `exp` claims
    #[serde(default = "default_true")]
    pub detect_ttl: bool,
}

impl Default for MultiauthOptions {
    fn default() -> Self {
        Self {
            strict: false,
            injection_fallback: InjectionFallback::default(),
            request_timeout_seconds: default_timeout(),
            default_ttl_seconds: default_ttl(),
            detect_ttl: default_true(),
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Configuration
// ============================================================================

/// Procedures, users and options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiauthConfiguration {
    #[serde(default)]
    pub procedures: Vec<ProcedureConfiguration>,

    #[serde(default)]
    pub users: Vec<User>,

    #[serde(default)]
    pub options: MultiauthOptions,
}

impl MultiauthConfiguration {
    /// Create a configuration with default options
    pub fn new(procedures: Vec<ProcedureConfiguration>, users: Vec<User>) -> Self {
        Self {
            procedures,
            users,
            options: MultiauthOptions::default(),
        }
    }

    /// Set the options
    #[must_use]
    pub fn with_options(mut self, options: MultiauthOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let configuration: Self = serde_json::from_str(json)?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Parse and validate a YAML configuration
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let configuration: Self = serde_yaml::from_str(yaml)?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Load a configuration file. `.json` files are parsed as JSON,
    /// anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read configuration file '{}': {e}",
                path.display()
            ))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Check names: non-empty and unique per kind
    pub fn validate(&self) -> Result<()> {
        let mut procedures = HashSet::new();
        for procedure in &self.procedures {
            if procedure.name.is_empty() {
                return Err(Error::config("Procedure name cannot be empty"));
            }
            if !procedures.insert(procedure.name.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate procedure name: {}",
                    procedure.name
                )));
            }
        }

        let mut users = HashSet::new();
        for user in &self.users {
            if user.name.is_empty() {
                return Err(Error::config("User name cannot be empty"));
            }
            if !users.insert(user.name.as_str()) {
                return Err(Error::config(format!("Duplicate user name: {}", user.name)));
            }
        }

        if self.options.request_timeout_seconds == 0 {
            return Err(Error::config("request_timeout_seconds must be positive"));
        }

        Ok(())
    }

    /// Procedure declared under `name`
    pub fn procedure(&self, name: &str) -> Option<&ProcedureConfiguration> {
        self.procedures.iter().find(|p| p.name == name)
    }

    /// User declared under `name`
    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunnerConfiguration;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const YAML: &str = r#"
procedures:
  - name: login
    operations:
      - tech: http
        parameters:
          url: https://api.example.com/login
          method: POST
          body:
            username: "{{ username }}"
        extractions:
          - location: body
            key: access_token
            name: token
      - tech: basic
        parameters:
          url: https://api.example.com/check
users:
  - name: alice
    procedure: login
    variables:
      - name: username
        value: alice
    injections:
      - location: header
        key: Authorization
        prefix: "Bearer "
        variable: token
    refresh:
      session_seconds: 3600
      keep: true
options:
  strict: true
  injection_fallback: none
"#;

    #[test]
    fn test_parse_yaml() {
        let configuration = MultiauthConfiguration::from_yaml_str(YAML).unwrap();

        let login = configuration.procedure("login").unwrap();
        assert_eq!(login.operations.len(), 2);
        assert!(matches!(login.operations[0], RunnerConfiguration::Http(_)));
        assert!(matches!(login.operations[1], RunnerConfiguration::Basic(_)));

        let alice = configuration.user("alice").unwrap();
        assert_eq!(alice.procedure.as_deref(), Some("login"));
        assert_eq!(alice.session_ttl_seconds(), Some(3600));
        assert_eq!(alice.injections[0].prefix.as_deref(), Some("Bearer "));

        assert!(configuration.options.strict);
        assert_eq!(
            configuration.options.injection_fallback,
            InjectionFallback::None
        );
        assert_eq!(configuration.options.request_timeout_seconds, 5);
        assert_eq!(configuration.options.default_ttl_seconds, 864_000);
        assert!(configuration.options.detect_ttl);
    }

    #[test]
    fn test_parse_json_with_defaults() {
        let configuration =
            MultiauthConfiguration::from_json_str(r#"{"users": [{"name": "public"}]}"#).unwrap();
        assert!(configuration.procedures.is_empty());
        assert_eq!(configuration.options, MultiauthOptions::default());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = MultiauthConfiguration::from_json_str(
            r#"{"users": [{"name": "alice"}, {"name": "alice"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate user name: alice"));

        let err = MultiauthConfiguration::from_json_str(
            r#"{"procedures": [{"name": "p"}, {"name": "p"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate procedure name: p"));
    }

    #[test]
    fn test_empty_names_rejected() {
        let err = MultiauthConfiguration::from_json_str(r#"{"users": [{"name": ""}]}"#).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            MultiauthConfiguration::from_json_str("{not json"),
            Err(Error::JsonParse(_))
        ));
        assert!(matches!(
            MultiauthConfiguration::from_yaml_str("users: [name: {"),
            Err(Error::YamlParse(_))
        ));
    }

    #[test]
    fn test_from_file_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("multiauth.yaml");
        std::fs::File::create(&yaml_path)
            .unwrap()
            .write_all(YAML.as_bytes())
            .unwrap();
        let from_yaml = MultiauthConfiguration::from_file(&yaml_path).unwrap();

        let json_path = dir.path().join("multiauth.json");
        std::fs::write(&json_path, serde_json::to_string(&from_yaml).unwrap()).unwrap();
        let from_json = MultiauthConfiguration::from_file(&json_path).unwrap();

        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn test_from_file_missing() {
        let err = MultiauthConfiguration::from_file("/nonexistent/multiauth.yaml").unwrap_err();
        assert!(err
            .to_string()
            .contains("Failed to read configuration file '/nonexistent/multiauth.yaml'"));
    }
}
