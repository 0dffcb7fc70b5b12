//! # multiauth
//!
//! Declarative authentication procedures for API clients and security
//! tooling. A procedure is an ordered list of steps (plain HTTP, Basic,
//! Digest, GraphQL or a scripted browser session). Each step can use the
//! variables extracted by earlier ones, and the final variables are injected
//! into an [`Authentication`]: the headers, cookies and query parameters to
//! attach to authenticated requests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use multiauth::{Multiauth, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let multiauth = Multiauth::from_file("multiauth.yaml")?;
//!
//!     let result = multiauth.authenticate("alice").await?;
//!     println!("{}", result.authentication);
//!
//!     if multiauth.should_refresh("alice").await? {
//!         let refreshed = multiauth.refresh("alice").await?;
//!         println!("refreshed {} times", refreshed.refresh_count);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Multiauth façade                          │
//! │  authenticate(user)   refresh(user)   should_refresh(user)      │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────────┬───────────────┴───────────┬──────────────────────┐
//! │  Procedure   │          Runners          │  Authentication      │
//! ├──────────────┼───────────────────────────┼──────────────────────┤
//! │ Variables    │ HTTP      Digest          │ Injection            │
//! │ Interpolation│ Basic     GraphQL         │ Store + TTL          │
//! │ Events       │ Selenium (BrowserDriver)  │ JWT expiration       │
//! └──────────────┴───────────────────────────┴──────────────────────┘
//!                                │
//!                      Transport (reqwest)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::struct_excessive_bools)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP wire model and transport
pub mod http;

/// Template interpolation
pub mod template;

/// Variable extraction from responses
pub mod extraction;

/// Audit events and sinks
pub mod events;

/// Authentication, injection and the authentication store
pub mod auth;

/// Users and credentials
pub mod user;

/// Procedure steps
pub mod runner;

/// Procedures
pub mod procedure;

/// Configuration loading
pub mod config;

/// Façade
mod multiauth;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use auth::{Authentication, AuthenticationStore, InjectionFallback, TokenInjection};
pub use config::{MultiauthConfiguration, MultiauthOptions};
pub use events::{Event, EventKind, EventSink, Events};
pub use multiauth::{AuthenticationResult, Multiauth, MultiauthBuilder};
pub use procedure::{Procedure, ProcedureConfiguration, ProcedureError};
pub use runner::{RunnerConfiguration, RunnerError};
pub use user::{Credentials, User, UserRefresh};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
